use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    config::Config,
    metrics::LIFECYCLE_WORKER_TICKS_TOTAL,
    models::jobs::ReminderBatchRequest,
    services::{lifecycle_service::LifecycleService, AppState},
};

/// Runs the reminder batch and the expiry cleanup on a fixed interval.
pub struct LifecycleWorker {
    service: LifecycleService,
    config: Config,
}

impl LifecycleWorker {
    pub fn new(state: &AppState) -> Self {
        Self {
            service: LifecycleService::new(state.store.clone(), state.mailer.clone()),
            config: state.config.clone(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let interval = Duration::from_secs(self.config.lifecycle.worker_interval_secs.max(1));
        info!(
            "Starting lifecycle worker loop (interval {}s)",
            interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(()) => {
                    LIFECYCLE_WORKER_TICKS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    info!("Lifecycle worker tick completed");
                }
                Err(err) => {
                    LIFECYCLE_WORKER_TICKS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    warn!(error = %err, "Lifecycle worker tick failed");
                }
            }

            sleep(interval).await;
        }
    }

    /// One pass: reminders first, then expiry. Both run even if the first fails.
    pub async fn run_once(&self) -> Result<()> {
        let reminders = self
            .service
            .run_reminders(&ReminderBatchRequest::default(), &self.config)
            .await;
        let cleanup = self.service.cleanup_expired(None, &self.config).await;

        match &reminders {
            Ok(report) => info!(
                processed = report.processed,
                failed = report.failed,
                skipped = report.skipped,
                "Reminder pass done"
            ),
            Err(err) => warn!(error = %err, "Reminder pass failed"),
        }
        if let Ok(report) = &cleanup {
            info!(deleted = report.deleted, "Expiry pass done");
        }

        reminders?;
        cleanup?;
        Ok(())
    }
}
