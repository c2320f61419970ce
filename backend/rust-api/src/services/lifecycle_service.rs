use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::config::Config;
use crate::engine::lifecycle::{days_since, expiry_cutoff, is_reminder_eligible, reminder_cutoff};
use crate::errors::{ServiceError, ServiceResult};
use crate::metrics::{record_email, DRAFTS_EXPIRED_TOTAL, REMINDER_ITEMS_TOTAL};
use crate::models::draft::Draft;
use crate::models::jobs::{
    CleanupReport, ReminderBatchReport, ReminderBatchRequest, ReminderOutcome, ReminderParams,
};
use crate::models::settings::{ReminderSettings, SiteSettings};
use crate::services::email_service::{reminder_email, Mailer};
use crate::services::system_settings_service::SystemSettingsService;
use crate::store::AssessmentStore;

/// Reminder and expiry jobs shared by the cron endpoints and the worker.
pub struct LifecycleService {
    store: Arc<dyn AssessmentStore>,
    mailer: Arc<dyn Mailer>,
}

/// Request values win over stored settings.
pub fn resolve_params(
    request: &ReminderBatchRequest,
    settings: &ReminderSettings,
) -> ServiceResult<ReminderParams> {
    let merged = ReminderSettings {
        threshold_days: request.days_since_last_update.unwrap_or(settings.threshold_days),
        max_reminders: request.max_reminders.unwrap_or(settings.max_reminders),
        batch_size: request.batch_size.unwrap_or(settings.batch_size),
        ..settings.clone()
    };
    merged.validate()?;

    Ok(ReminderParams {
        threshold_days: merged.threshold_days,
        max_reminders: merged.max_reminders,
        batch_size: merged.batch_size,
    })
}

impl LifecycleService {
    pub fn new(store: Arc<dyn AssessmentStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    /// Emails users whose drafts have gone idle. A failed item is reported
    /// in the batch and never stops the rest.
    pub async fn run_reminders(
        &self,
        request: &ReminderBatchRequest,
        config: &Config,
    ) -> ServiceResult<ReminderBatchReport> {
        let settings_service = SystemSettingsService::new(self.store.clone());
        let settings = settings_service.get_reminder_settings(config).await?;
        if !settings.enabled || !self.mailer.enabled() {
            tracing::info!(
                settings_enabled = settings.enabled,
                mailer_enabled = self.mailer.enabled(),
                "Reminder batch skipped"
            );
            return Ok(ReminderBatchReport {
                skipped: true,
                ..ReminderBatchReport::default()
            });
        }

        let params = resolve_params(request, &settings)?;
        let site = settings_service.get_site_settings(config).await?;
        let now = Utc::now();
        let drafts = self
            .store
            .drafts_due_for_reminder(
                reminder_cutoff(now, params.threshold_days),
                params.max_reminders,
                i64::from(params.batch_size),
            )
            .await?;

        tracing::info!(
            candidates = drafts.len(),
            threshold_days = params.threshold_days,
            max_reminders = params.max_reminders,
            "Running reminder batch"
        );

        let mut report = ReminderBatchReport::default();
        for draft in drafts {
            if !is_reminder_eligible(&draft, now, params.threshold_days, params.max_reminders) {
                continue;
            }
            let outcome = self.remind(&draft, &site, now).await;
            report.processed += 1;
            if outcome.success {
                report.succeeded += 1;
                REMINDER_ITEMS_TOTAL.with_label_values(&["sent"]).inc();
            } else {
                report.failed += 1;
                REMINDER_ITEMS_TOTAL.with_label_values(&["failed"]).inc();
            }
            report.results.push(outcome);
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Reminder batch finished"
        );
        Ok(report)
    }

    /// Sends one reminder. A failed attempt is stamped on the draft so it
    /// backs off for a threshold instead of heading every later batch.
    async fn remind(
        &self,
        draft: &Draft,
        site: &SiteSettings,
        now: chrono::DateTime<Utc>,
    ) -> ReminderOutcome {
        let outcome = self.send_reminder(draft, site, now).await;
        if !outcome.success {
            if let Err(err) = self.store.record_reminder_failed(&draft.user_id, now).await {
                tracing::warn!(
                    user_id = %draft.user_id,
                    error = %err,
                    "Failed reminder attempt not recorded"
                );
            }
        }
        outcome
    }

    async fn send_reminder(
        &self,
        draft: &Draft,
        site: &SiteSettings,
        now: chrono::DateTime<Utc>,
    ) -> ReminderOutcome {
        let failure = |email: Option<String>, error: String| ReminderOutcome {
            user_id: draft.user_id.clone(),
            email,
            success: false,
            error: Some(error),
        };

        let user = match self.store.get_user(&draft.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return failure(None, "user not found".to_string()),
            Err(err) => return failure(None, err.to_string()),
        };

        let email = reminder_email(&user, draft, days_since(draft.last_updated, now), site);
        if let Err(err) = self.mailer.send(email).await {
            record_email("reminder", "failed");
            tracing::warn!(user_id = %user.id, error = %format!("{err:#}"), "Reminder email failed");
            return failure(Some(user.email), err.to_string());
        }
        record_email("reminder", "delivered");

        if let Err(err) = self.store.record_reminder_sent(&draft.user_id, now).await {
            tracing::warn!(user_id = %user.id, error = %err, "Reminder sent but not recorded");
            return failure(Some(user.email), err.to_string());
        }

        ReminderOutcome {
            user_id: user.id,
            email: Some(user.email),
            success: true,
            error: None,
        }
    }

    /// Deletes drafts idle longer than the retention window, whatever their progress.
    pub async fn cleanup_expired(
        &self,
        retention_days: Option<u32>,
        config: &Config,
    ) -> ServiceResult<CleanupReport> {
        let retention_days = match retention_days {
            Some(days) => days,
            None => {
                SystemSettingsService::new(self.store.clone())
                    .get_reminder_settings(config)
                    .await?
                    .retention_days
            }
        };
        if retention_days == 0 {
            return Err(ServiceError::validation("retention_days must be at least 1"));
        }

        let cutoff = expiry_cutoff(Utc::now(), retention_days);
        let deleted = self.store.delete_drafts_updated_before(cutoff).await?;
        DRAFTS_EXPIRED_TOTAL.inc_by(deleted);
        tracing::info!(deleted, retention_days, %cutoff, "Expired drafts removed");

        Ok(CleanupReport { deleted, cutoff })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::navigation::Cursor;
    use crate::models::user::User;
    use crate::services::email_service::OutgoingEmail;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Fails for recipients listed in `failing`.
    struct ScriptedMailer {
        failing: Vec<String>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for ScriptedMailer {
        async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
            if self.failing.contains(&email.to_email) {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent.lock().unwrap().push(email.to_email);
            Ok(())
        }
    }

    async fn seed(store: &InMemoryStore, id: &str, idle_days: i64, reminders_sent: u32) {
        let now = Utc::now();
        store
            .insert_user(&User {
                id: id.into(),
                email: format!("{id}@example.com"),
                name: id.into(),
                phone: None,
                marketing_consent: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let mut draft = Draft::new(id, Cursor::default(), 0, now - Duration::days(idle_days));
        draft.reminders_sent = reminders_sent;
        store.upsert_draft(&draft).await.unwrap();
    }

    fn service(store: Arc<InMemoryStore>, failing: &[&str]) -> (LifecycleService, Arc<ScriptedMailer>) {
        let mailer = Arc::new(ScriptedMailer {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        });
        (LifecycleService::new(store, mailer.clone()), mailer)
    }

    #[test]
    fn request_overrides_settings() {
        let settings = ReminderSettings::from(&crate::config::LifecycleConfig::default());
        let request = ReminderBatchRequest {
            days_since_last_update: Some(7),
            batch_size: Some(10),
            ..ReminderBatchRequest::default()
        };
        let params = resolve_params(&request, &settings).unwrap();
        assert_eq!(
            params,
            ReminderParams {
                threshold_days: 7,
                max_reminders: 3,
                batch_size: 10
            }
        );

        let invalid = ReminderBatchRequest {
            batch_size: Some(0),
            ..ReminderBatchRequest::default()
        };
        assert!(matches!(
            resolve_params(&invalid, &settings),
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn reminders_go_only_to_eligible_drafts() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "idle", 4, 1).await;
        seed(&store, "fresh", 1, 0).await;
        seed(&store, "exhausted", 10, 3).await;
        let (service, mailer) = service(store.clone(), &[]);

        let report = service
            .run_reminders(&ReminderBatchRequest::default(), &Config::local())
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(mailer.sent.lock().unwrap().as_slice(), ["idle@example.com"]);

        let draft = store.get_draft("idle").await.unwrap().unwrap();
        assert_eq!(draft.reminders_sent, 2);
        assert!(draft.last_reminder_sent_at.is_some());
        assert!(Utc::now() - draft.last_updated >= Duration::days(4));
    }

    #[tokio::test]
    async fn one_failed_email_does_not_abort_the_batch() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "a", 5, 0).await;
        seed(&store, "b", 6, 0).await;
        seed(&store, "c", 7, 0).await;
        let (service, _) = service(store.clone(), &["b@example.com"]);

        let report = service
            .run_reminders(&ReminderBatchRequest::default(), &Config::local())
            .await
            .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let failed = report.results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.user_id, "b");
        assert_eq!(store.get_draft("b").await.unwrap().unwrap().reminders_sent, 0);
        assert_eq!(store.get_draft("c").await.unwrap().unwrap().reminders_sent, 1);
    }

    #[tokio::test]
    async fn failing_draft_does_not_starve_later_drafts() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "broken", 10, 0).await;
        seed(&store, "healthy", 5, 0).await;
        let (service, mailer) = service(store.clone(), &["broken@example.com"]);
        let one_at_a_time = ReminderBatchRequest {
            batch_size: Some(1),
            ..ReminderBatchRequest::default()
        };

        let first = service.run_reminders(&one_at_a_time, &Config::local()).await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(first.results[0].user_id, "broken");
        let broken = store.get_draft("broken").await.unwrap().unwrap();
        assert_eq!(broken.reminders_sent, 0);
        assert!(broken.last_reminder_attempt_at.is_some());

        let second = service.run_reminders(&one_at_a_time, &Config::local()).await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert_eq!(second.results[0].user_id, "healthy");
        assert_eq!(mailer.sent.lock().unwrap().as_slice(), ["healthy@example.com"]);
    }

    #[tokio::test]
    async fn reminders_wait_a_threshold_between_sends() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "idle", 10, 0).await;
        let (service, mailer) = service(store.clone(), &[]);

        let first = service
            .run_reminders(&ReminderBatchRequest::default(), &Config::local())
            .await
            .unwrap();
        assert_eq!(first.succeeded, 1);

        for _ in 0..2 {
            let rerun = service
                .run_reminders(&ReminderBatchRequest::default(), &Config::local())
                .await
                .unwrap();
            assert_eq!(rerun.processed, 0);
        }
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        assert_eq!(store.get_draft("idle").await.unwrap().unwrap().reminders_sent, 1);
    }

    #[tokio::test]
    async fn disabled_settings_skip_the_batch() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "a", 5, 0).await;
        let mut settings = ReminderSettings::from(&crate::config::LifecycleConfig::default());
        settings.enabled = false;
        SystemSettingsService::new(store.clone())
            .update_reminders(settings, "admin")
            .await
            .unwrap();
        let (service, mailer) = service(store, &[]);

        let report = service
            .run_reminders(&ReminderBatchRequest::default(), &Config::local())
            .await
            .unwrap();
        assert!(report.skipped);
        assert_eq!(report.processed, 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_deletes_only_expired_drafts() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "old", 31, 0).await;
        seed(&store, "recent", 29, 0).await;
        let (service, _) = service(store.clone(), &[]);

        let report = service.cleanup_expired(None, &Config::local()).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.get_draft("old").await.unwrap().is_none());
        assert!(store.get_draft("recent").await.unwrap().is_some());
        assert!(store.get_user("old").await.unwrap().is_some());
    }
}
