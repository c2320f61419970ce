use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    models::jobs::{CleanupReport, CleanupRequest, ReminderBatchReport, ReminderBatchRequest},
    services::{lifecycle_service::LifecycleService, AppState},
};

use super::ApiError;

fn check_secret(state: &AppState, provided: &str) -> Result<(), ApiError> {
    if provided.is_empty() || provided != state.config.cron_secret {
        tracing::warn!("Cron request rejected: bad secret");
        return Err(ApiError::unauthorized("Invalid cron secret"));
    }
    Ok(())
}

/// POST /api/cron/reminders
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ReminderBatchRequest>,
) -> Result<Json<ReminderBatchReport>, ApiError> {
    check_secret(&state, &req.secret)?;
    let report = LifecycleService::new(state.store.clone(), state.mailer.clone())
        .run_reminders(&req, &state.config)
        .await?;
    Ok(Json(report))
}

/// POST /api/cron/cleanup-drafts
pub async fn cleanup_drafts(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CleanupRequest>,
) -> Result<Json<CleanupReport>, ApiError> {
    check_secret(&state, &req.secret)?;
    let report = LifecycleService::new(state.store.clone(), state.mailer.clone())
        .cleanup_expired(req.retention_days, &state.config)
        .await?;
    Ok(Json(report))
}
