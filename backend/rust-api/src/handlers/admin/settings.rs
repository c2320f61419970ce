use axum::{
    extract::{Extension, State},
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::settings::{EmailSettings, ReminderSettings, SettingsResponse, SiteSettings},
    services::{system_settings_service::SystemSettingsService, AppState},
};

use super::ApiError;

pub async fn get_system_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let service = SystemSettingsService::new(state.store.clone());
    let settings = service.get_all(&state.config).await?;
    Ok(Json(settings))
}

pub async fn update_email_settings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(payload): AppJson<EmailSettings>,
) -> Result<Json<EmailSettings>, ApiError> {
    let service = SystemSettingsService::new(state.store.clone());
    let updated = service.update_email(payload, &claims.sub).await?;
    Ok(Json(updated))
}

pub async fn update_reminder_settings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(payload): AppJson<ReminderSettings>,
) -> Result<Json<ReminderSettings>, ApiError> {
    let service = SystemSettingsService::new(state.store.clone());
    let updated = service.update_reminders(payload, &claims.sub).await?;
    Ok(Json(updated))
}

pub async fn update_site_settings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(payload): AppJson<SiteSettings>,
) -> Result<Json<SiteSettings>, ApiError> {
    let service = SystemSettingsService::new(state.store.clone());
    let updated = service.update_site(payload, &claims.sub).await?;
    Ok(Json(updated))
}
