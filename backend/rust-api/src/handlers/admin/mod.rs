mod questions;
mod reports;
mod settings;

pub use questions::*;
pub use reports::*;
pub use settings::*;

use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

use crate::{
    engine::{pillar::Pillar, recommendations::select_recommendations_by_id},
    extractors::AppJson,
    models::{
        admin::{AdminStats, ListQuery, LoginRequest, LoginResponse, Page},
        assessment::RecommendationPreviewRequest,
        draft::DraftOverview,
    },
    services::{
        admin_auth_service::{AdminAuthError, AdminAuthService},
        assessment_service::AssessmentService,
        draft_service::DraftService,
        AppState,
    },
};

use super::ApiError;

/// POST /admin/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let response = AdminAuthService::new(&state.config)
        .login(&req)
        .map_err(|err| match err {
            AdminAuthError::InvalidCredentials | AdminAuthError::NotConfigured => {
                ApiError::unauthorized(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Admin login failed");
                ApiError::Internal(other.to_string())
            }
        })?;
    Ok(Json(response))
}

/// GET /admin/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<AdminStats>, ApiError> {
    let stats = AssessmentService::new(state.store.clone(), state.mailer.clone())
        .stats()
        .await?;
    Ok(Json(stats))
}

/// GET /admin/drafts
pub async fn list_drafts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<DraftOverview>>, ApiError> {
    let page = DraftService::new(state.store.clone(), state.mailer.clone())
        .list_page(&query)
        .await?;
    Ok(Json(page))
}

/// POST /admin/recommendations/preview - advice for hand-entered pillar scores
pub async fn preview_recommendations(
    AppJson(req): AppJson<RecommendationPreviewRequest>,
) -> Json<BTreeMap<Pillar, Vec<String>>> {
    Json(select_recommendations_by_id(&req.per_pillar))
}
