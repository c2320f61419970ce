use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    models::{
        answer::SubmitAnswerRequest,
        draft::{AnswerOutcome, DraftView},
    },
    services::{draft_service::DraftService, AppState},
};

use super::ApiError;

fn service(state: &AppState) -> DraftService {
    DraftService::new(state.store.clone(), state.mailer.clone())
}

/// GET /api/v1/users/{id}/draft - resume where the user left off
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<DraftView>, ApiError> {
    Ok(Json(service(&state).resume(&user_id).await?))
}

/// POST /api/v1/users/{id}/draft/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    let outcome = service(&state)
        .answer(&user_id, req, &state.config)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/users/{id}/draft/previous
pub async fn previous_question(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<DraftView>, ApiError> {
    Ok(Json(service(&state).previous(&user_id).await?))
}

/// DELETE /api/v1/users/{id}/draft - start over
pub async fn discard_draft(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service(&state).discard(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
