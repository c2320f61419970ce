use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::question::{QuestionBank, QuestionBankResponse, QuestionOverride},
    services::{question_bank_service::QuestionBankService, AppState},
};

use super::ApiError;

/// GET /admin/questions - effective bank with its source and version
pub async fn get_question_bank(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QuestionBankResponse>, ApiError> {
    let resolved = QuestionBankService::new(state.store.clone())
        .resolve()
        .await?;
    Ok(Json(QuestionBankResponse::from(resolved)))
}

/// PUT /admin/questions - replace the override
pub async fn put_question_override(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(bank): AppJson<QuestionBank>,
) -> Result<Json<QuestionOverride>, ApiError> {
    let stored = QuestionBankService::new(state.store.clone())
        .save_override(bank, &claims.sub)
        .await?;
    Ok(Json(stored))
}

/// DELETE /admin/questions - revert to the built-in bank
pub async fn delete_question_override(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<StatusCode, ApiError> {
    let removed = QuestionBankService::new(state.store.clone())
        .clear_override(&claims.sub)
        .await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("No question override is stored".to_string()))
    }
}
