use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    engine::scoring::compute_scores,
    extractors::AppJson,
    models::{
        assessment::{ScoreRequest, ScoreResponse},
        question::QuestionBankResponse,
    },
    services::{question_bank_service::QuestionBankService, AppState},
};

use super::ApiError;

/// GET /api/v1/questions - effective question bank
pub async fn get_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QuestionBankResponse>, ApiError> {
    let resolved = QuestionBankService::new(state.store.clone())
        .resolve()
        .await?;
    Ok(Json(QuestionBankResponse::from(resolved)))
}

/// POST /api/v1/scores - stateless scoring of an answer map
pub async fn score_answers(AppJson(req): AppJson<ScoreRequest>) -> Json<ScoreResponse> {
    Json(ScoreResponse::from(compute_scores(&req.answers)))
}
