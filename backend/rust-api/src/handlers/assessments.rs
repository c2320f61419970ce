use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    models::assessment::{Assessment, AssessmentSummary, ProgressPoint},
    services::{assessment_service::AssessmentService, AppState},
};

use super::ApiError;

fn service(state: &AppState) -> AssessmentService {
    AssessmentService::new(state.store.clone(), state.mailer.clone())
}

/// PDF response with an attachment filename.
pub(crate) fn pdf_response(id: &str, bytes: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"assessment-{}.pdf\"", id),
            ),
        ],
        bytes,
    )
}

/// GET /api/v1/users/{id}/assessments - newest first
pub async fn list_user_assessments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Assessment>>, ApiError> {
    Ok(Json(service(&state).list_for_user(&user_id).await?))
}

/// GET /api/v1/users/{id}/progress
pub async fn user_progress(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ProgressPoint>>, ApiError> {
    Ok(Json(service(&state).progress(&user_id).await?))
}

/// GET /api/v1/assessments/{id}
pub async fn get_assessment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AssessmentSummary>, ApiError> {
    Ok(Json(service(&state).get_summary(&id).await?))
}

/// GET /api/v1/assessments/{id}/pdf
pub async fn get_assessment_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = service(&state).render_pdf(&id).await?;
    Ok(pdf_response(&id, bytes))
}

/// POST /api/v1/assessments/{id}/email - resend the results email
pub async fn resend_results_email(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = service(&state)
        .resend_results_email(&id, &state.config)
        .await?;
    Ok(Json(json!({ "results_email": status })))
}
