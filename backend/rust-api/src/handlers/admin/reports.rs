use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    handlers::assessments::pdf_response,
    models::{
        admin::{ExportQuery, ListQuery, Page},
        assessment::{Assessment, AssessmentSummary},
    },
    services::{assessment_service::AssessmentService, AppState},
};

use super::ApiError;

fn service(state: &AppState) -> AssessmentService {
    AssessmentService::new(state.store.clone(), state.mailer.clone())
}

/// GET /admin/assessments
pub async fn list_assessments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Assessment>>, ApiError> {
    Ok(Json(service(&state).list_page(&query).await?))
}

/// GET /admin/assessments/{id}
pub async fn get_assessment_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AssessmentSummary>, ApiError> {
    Ok(Json(service(&state).get_summary(&id).await?))
}

/// GET /admin/assessments/{id}/pdf
pub async fn get_assessment_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = service(&state).render_pdf(&id).await?;
    Ok(pdf_response(&id, bytes))
}

/// GET /admin/assessments/export?format=csv|xlsx
pub async fn export_assessments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let file = service(&state).export(query.format).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    ))
}
