use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    models::user::{CreateUserRequest, CreateUserResponse, User},
    services::{user_service::UserService, AppState},
};

use super::ApiError;

/// POST /api/v1/users - create or return the user registered under the email
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, created) = UserService::new(state.store.clone())
        .create_or_get(req)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateUserResponse { user, created })))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = UserService::new(state.store.clone()).get(&user_id).await?;
    Ok(Json(user))
}
