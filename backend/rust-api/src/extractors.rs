use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `Json` extractor whose rejections are rendered as `{"message", "status"}`
/// with status 400, matching `ApiError` bodies.
pub struct AppJson<T>(pub T);

fn reject(rejection: JsonRejection) -> Response {
    let message = format!("Invalid JSON request body: {}", rejection.body_text());
    tracing::warn!(kind = ?rejection.status(), "{}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "message": message,
            "status": StatusCode::BAD_REQUEST.as_u16()
        })),
    )
        .into_response()
}

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(reject)
    }
}
