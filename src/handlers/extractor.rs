//! JSON extractor with crisiscast error bodies
//!
//! Wraps Axum's `Json` extractor so that any body that cannot be decoded is
//! rejected with `400 {"error": "Invalid request body"}`, the same shape every
//! other error uses.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

pub const INVALID_BODY_MESSAGE: &str = "Invalid request body";

/// Rejection produced by [`ApiJson`]
#[derive(Debug)]
pub struct ApiJsonRejection(JsonRejection);

impl IntoResponse for ApiJsonRejection {
    fn into_response(self) -> Response {
        tracing::debug!(reason = %self.0.body_text(), "Rejected request body");
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": INVALID_BODY_MESSAGE })),
        )
            .into_response()
    }
}

/// Drop-in replacement for `axum::Json` in request position
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiJsonRejection(rejection)),
        }
    }
}
