//! Error types for Crisiscast
//!
//! All errors implement `IntoResponse` for Axum handlers. Every error body has
//! the shape `{"error": "<message>"}`.

use crate::delivery::DeliveryError;
use crate::generation::client::ModelClientError;
use crate::lifecycle::LifecycleError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Message returned to callers for failures that must not leak internals
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Message returned when live generation is requested without provider credentials
pub const MISSING_API_KEY_MESSAGE: &str = "Server configuration error: missing API key";

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    ModelClient(#[from] ModelClientError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and client-facing message for this error
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            // Upstream status codes are never passed through to the caller
            Self::ModelClient(e) if e.is_unexpected() => (
                StatusCode::INTERNAL_SERVER_ERROR,
                UNEXPECTED_ERROR_MESSAGE.to_string(),
            ),
            Self::ModelClient(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Delivery(e) => (e.status_code(), e.to_string()),
            Self::Lifecycle(e) => (StatusCode::CONFLICT, e.to_string()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                UNEXPECTED_ERROR_MESSAGE.to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
