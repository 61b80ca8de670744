//! Health check endpoint

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness probe; always `{"status":"OK"}`
pub async fn handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler_returns_ok() {
        let Json(body) = handler().await;
        assert_eq!(body.status, "OK");
    }
}
