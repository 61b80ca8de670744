//! Notification generation endpoint
//!
//! `POST /api/generate` runs the generation pipeline for either stage and
//! returns the initial package or the follow-up package.

use axum::{Extension, Json, extract::State};
use chrono::Utc;

use crate::error::AppResult;
use crate::generation::GenerationOutput;
use crate::handlers::AppState;
use crate::handlers::extractor::ApiJson;
use crate::incident::GenerateRequest;
use crate::middleware::RequestId;

pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> AppResult<Json<GenerationOutput>> {
    let output = state
        .pipeline()
        .generate(&request, Utc::now(), request_id)
        .await?;

    tracing::info!(
        request_id = %request_id,
        sms_length = output.sms().chars().count(),
        flags = output.compliance_flags().len(),
        "Generation completed"
    );

    Ok(Json(output))
}
