//! Request orchestration
//!
//! One call to [`GenerationPipeline::generate`] handles one request:
//!
//! ```text
//! validating -> mock
//!            -> prompting -> calling_model -> parsing -> model output
//!                                                     -> fallback to mock
//!                                         -> error response
//! ```
//!
//! Exactly one output or error is produced. The pipeline holds no mutable
//! state; the backend is chosen once at startup.

use crate::config::{Config, EnvOverrides};
use crate::error::{AppError, AppResult, MISSING_API_KEY_MESSAGE};
use crate::incident::{GenerateRequest, IncidentContext, Stage};
use crate::metrics::{ErrorKind, Metrics, Source, log_recording_failure};
use crate::middleware::RequestId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Instrument;

use super::client::{AnthropicClient, CompletionClient};
use super::compliance;
use super::mock::MockGenerator;
use super::parse::{ParseOutcome, parse_follow_up_response, parse_generate_response};
use super::prompts::PromptPayload;
use super::{GenerationOutput, ResponseMetadata};

/// Where content comes from, fixed at startup
#[derive(Clone)]
pub enum Backend {
    /// Deterministic templates only
    Mock,
    /// Model provider, with mock fallback for empty or unusable output
    Live(Arc<dyn CompletionClient>),
    /// Live mode requested but no API key configured
    MissingApiKey,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Mock => f.write_str("Mock"),
            Backend::Live(_) => f.write_str("Live"),
            Backend::MissingApiKey => f.write_str("MissingApiKey"),
        }
    }
}

impl Backend {
    /// Select the backend from configuration and environment
    ///
    /// Mock mode wins when either the config file or `LLM_MOCK` enables it.
    pub fn from_settings(
        config: &Config,
        env: &EnvOverrides,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        if config.generation.mock || env.mock {
            return Ok(Backend::Mock);
        }

        let Some(api_key) = env.api_key.clone() else {
            tracing::warn!("ANTHROPIC_API_KEY is not set; generation requests will fail");
            return Ok(Backend::MissingApiKey);
        };

        let client = AnthropicClient::new(
            &config.provider,
            env.model.clone(),
            api_key,
            config.retry.policy()?,
            metrics,
        )
        .map_err(|e| AppError::Config(format!("failed to build provider client: {}", e)))?;

        tracing::info!(model = client.model(), "Live generation enabled");
        Ok(Backend::Live(Arc::new(client)))
    }
}

/// Stateless generation orchestrator
pub struct GenerationPipeline {
    backend: Backend,
    mock: MockGenerator,
    languages: Vec<String>,
    metrics: Arc<Metrics>,
}

impl GenerationPipeline {
    pub fn new(backend: Backend, languages: Vec<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            mock: MockGenerator::new(languages.clone()),
            languages,
            metrics,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn record_error(&self, kind: ErrorKind) {
        log_recording_failure(
            "record_generation_error",
            self.metrics.record_generation_error(kind),
        );
    }

    fn mock_output(
        &self,
        stage: Stage,
        ctx: &IncidentContext,
        metadata: &ResponseMetadata,
    ) -> GenerationOutput {
        match stage {
            Stage::Initial => GenerationOutput::Initial(self.mock.generate(ctx, metadata)),
            Stage::FollowUp => {
                GenerationOutput::FollowUp(self.mock.generate_follow_up(ctx, metadata))
            }
        }
    }

    /// Produce the notification package for one request
    ///
    /// `now` is the single clock reading used for every timestamp in the
    /// response.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` for missing or invalid fields
    /// - `AppError::Config` when live mode has no API key
    /// - `AppError::ModelClient` when the provider call fails
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
        request_id: RequestId,
    ) -> AppResult<GenerationOutput> {
        let stage = request.stage();
        let span = tracing::info_span!(
            "generate",
            request_id = %request_id,
            stage = stage.as_str()
        );

        self.generate_inner(request, stage, now).instrument(span).await
    }

    async fn generate_inner(
        &self,
        request: &GenerateRequest,
        stage: Stage,
        now: DateTime<Utc>,
    ) -> AppResult<GenerationOutput> {
        let ctx = match request.validate() {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::info!(error = %e, "Request failed validation");
                self.record_error(ErrorKind::Validation);
                return Err(e);
            }
        };

        let metadata = ResponseMetadata::new(now, ctx.sender.clone(), ctx.tone);
        let server_flags = compliance::evaluate(ctx.required_action(), &ctx.confirmed_facts);

        let client = match &self.backend {
            Backend::Mock => {
                return Ok(self.finish(stage, Source::Mock, self.mock_output(stage, &ctx, &metadata)));
            }
            Backend::MissingApiKey => {
                self.record_error(ErrorKind::Config);
                return Err(AppError::Config(MISSING_API_KEY_MESSAGE.to_string()));
            }
            Backend::Live(client) => client,
        };

        let prompt = match stage {
            Stage::Initial => {
                PromptPayload::initial(&ctx, &metadata.formatted_time, &self.languages)
            }
            Stage::FollowUp => PromptPayload::follow_up(
                &ctx,
                &metadata.formatted_time,
                &request.follow_up_history(),
            ),
        };

        let text = match client.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                self.record_error(if e.is_unexpected() {
                    ErrorKind::Internal
                } else {
                    ErrorKind::Upstream
                });
                return Err(e.into());
            }
        };

        if text.trim().is_empty() {
            tracing::warn!("Model returned no text content, using mock output");
            return Ok(self.finish(stage, Source::Fallback, self.mock_output(stage, &ctx, &metadata)));
        }

        let parsed = match stage {
            Stage::Initial => match parse_generate_response(&text, &metadata, &server_flags) {
                ParseOutcome::Valid(response) => Ok(GenerationOutput::Initial(response)),
                ParseOutcome::Unusable(reason) => Err(reason),
            },
            Stage::FollowUp => match parse_follow_up_response(&text, &server_flags) {
                ParseOutcome::Valid(response) => Ok(GenerationOutput::FollowUp(response)),
                ParseOutcome::Unusable(reason) => Err(reason),
            },
        };

        match parsed {
            Ok(output) => Ok(self.finish(stage, Source::Model, output)),
            Err(reason) => {
                tracing::warn!(
                    reason = %reason,
                    response_length = text.len(),
                    "Model output unusable, using mock output"
                );
                Ok(self.finish(stage, Source::Fallback, self.mock_output(stage, &ctx, &metadata)))
            }
        }
    }

    fn finish(&self, stage: Stage, source: Source, output: GenerationOutput) -> GenerationOutput {
        tracing::info!(
            source = source.as_str(),
            flags = output.compliance_flags().len(),
            "Generation complete"
        );
        log_recording_failure(
            "record_generation",
            self.metrics.record_generation(stage, source),
        );
        output
    }
}
