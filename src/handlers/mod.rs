//! HTTP request handlers for the crisiscast API

use crate::config::{Config, EnvOverrides};
use crate::delivery::{DeliveryCredentials, Dispatcher};
use crate::error::{AppError, AppResult};
use crate::generation::pipeline::{Backend, GenerationPipeline};
use crate::incidents::IncidentLog;
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod delivery;
pub mod extractor;
pub mod generate;
pub mod health;
pub mod incidents;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pipeline: Arc<GenerationPipeline>,
    incidents: Arc<IncidentLog>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create the state from configuration and the startup environment
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the metrics registry cannot be built,
    /// or `AppError::Config` if the provider client cannot be created.
    pub fn new(
        config: Config,
        env: EnvOverrides,
        credentials: DeliveryCredentials,
    ) -> AppResult<Self> {
        let metrics = Arc::new(build_metrics()?);
        let backend = Backend::from_settings(&config, &env, metrics.clone())?;
        Ok(Self::assemble(config, backend, credentials, metrics))
    }

    /// Create the state around an already chosen generation backend
    pub fn with_backend(
        config: Config,
        backend: Backend,
        credentials: DeliveryCredentials,
    ) -> AppResult<Self> {
        let metrics = Arc::new(build_metrics()?);
        Ok(Self::assemble(config, backend, credentials, metrics))
    }

    fn assemble(
        config: Config,
        backend: Backend,
        credentials: DeliveryCredentials,
        metrics: Arc<Metrics>,
    ) -> Self {
        let pipeline = GenerationPipeline::new(
            backend,
            config.generation.translation_languages.clone(),
            metrics.clone(),
        );
        let dispatcher = Dispatcher::new(&config.delivery, credentials);

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            incidents: Arc::new(IncidentLog::new()),
            dispatcher: Arc::new(dispatcher),
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }

    pub fn incidents(&self) -> &IncidentLog {
        &self.incidents
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

fn build_metrics() -> AppResult<Metrics> {
    Metrics::new().map_err(|e| AppError::Internal(format!("failed to initialize metrics: {}", e)))
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/api/generate", post(generate::handler))
        .route(
            "/api/incidents",
            get(incidents::list).post(incidents::create),
        )
        .route("/api/incidents/{id}", get(incidents::show))
        .route(
            "/api/incidents/{id}/follow-up-sent",
            post(incidents::follow_up_sent),
        )
        .route("/api/incidents/{id}/all-clear", post(incidents::all_clear))
        .route("/api/incidents/{id}/resolve", post(incidents::resolve))
        .route(
            "/api/incidents/{id}/follow-ups",
            post(incidents::add_follow_up),
        )
        .route("/api/send-sms", post(delivery::send_sms))
        .route("/api/send-email", post(delivery::send_email))
        .route("/api/post-social", post(delivery::post_social))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
