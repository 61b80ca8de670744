//! Prometheus metrics collection for Crisiscast
//!
//! Tracks:
//! - Generated notification packages by stage and by where the content came from
//! - Individual model provider attempts by outcome
//! - Generation requests that ended in an error, by error class
//! - Model call latency
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use crate::incident::Stage;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Where the returned content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Parsed and sanitized model output
    Model,
    /// Mock generator selected up front (mock mode)
    Mock,
    /// Mock generator used because the model output was empty or unusable
    Fallback,
}

impl Source {
    /// Convert source to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Model => "model",
            Source::Mock => "mock",
            Source::Fallback => "fallback",
        }
    }
}

/// Outcome of a single HTTP attempt against the model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Retryable status (rate limit or overload)
    Retryable,
    /// Non-retryable status or transport failure
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Retryable => "retryable",
            AttemptOutcome::Failed => "failed",
        }
    }
}

/// Error class for generation requests that did not produce content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    Upstream,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Config => "config",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Metrics collector for Crisiscast
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    generations: IntCounterVec,
    model_attempts: IntCounterVec,
    generation_errors: IntCounterVec,
    model_call_duration: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 stages × 3 sources = 6 time series
        let generations = IntCounterVec::new(
            Opts::new(
                "crisiscast_generations_total",
                "Total notification packages returned, by stage and content source",
            ),
            &["stage", "source"],
        )?;

        let model_attempts = IntCounterVec::new(
            Opts::new(
                "crisiscast_model_attempts_total",
                "Total HTTP attempts against the model provider, by outcome",
            ),
            &["outcome"],
        )?;

        let generation_errors = IntCounterVec::new(
            Opts::new(
                "crisiscast_generation_errors_total",
                "Total generation requests that ended in an error response, by error kind",
            ),
            &["kind"],
        )?;

        let model_call_duration = Histogram::with_opts(
            HistogramOpts::new(
                "crisiscast_model_call_duration_seconds",
                "Wall time of a complete model call including retries",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]),
        )?;

        registry.register(Box::new(generations.clone()))?;
        registry.register(Box::new(model_attempts.clone()))?;
        registry.register(Box::new(generation_errors.clone()))?;
        registry.register(Box::new(model_call_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            generations,
            model_attempts,
            generation_errors,
            model_call_duration,
        })
    }

    /// Record a returned notification package
    pub fn record_generation(&self, stage: Stage, source: Source) -> Result<(), prometheus::Error> {
        self.generations
            .get_metric_with_label_values(&[stage.as_str(), source.as_str()])?
            .inc();
        Ok(())
    }

    /// Record one provider attempt
    pub fn record_model_attempt(&self, outcome: AttemptOutcome) -> Result<(), prometheus::Error> {
        self.model_attempts
            .get_metric_with_label_values(&[outcome.as_str()])?
            .inc();
        Ok(())
    }

    /// Record a generation request that ended in an error
    pub fn record_generation_error(&self, kind: ErrorKind) -> Result<(), prometheus::Error> {
        self.generation_errors
            .get_metric_with_label_values(&[kind.as_str()])?
            .inc();
        Ok(())
    }

    /// Record the duration of a complete model call
    ///
    /// # Errors
    ///
    /// Returns an error if `seconds` is NaN, infinite, or negative.
    pub fn observe_model_call(&self, seconds: f64) -> Result<(), prometheus::Error> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "model call duration must be finite and non-negative, got {}",
                seconds
            )));
        }
        self.model_call_duration.observe(seconds);
        Ok(())
    }

    /// Current count of returned packages for a stage/source pair
    pub fn generation_count(&self, stage: Stage, source: Source) -> u64 {
        self.generations
            .get_metric_with_label_values(&[stage.as_str(), source.as_str()])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Current count of provider attempts with the given outcome
    pub fn model_attempt_count(&self, outcome: AttemptOutcome) -> u64 {
        self.model_attempts
            .get_metric_with_label_values(&[outcome.as_str()])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Encode all registered metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}

/// Log-and-continue wrapper used at every recording site
///
/// Observability failures never fail a request.
pub(crate) fn log_recording_failure(operation: &str, result: Result<(), prometheus::Error>) {
    if let Err(e) = result {
        tracing::error!(
            operation = operation,
            error = %e,
            "Metrics recording failed. Observability degraded but request continues."
        );
    }
}
