//! Model provider client
//!
//! Sends one Messages API request per attempt and retries transient failures
//! with a fixed, ordered delay schedule. The whole exchange is sequential; the
//! only suspension points are the HTTP call and the retry sleep (dropping the
//! future cancels either).

use crate::config::ProviderConfig;
use crate::metrics::{AttemptOutcome, Metrics, log_recording_failure};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::prompts::PromptPayload;

/// Bounded retry schedule for transient provider failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: usize,
    delays: Vec<Duration>,
    retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when `delays` has fewer entries
    /// than `max_retries`.
    pub fn new(
        max_retries: usize,
        delays: Vec<Duration>,
        retryable_statuses: Vec<u16>,
    ) -> Result<Self, String> {
        if delays.len() < max_retries {
            return Err(format!(
                "delays list has {} entries but max_retries is {}; \
                 every retry needs a delay",
                delays.len(),
                max_retries
            ));
        }

        Ok(Self {
            max_retries,
            delays,
            retryable_statuses,
        })
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Total attempts, including the first one
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Delay to sleep after the failed attempt with zero-based index `attempt`
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.delays.get(attempt).copied().unwrap_or_default()
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            retryable_statuses: vec![429, 502, 503, 529],
        }
    }
}

/// Failures returned by a completion client
#[derive(Debug, thiserror::Error)]
pub enum ModelClientError {
    /// Provider answered with a non-retryable error status
    #[error("Anthropic API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Every attempt hit a retryable status
    #[error("Anthropic API rate limited after {retries} retries: {last_body}")]
    RateLimited { retries: usize, last_body: String },

    /// Connection, TLS, or timeout failure
    #[error("Model provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Success status but the body is not JSON
    #[error("Model provider returned an undecodable response: {0}")]
    Decode(String),
}

impl ModelClientError {
    /// True for failures whose details must not reach the caller
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            ModelClientError::Transport(_) | ModelClientError::Decode(_)
        )
    }
}

/// Something that turns a prompt into completion text
///
/// Allows dependency injection of stub clients in tests. An empty string means
/// the provider answered successfully without any text block.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &PromptPayload) -> Result<String, ModelClientError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Text of the first `text` content block, or an empty string when there is none
pub fn extract_text(body: &str) -> Result<String, ModelClientError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ModelClientError::Decode(format!("invalid JSON body: {}", e)))?;

    let text = value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(text.to_string())
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    http: reqwest::Client,
    api_url: String,
    api_version: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    /// Never exposed in logs or debug output
    api_key: SecretString,
    retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .finish()
    }
}

impl AnthropicClient {
    /// Build a client from provider settings
    ///
    /// `model_override` (from `ANTHROPIC_MODEL`) replaces the configured model.
    pub fn new(
        provider: &ProviderConfig,
        model_override: Option<String>,
        api_key: SecretString,
        retry: RetryPolicy,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ModelClientError> {
        let http = reqwest::Client::builder()
            .timeout(provider.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: provider.api_url().to_string(),
            api_version: provider.api_version().to_string(),
            model: model_override.unwrap_or_else(|| provider.model().to_string()),
            max_tokens: provider.max_tokens(),
            temperature: provider.temperature(),
            api_key,
            retry,
            metrics,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn record_attempt(&self, outcome: AttemptOutcome) {
        log_recording_failure("record_model_attempt", self.metrics.record_model_attempt(outcome));
    }

    async fn send_with_retry(&self, body: &MessagesRequest<'_>) -> Result<String, ModelClientError> {
        let mut last_body = String::new();

        for attempt in 0..self.retry.max_attempts() {
            let response = match self
                .http
                .post(&self.api_url)
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", &self.api_version)
                .json(body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.record_attempt(AttemptOutcome::Failed);
                    tracing::error!(
                        attempt = attempt + 1,
                        error = %e,
                        "Model provider request failed at transport level"
                    );
                    return Err(ModelClientError::Transport(e));
                }
            };

            let status = response.status();

            if self.retry.is_retryable(status.as_u16()) {
                self.record_attempt(AttemptOutcome::Retryable);
                last_body = response.text().await.unwrap_or_default();

                if attempt < self.retry.max_retries() {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries(),
                        status = status.as_u16(),
                        delay_ms = delay.as_millis() as u64,
                        "Retryable provider status, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break;
            }

            if !status.is_success() {
                self.record_attempt(AttemptOutcome::Failed);
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    attempt = attempt + 1,
                    status = status.as_u16(),
                    "Provider returned non-retryable error status"
                );
                return Err(ModelClientError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            self.record_attempt(AttemptOutcome::Success);
            let text = response.text().await?;
            tracing::debug!(
                attempt = attempt + 1,
                response_length = text.len(),
                "Provider call succeeded"
            );
            return extract_text(&text);
        }

        tracing::error!(
            max_retries = self.retry.max_retries(),
            "Provider retries exhausted"
        );
        Err(ModelClientError::RateLimited {
            retries: self.retry.max_retries(),
            last_body,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, prompt: &PromptPayload) -> Result<String, ModelClientError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: prompt.system,
            messages: [UserMessage {
                role: "user",
                content: &prompt.user,
            }],
        };

        let started = Instant::now();
        let result = self.send_with_retry(&body).await;
        log_recording_failure(
            "observe_model_call",
            self.metrics
                .observe_model_call(started.elapsed().as_secs_f64()),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_rejects_short_delay_list() {
        let result = RetryPolicy::new(3, vec![Duration::from_millis(1)], vec![429]);
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_policy_allows_longer_delay_list() {
        let policy = RetryPolicy::new(
            1,
            vec![Duration::from_millis(5), Duration::from_millis(10)],
            vec![429],
        )
        .expect("valid policy");
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay_for(0), Duration::from_millis(5));
    }

    #[test]
    fn test_default_policy_matches_provider_guidance() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        for status in [429, 502, 503, 529] {
            assert!(policy.is_retryable(status), "{} should be retryable", status);
        }
        assert!(!policy.is_retryable(400));
    }

    #[test]
    fn test_extract_text_takes_first_text_block() {
        let body = r#"{"content":[{"type":"tool_use","id":"x"},{"type":"text","text":"hello"},{"type":"text","text":"second"}]}"#;
        assert_eq!(extract_text(body).expect("should decode"), "hello");
    }

    #[test]
    fn test_extract_text_without_text_block_is_empty() {
        assert_eq!(extract_text(r#"{"content":[]}"#).expect("decode"), "");
        assert_eq!(extract_text(r#"{"id":"msg_1"}"#).expect("decode"), "");
    }

    #[test]
    fn test_extract_text_rejects_non_json() {
        let err = extract_text("<html>oops</html>").expect_err("should fail");
        assert!(matches!(err, ModelClientError::Decode(_)));
        assert!(err.is_unexpected());
    }

    #[test]
    fn test_error_messages() {
        let api = ModelClientError::Api {
            status: 401,
            body: "invalid x-api-key".to_string(),
        };
        assert_eq!(api.to_string(), "Anthropic API error (401): invalid x-api-key");
        assert!(!api.is_unexpected());

        let limited = ModelClientError::RateLimited {
            retries: 3,
            last_body: "overloaded".to_string(),
        };
        assert_eq!(
            limited.to_string(),
            "Anthropic API rate limited after 3 retries: overloaded"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let metrics = Arc::new(Metrics::new().expect("metrics"));
        let client = AnthropicClient::new(
            &ProviderConfig::default(),
            None,
            SecretString::from("sk-ant-secret"),
            RetryPolicy::default(),
            metrics,
        )
        .expect("client should build");

        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_model_override_wins() {
        let metrics = Arc::new(Metrics::new().expect("metrics"));
        let client = AnthropicClient::new(
            &ProviderConfig::default(),
            Some("claude-test".to_string()),
            SecretString::from("k"),
            RetryPolicy::default(),
            metrics,
        )
        .expect("client should build");
        assert_eq!(client.model(), "claude-test");
    }
}
