//! Configuration management for Crisiscast
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Secrets and deployment switches come from the environment and are read
//! once at startup into [`EnvOverrides`].

use crate::error::{AppError, AppResult};
use crate::generation::client::RetryPolicy;
use crate::generation::mock::SUPPORTED_TRANSLATIONS;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
///
/// Every section is optional; an empty file yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Model provider configuration
///
/// Fields are private to keep validated values immutable after loading.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    api_url: String,
    #[serde(default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f64,
    /// Network-level timeout for a single provider request
    #[serde(default = "default_request_timeout")]
    request_timeout_seconds: u64,
}

impl ProviderConfig {
    /// Get the messages endpoint URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Get the protocol version sent with every request
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Get the configured model id (may be overridden by `ANTHROPIC_MODEL`)
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the maximum number of tokens to generate
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Get the sampling temperature
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Get the per-request network timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Point the provider at a different messages endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.3
}

fn default_request_timeout() -> u64 {
    60
}

/// Retry configuration for transient provider failures
///
/// `delays_ms[i]` is slept after the (i+1)-th failed attempt. The list must be
/// at least `max_retries` long; this is checked by [`Config::validate`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    max_retries: usize,
    #[serde(default = "default_delays_ms")]
    delays_ms: Vec<u64>,
    #[serde(default = "default_retryable_statuses")]
    retryable_statuses: Vec<u16>,
}

impl RetryConfig {
    /// Build the runtime retry policy
    pub fn policy(&self) -> AppResult<RetryPolicy> {
        RetryPolicy::new(
            self.max_retries,
            self.delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            self.retryable_statuses.clone(),
        )
        .map_err(|reason| AppError::Config(format!("retry: {}", reason)))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delays_ms: default_delays_ms(),
            retryable_statuses: default_retryable_statuses(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_delays_ms() -> Vec<u64> {
    vec![1000, 2000, 4000]
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![429, 502, 503, 529]
}

/// Generation behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Serve deterministic mock output without calling the provider
    #[serde(default)]
    pub mock: bool,
    /// Language codes requested from the model and produced by the mock generator
    #[serde(default = "default_translation_languages")]
    pub translation_languages: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mock: false,
            translation_languages: default_translation_languages(),
        }
    }
}

fn default_translation_languages() -> Vec<String> {
    SUPPORTED_TRANSLATIONS
        .iter()
        .map(|code| code.to_string())
        .collect()
}

/// Base URLs for delivery gateways
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_twilio_api_base")]
    pub twilio_api_base: String,
    #[serde(default = "default_facebook_api_base")]
    pub facebook_api_base: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            twilio_api_base: default_twilio_api_base(),
            facebook_api_base: default_facebook_api_base(),
        }
    }
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_facebook_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when a
    /// `Config` is assembled by other means.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;

        if !provider.api_url.starts_with("http://") && !provider.api_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "provider.api_url '{}' must start with 'http://' or 'https://'",
                provider.api_url
            )));
        }

        if provider.model.trim().is_empty() {
            return Err(AppError::Config(
                "provider.model cannot be empty".to_string(),
            ));
        }

        if provider.max_tokens == 0 {
            return Err(AppError::Config(
                "provider.max_tokens must be greater than 0".to_string(),
            ));
        }

        if !provider.temperature.is_finite()
            || provider.temperature < 0.0
            || provider.temperature > 2.0
        {
            return Err(AppError::Config(format!(
                "provider.temperature must be a finite number between 0.0 and 2.0, got {}",
                provider.temperature
            )));
        }

        if provider.request_timeout_seconds == 0 || provider.request_timeout_seconds > 300 {
            return Err(AppError::Config(format!(
                "provider.request_timeout_seconds must be in (0, 300], got {}",
                provider.request_timeout_seconds
            )));
        }

        // Delay lookup is indexed by attempt; a short list would leave retries without a delay
        self.retry.policy()?;

        let languages = &self.generation.translation_languages;
        if languages.is_empty() {
            return Err(AppError::Config(
                "generation.translation_languages must list at least one language".to_string(),
            ));
        }
        for code in languages {
            if !SUPPORTED_TRANSLATIONS.contains(&code.as_str()) {
                return Err(AppError::Config(format!(
                    "generation.translation_languages contains unsupported code '{}'. \
                    Supported: {}",
                    code,
                    SUPPORTED_TRANSLATIONS.join(", ")
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

/// Settings taken from the process environment
///
/// Read once at startup and handed to the generation pipeline; nothing in the
/// request path touches `std::env`.
#[derive(Clone, Default)]
pub struct EnvOverrides {
    /// `ANTHROPIC_API_KEY`; absence selects the missing-credentials path
    pub api_key: Option<SecretString>,
    /// `LLM_MOCK="true"` forces the mock generator
    pub mock: bool,
    /// `ANTHROPIC_MODEL` overrides `provider.model`
    pub model: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            api_key: non_empty("ANTHROPIC_API_KEY").map(SecretString::from),
            mock: non_empty("LLM_MOCK").is_some_and(|value| value == "true"),
            model: non_empty("ANTHROPIC_MODEL"),
        }
    }
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOverrides")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("mock", &self.mock)
            .field("model", &self.model)
            .finish()
    }
}
