//! Command-line interface for crisiscast
//!
//! Provides argument parsing and subcommand handling for the crisiscast binary.

use clap::{Parser, Subcommand};

/// Emergency notification drafting service
#[derive(Parser)]
#[command(name = "crisiscast")]
#[command(version)]
#[command(about = "Emergency notification drafting service")]
#[command(
    long_about = "crisiscast turns a structured incident report into a multi-channel \
    public alert package (SMS, voice, email, social, translations) with compliance flags, \
    using a hosted model or deterministic templates."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# crisiscast Configuration
# =========================
#
# Every section is optional; omitted values fall back to the defaults shown.
#
# Secrets are never read from this file. Set them in the environment:
#   ANTHROPIC_API_KEY      provider key (live generation)
#   ANTHROPIC_MODEL        model override
#   LLM_MOCK=true          force template output
#   TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER, SMS_TO_NUMBER
#   SMTP_HOST, SMTP_PORT, SMTP_USER, SMTP_PASS, EMAIL_FROM, EMAIL_TO
#   FACEBOOK_PAGE_ID, FACEBOOK_PAGE_ACCESS_TOKEN

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# ─────────────────────────────────────────────────────────────────────────────
# MODEL PROVIDER
# ─────────────────────────────────────────────────────────────────────────────

[provider]
# Messages endpoint
api_url = "https://api.anthropic.com/v1/messages"

# Protocol version header
api_version = "2023-06-01"

# Model id (ANTHROPIC_MODEL overrides this)
model = "claude-sonnet-4-20250514"

# Maximum tokens to generate (must be > 0)
max_tokens = 1000

# Sampling temperature (0.0-2.0); low values keep alerts consistent
temperature = 0.3

# Network timeout for a single provider request, in seconds (1-300)
request_timeout_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# RETRY POLICY
# ─────────────────────────────────────────────────────────────────────────────
#
# A request is attempted at most max_retries + 1 times. delays_ms[i] is the
# wait after the (i+1)-th retryable failure and needs at least max_retries
# entries. Other statuses fail immediately.

[retry]
max_retries = 3
delays_ms = [1000, 2000, 4000]
retryable_statuses = [429, 502, 503, 529]

# ─────────────────────────────────────────────────────────────────────────────
# GENERATION
# ─────────────────────────────────────────────────────────────────────────────

[generation]
# Serve deterministic template output without calling the provider
mock = false

# Translation languages requested from the model and produced by templates.
# Supported: es, fr, ar, zh, hi
translation_languages = ["es", "fr", "ar", "zh", "hi"]

# ─────────────────────────────────────────────────────────────────────────────
# DELIVERY GATEWAYS
# ─────────────────────────────────────────────────────────────────────────────

[delivery]
twilio_api_base = "https://api.twilio.com"
facebook_api_base = "https://graph.facebook.com"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG takes precedence)
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
