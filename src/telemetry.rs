//! Structured logging for the crisiscast server
//!
//! One `fmt` layer behind an `EnvFilter`. `RUST_LOG` wins when set; otherwise
//! the `[observability] log_level` from config applies to crisiscast's own
//! spans, and tower-http request traces are kept at debug.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Filter directives used when `RUST_LOG` is unset
///
/// Only crisiscast and tower-http targets are enabled, so dependency chatter
/// from reqwest, hyper or lettre stays off unless asked for.
pub fn default_directives(level: &str) -> String {
    format!("crisiscast={},tower_http=debug", level)
}

/// Install the global subscriber
///
/// Later calls are ignored, so tests and the binary can both call it.
///
/// ```no_run
/// crisiscast::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
