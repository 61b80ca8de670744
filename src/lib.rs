//! crisiscast - emergency notification drafting service
//!
//! Turns a structured incident report into a multi-channel public alert
//! package (SMS, voice script, email, social post, translations) with
//! compliance flags. Content comes from a hosted model when one is configured
//! and from deterministic templates otherwise; unusable model output always
//! falls back to the templates.

pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod incident;
pub mod incidents;
pub mod lifecycle;
pub mod metrics;
pub mod middleware;
pub mod telemetry;
