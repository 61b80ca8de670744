//! Notification generation pipeline
//!
//! Turns an [`IncidentContext`](crate::incident::IncidentContext) into a
//! multi-channel notification package, either through the model provider or
//! through the deterministic mock generator.
//!
//! - `prompts`: system and user instructions sent to the provider
//! - `client`: provider HTTP client with bounded retry
//! - `parse`: strict/lenient extraction and sanitizing of model output
//! - `compliance`: server-side compliance flags
//! - `mock`: deterministic substitute output
//! - `pipeline`: per-request orchestration and fallback

pub mod client;
pub mod compliance;
pub mod mock;
pub mod parse;
pub mod pipeline;
pub mod prompts;

use crate::incident::Tone;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hard ceiling for SMS bodies and SMS translations, in characters
pub const SMS_MAX_LENGTH: usize = 160;

/// Truncate text to [`SMS_MAX_LENGTH`] characters
///
/// Counts Unicode scalar values, so multi-byte scripts are never split
/// mid-character.
pub fn clip_sms(text: &str) -> String {
    text.chars().take(SMS_MAX_LENGTH).collect()
}

/// Request metadata attached unchanged to every response variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub timestamp_iso: String,
    /// Server-local 12-hour clock time, e.g. "3:07 PM"
    pub formatted_time: String,
    pub sender: String,
    pub tone: Tone,
}

impl ResponseMetadata {
    pub fn new(now: DateTime<Utc>, sender: impl Into<String>, tone: Tone) -> Self {
        Self {
            timestamp_iso: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            formatted_time: now.with_timezone(&Local).format("%-I:%M %p").to_string(),
            sender: sender.into(),
            tone,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Complete initial notification package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub sms: String,
    pub voice_script: String,
    pub email: EmailContent,
    pub social_post: String,
    /// Language code to translated SMS; keys are whatever the producer supplied
    pub translations: BTreeMap<String, String>,
    pub readability_grade_estimate: serde_json::Number,
    pub compliance_flags: Vec<String>,
    pub follow_up_suggestion: String,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpContent {
    pub sms: String,
    pub email: EmailContent,
    pub compliance_flags: Vec<String>,
}

/// Follow-up update package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpGenerateResponse {
    pub follow_up: FollowUpContent,
}

/// Body returned by `POST /api/generate`, depending on the requested stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerationOutput {
    Initial(GenerateResponse),
    FollowUp(FollowUpGenerateResponse),
}

impl GenerationOutput {
    /// SMS text of whichever package this is
    pub fn sms(&self) -> &str {
        match self {
            GenerationOutput::Initial(response) => &response.sms,
            GenerationOutput::FollowUp(response) => &response.follow_up.sms,
        }
    }

    pub fn compliance_flags(&self) -> &[String] {
        match self {
            GenerationOutput::Initial(response) => &response.compliance_flags,
            GenerationOutput::FollowUp(response) => &response.follow_up.compliance_flags,
        }
    }
}
