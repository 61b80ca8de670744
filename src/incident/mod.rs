//! Incident request types and validation
//!
//! `GenerateRequest` is the raw inbound body. `validate()` turns it into an
//! [`IncidentContext`], the defaulted, immutable view every other module works
//! from.

use crate::error::{AppError, AppResult};
use serde::de::IntoDeserializer;
use serde::de::value::StrDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_AUDIENCE: &str = "general public";
pub const DEFAULT_SENDER: &str = "Emergency Management Office";
pub const DEFAULT_READING_LEVEL: u8 = 6;
pub const MIN_READING_LEVEL: u8 = 1;
pub const MAX_READING_LEVEL: u8 = 12;

/// Kind of incident being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentType {
    #[serde(rename = "Gas Leak")]
    GasLeak,
    Fire,
    #[serde(rename = "Severe Weather")]
    SevereWeather,
    Lockdown,
    #[serde(rename = "Utility Outage")]
    UtilityOutage,
}

impl IncidentType {
    pub const ALL: [IncidentType; 5] = [
        IncidentType::GasLeak,
        IncidentType::Fire,
        IncidentType::SevereWeather,
        IncidentType::Lockdown,
        IncidentType::UtilityOutage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::GasLeak => "Gas Leak",
            IncidentType::Fire => "Fire",
            IncidentType::SevereWeather => "Severe Weather",
            IncidentType::Lockdown => "Lockdown",
            IncidentType::UtilityOutage => "Utility Outage",
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Unknown incidentType '{}'. Expected one of: {}",
                    s,
                    Self::ALL.map(|kind| kind.as_str()).join(", ")
                ))
            })
    }
}

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Low" => Ok(Severity::Low),
            "Medium" => Ok(Severity::Medium),
            "High" => Ok(Severity::High),
            other => Err(AppError::Validation(format!(
                "Unknown severity '{}'. Expected one of: Low, Medium, High",
                other
            ))),
        }
    }
}

/// Voice of the generated messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tone {
    /// Reassuring, steady
    Calm,
    /// Clear and direct
    #[default]
    Neutral,
    /// Concise and commanding
    Urgent,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Calm => "Calm",
            Tone::Neutral => "Neutral",
            Tone::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Calm" => Ok(Tone::Calm),
            "Neutral" => Ok(Tone::Neutral),
            "Urgent" => Ok(Tone::Urgent),
            other => Err(AppError::Validation(format!(
                "Unknown tone '{}'. Expected one of: Calm, Neutral, Urgent",
                other
            ))),
        }
    }
}

/// Which message package a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Initial,
    FollowUp,
}

impl Stage {
    /// Convert stage to its wire/label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::FollowUp => "follow_up",
        }
    }
}

/// Raw `POST /api/generate` body
///
/// Every field is optional at this layer so that missing fields can be
/// reported together by [`GenerateRequest::validate`]. A body that is not a
/// JSON object, or whose fields have the wrong JSON type, is rejected earlier
/// by the extractor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// A blank string is treated as absent
    #[serde(default, deserialize_with = "blank_stage_as_none")]
    pub stage: Option<Stage>,
    pub incident_type: Option<String>,
    pub location: Option<String>,
    pub severity: Option<String>,
    pub confirmed_facts: Option<String>,
    pub required_action: Option<String>,
    pub audience: Option<String>,
    /// Kept untyped: non-numeric values fall back to the default level
    pub reading_level: Option<serde_json::Value>,
    pub tone: Option<String>,
    pub sender: Option<String>,
    pub previous_sms: Option<String>,
    pub last_follow_up_sms: Option<String>,
}

fn blank_stage_as_none<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            let de: StrDeserializer<'_, D::Error> = raw.as_str().into_deserializer();
            Stage::deserialize(de).map(Some)
        }
        _ => Ok(None),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl GenerateRequest {
    /// Requested stage, `initial` when absent
    pub fn stage(&self) -> Stage {
        self.stage.unwrap_or_default()
    }

    /// Validate required fields and apply defaults
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when a required field is missing or
    /// blank, when an enum field carries an unknown value, or when a numeric
    /// reading level is outside 1–12.
    pub fn validate(&self) -> AppResult<IncidentContext> {
        let required = [
            ("incidentType", &self.incident_type),
            ("location", &self.location),
            ("confirmedFacts", &self.confirmed_facts),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| non_blank(value).is_none())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let incident_type: IncidentType = non_blank(&self.incident_type)
            .unwrap_or_default()
            .parse()?;
        let severity = match non_blank(&self.severity) {
            Some(raw) => raw.parse()?,
            None => Severity::default(),
        };
        let tone = match non_blank(&self.tone) {
            Some(raw) => raw.parse()?,
            None => Tone::default(),
        };

        Ok(IncidentContext {
            incident_type,
            location: self.location.clone().unwrap_or_default(),
            severity,
            confirmed_facts: self.confirmed_facts.clone().unwrap_or_default(),
            required_action: non_blank(&self.required_action).map(str::to_string),
            audience: non_blank(&self.audience)
                .unwrap_or(DEFAULT_AUDIENCE)
                .to_string(),
            reading_level: parse_reading_level(self.reading_level.as_ref())?,
            tone,
            sender: non_blank(&self.sender).unwrap_or(DEFAULT_SENDER).to_string(),
        })
    }

    /// Previous messages supplied for follow-up drafting
    pub fn follow_up_history(&self) -> FollowUpHistory {
        FollowUpHistory {
            previous_sms: non_blank(&self.previous_sms).map(str::to_string),
            last_follow_up_sms: non_blank(&self.last_follow_up_sms).map(str::to_string),
        }
    }
}

fn parse_reading_level(value: Option<&serde_json::Value>) -> AppResult<u8> {
    let Some(serde_json::Value::Number(number)) = value else {
        return Ok(DEFAULT_READING_LEVEL);
    };

    // Whole floats such as `6.0` count as integers
    number
        .as_f64()
        .filter(|level| level.fract() == 0.0)
        .filter(|level| {
            (f64::from(MIN_READING_LEVEL)..=f64::from(MAX_READING_LEVEL)).contains(level)
        })
        .map(|level| level as u8)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "readingLevel must be an integer between {} and {}, got {}",
                MIN_READING_LEVEL, MAX_READING_LEVEL, number
            ))
        })
}

/// Validated, defaulted description of one incident
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentContext {
    pub incident_type: IncidentType,
    pub location: String,
    pub severity: Severity,
    pub confirmed_facts: String,
    pub required_action: Option<String>,
    pub audience: String,
    pub reading_level: u8,
    pub tone: Tone,
    pub sender: String,
}

impl IncidentContext {
    /// Context with every optional field at its default
    pub fn new(
        incident_type: IncidentType,
        location: impl Into<String>,
        confirmed_facts: impl Into<String>,
    ) -> Self {
        Self {
            incident_type,
            location: location.into(),
            severity: Severity::default(),
            confirmed_facts: confirmed_facts.into(),
            required_action: None,
            audience: DEFAULT_AUDIENCE.to_string(),
            reading_level: DEFAULT_READING_LEVEL,
            tone: Tone::default(),
            sender: DEFAULT_SENDER.to_string(),
        }
    }

    pub fn with_required_action(mut self, action: impl Into<String>) -> Self {
        self.required_action = Some(action.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_reading_level(mut self, level: u8) -> Self {
        self.reading_level = level;
        self
    }

    /// Required action, if one was supplied
    pub fn required_action(&self) -> Option<&str> {
        self.required_action.as_deref()
    }
}

/// Messages already sent for an incident, used when drafting a follow-up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowUpHistory {
    pub previous_sms: Option<String>,
    pub last_follow_up_sms: Option<String>,
}
