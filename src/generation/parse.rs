//! Parsing and sanitizing of raw model output
//!
//! Model text is untrusted. It is parsed strictly first, then leniently from
//! the outermost `{...}` span, and finally coerced field by field into the
//! response contract. Nothing here returns a hard error: output that cannot be
//! used is reported as [`ParseOutcome::Unusable`] and the caller falls back to
//! the mock generator.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use super::compliance::merge_flags;
use super::{
    EmailContent, FollowUpContent, FollowUpGenerateResponse, GenerateResponse, ResponseMetadata,
    clip_sms,
};
use crate::incident::DEFAULT_READING_LEVEL;

/// Result of parsing model output
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Valid(T),
    Unusable(UnusableReason),
}

impl<T> ParseOutcome<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, ParseOutcome::Valid(_))
    }
}

/// Why model output was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnusableReason {
    #[error("no JSON object found in model output")]
    NoJson,
    #[error("extracted span is not valid JSON")]
    InvalidJson,
    #[error("model output is not a JSON object")]
    NotAnObject,
    #[error("model output has no follow_up object")]
    MissingFollowUp,
    #[error("model output has an empty or missing sms")]
    MissingSms,
    #[error("model output has an empty or missing email.subject")]
    MissingEmailSubject,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string).unwrap_or_default())
}

fn lenient_email<'de, D>(deserializer: D) -> Result<EmailContent, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };
    Ok(EmailContent {
        subject: field("subject"),
        body: field("body"),
    })
}

fn lenient_flags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// Open mapping of language code to SMS text; non-string values are dropped
fn lenient_translations<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_object()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(code, text)| text.as_str().map(|t| (code.clone(), clip_sms(t))))
                .collect()
        })
        .unwrap_or_default())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => Some(number),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawPackage {
    #[serde(default, deserialize_with = "lenient_string")]
    sms: String,
    #[serde(default, deserialize_with = "lenient_string")]
    voice_script: String,
    #[serde(default, deserialize_with = "lenient_email")]
    email: EmailContent,
    #[serde(default, deserialize_with = "lenient_string")]
    social_post: String,
    #[serde(default, deserialize_with = "lenient_translations")]
    translations: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_number")]
    readability_grade_estimate: Option<Number>,
    #[serde(default, deserialize_with = "lenient_flags")]
    compliance_flags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    follow_up_suggestion: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawFollowUp {
    #[serde(default, deserialize_with = "lenient_string")]
    sms: String,
    #[serde(default, deserialize_with = "lenient_email")]
    email: EmailContent,
    #[serde(default, deserialize_with = "lenient_flags")]
    compliance_flags: Vec<String>,
}

/// Find the JSON object in model text
///
/// Tries the whole text first, then the greedy span from the first `{` to the
/// last `}` (which tolerates prose and code fences around the object).
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, UnusableReason> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => {
            let span = match (text.find('{'), text.rfind('}')) {
                (Some(start), Some(end)) if start < end => &text[start..=end],
                _ => return Err(UnusableReason::NoJson),
            };
            serde_json::from_str::<Value>(span).map_err(|_| UnusableReason::InvalidJson)?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(UnusableReason::NotAnObject),
    }
}

fn require_minimum_shape(sms: &str, email: &EmailContent) -> Result<(), UnusableReason> {
    if sms.trim().is_empty() {
        return Err(UnusableReason::MissingSms);
    }
    if email.subject.trim().is_empty() {
        return Err(UnusableReason::MissingEmailSubject);
    }
    Ok(())
}

/// Parse an initial-alert package
///
/// `metadata` is attached unchanged; `server_flags` are merged after the
/// model's own flags.
pub fn parse_generate_response(
    text: &str,
    metadata: &ResponseMetadata,
    server_flags: &[String],
) -> ParseOutcome<GenerateResponse> {
    let map = match extract_json_object(text) {
        Ok(map) => map,
        Err(reason) => return ParseOutcome::Unusable(reason),
    };

    let raw = match RawPackage::deserialize(Value::Object(map)) {
        Ok(raw) => raw,
        Err(_) => return ParseOutcome::Unusable(UnusableReason::NotAnObject),
    };

    if let Err(reason) = require_minimum_shape(&raw.sms, &raw.email) {
        return ParseOutcome::Unusable(reason);
    }

    ParseOutcome::Valid(GenerateResponse {
        sms: clip_sms(&raw.sms),
        voice_script: raw.voice_script,
        email: raw.email,
        social_post: raw.social_post,
        translations: raw.translations,
        readability_grade_estimate: raw
            .readability_grade_estimate
            .unwrap_or_else(|| Number::from(DEFAULT_READING_LEVEL)),
        compliance_flags: merge_flags(raw.compliance_flags, server_flags),
        follow_up_suggestion: raw.follow_up_suggestion,
        metadata: metadata.clone(),
    })
}

/// Parse a follow-up package, scoped to the `follow_up` sub-object
pub fn parse_follow_up_response(
    text: &str,
    server_flags: &[String],
) -> ParseOutcome<FollowUpGenerateResponse> {
    let mut map = match extract_json_object(text) {
        Ok(map) => map,
        Err(reason) => return ParseOutcome::Unusable(reason),
    };

    let inner = match map.remove("follow_up") {
        Some(value @ Value::Object(_)) => value,
        _ => return ParseOutcome::Unusable(UnusableReason::MissingFollowUp),
    };

    let raw = match RawFollowUp::deserialize(inner) {
        Ok(raw) => raw,
        Err(_) => return ParseOutcome::Unusable(UnusableReason::MissingFollowUp),
    };

    if let Err(reason) = require_minimum_shape(&raw.sms, &raw.email) {
        return ParseOutcome::Unusable(reason);
    }

    ParseOutcome::Valid(FollowUpGenerateResponse {
        follow_up: FollowUpContent {
            sms: clip_sms(&raw.sms),
            email: raw.email,
            compliance_flags: merge_flags(raw.compliance_flags, server_flags),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::SMS_MAX_LENGTH;
    use crate::incident::Tone;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn metadata() -> ResponseMetadata {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        ResponseMetadata::new(now, "County OEM", Tone::Neutral)
    }

    fn valid_body() -> Value {
        json!({
            "sms": "ALERT: Fire at 123 Main St. Evacuate now.",
            "voice_script": "Attention residents.",
            "email": { "subject": "Fire at 123 Main St", "body": "Evacuate now." },
            "social_post": "Fire at 123 Main St.",
            "translations": { "es": "ALERTA: Incendio." },
            "readability_grade_estimate": 5,
            "compliance_flags": [],
            "follow_up_suggestion": "Update in 30 minutes."
        })
    }

    #[test]
    fn test_strict_json_parses() {
        let outcome = parse_generate_response(&valid_body().to_string(), &metadata(), &[]);
        let ParseOutcome::Valid(response) = outcome else {
            panic!("expected valid outcome");
        };
        assert_eq!(response.sms, "ALERT: Fire at 123 Main St. Evacuate now.");
        assert_eq!(response.readability_grade_estimate, Number::from(5));
        assert_eq!(response.metadata, metadata());
    }

    #[test]
    fn test_prose_and_code_fences_are_tolerated() {
        let text = format!(
            "Here is the JSON you asked for:\n```json\n{}\n```\nLet me know!",
            valid_body()
        );
        assert!(parse_generate_response(&text, &metadata(), &[]).is_valid());
    }

    #[test]
    fn test_text_without_braces_is_unusable() {
        let outcome = parse_generate_response("I cannot help with that.", &metadata(), &[]);
        assert_eq!(outcome, ParseOutcome::Unusable(UnusableReason::NoJson));
    }

    #[test]
    fn test_broken_span_is_unusable() {
        let outcome = parse_generate_response("{ \"sms\": \"hi\", oops }", &metadata(), &[]);
        assert_eq!(outcome, ParseOutcome::Unusable(UnusableReason::InvalidJson));
    }

    #[test]
    fn test_array_is_unusable() {
        let outcome = parse_generate_response("[1, 2, 3]", &metadata(), &[]);
        assert_eq!(outcome, ParseOutcome::Unusable(UnusableReason::NotAnObject));
    }

    #[test]
    fn test_missing_sms_or_subject_is_unusable() {
        let mut body = valid_body();
        body["sms"] = json!("");
        assert_eq!(
            parse_generate_response(&body.to_string(), &metadata(), &[]),
            ParseOutcome::Unusable(UnusableReason::MissingSms)
        );

        let mut body = valid_body();
        body["email"] = json!({ "body": "no subject" });
        assert_eq!(
            parse_generate_response(&body.to_string(), &metadata(), &[]),
            ParseOutcome::Unusable(UnusableReason::MissingEmailSubject)
        );
    }

    #[test]
    fn test_whitespace_sms_or_subject_is_unusable() {
        let mut body = valid_body();
        body["sms"] = json!("   ");
        assert_eq!(
            parse_generate_response(&body.to_string(), &metadata(), &[]),
            ParseOutcome::Unusable(UnusableReason::MissingSms)
        );

        let mut body = valid_body();
        body["email"]["subject"] = json!("\n\t");
        assert_eq!(
            parse_generate_response(&body.to_string(), &metadata(), &[]),
            ParseOutcome::Unusable(UnusableReason::MissingEmailSubject)
        );
    }

    #[test]
    fn test_fields_are_coerced() {
        let body = json!({
            "sms": "s".repeat(400),
            "voice_script": 42,
            "email": { "subject": "Subject", "body": ["not", "a", "string"] },
            "translations": { "es": "e".repeat(300), "fr": 7, "tl": "Babala" },
            "readability_grade_estimate": "six",
            "compliance_flags": ["Model flag.", 3, null],
            "follow_up_suggestion": null
        });
        let ParseOutcome::Valid(response) =
            parse_generate_response(&body.to_string(), &metadata(), &[])
        else {
            panic!("expected valid outcome");
        };

        assert_eq!(response.sms.chars().count(), SMS_MAX_LENGTH);
        assert_eq!(response.voice_script, "");
        assert_eq!(response.email.body, "");
        assert_eq!(response.social_post, "");
        assert_eq!(response.translations.len(), 2);
        assert_eq!(response.translations["es"].chars().count(), SMS_MAX_LENGTH);
        assert_eq!(response.translations["tl"], "Babala");
        assert_eq!(response.readability_grade_estimate, Number::from(6));
        assert_eq!(response.compliance_flags, vec!["Model flag."]);
        assert_eq!(response.follow_up_suggestion, "");
    }

    #[test]
    fn test_server_flags_are_merged_after_model_flags() {
        let mut body = valid_body();
        body["compliance_flags"] = json!(["Model flag.", "Missing required action step."]);
        let server = vec![
            "Missing required action step.".to_string(),
            "Insufficient confirmed details provided.".to_string(),
        ];

        let ParseOutcome::Valid(response) =
            parse_generate_response(&body.to_string(), &metadata(), &server)
        else {
            panic!("expected valid outcome");
        };
        assert_eq!(
            response.compliance_flags,
            vec![
                "Model flag.",
                "Missing required action step.",
                "Insufficient confirmed details provided."
            ]
        );
    }

    #[test]
    fn test_follow_up_parses_sub_object() {
        let text = json!({
            "follow_up": {
                "sms": "UPDATE: Fire contained at 123 Main St.",
                "email": { "subject": "Update: Fire", "body": "Contained." },
                "compliance_flags": ["Model flag."]
            }
        })
        .to_string();

        let server = vec!["Missing required action step.".to_string()];
        let ParseOutcome::Valid(response) = parse_follow_up_response(&text, &server) else {
            panic!("expected valid outcome");
        };
        assert_eq!(response.follow_up.email.subject, "Update: Fire");
        assert_eq!(
            response.follow_up.compliance_flags,
            vec!["Model flag.", "Missing required action step."]
        );
    }

    #[test]
    fn test_follow_up_without_sub_object_is_unusable() {
        let outcome = parse_follow_up_response(&valid_body().to_string(), &[]);
        assert_eq!(outcome, ParseOutcome::Unusable(UnusableReason::MissingFollowUp));
    }
}
