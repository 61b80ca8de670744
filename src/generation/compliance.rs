//! Server-side compliance checks
//!
//! These flags are computed from the request alone and are always present in
//! the final output, whatever the model declares.

use crate::incident::Severity;

use super::SMS_MAX_LENGTH;

pub const MISSING_ACTION_FLAG: &str = "Missing required action step.";
pub const INSUFFICIENT_DETAILS_FLAG: &str = "Insufficient confirmed details provided.";
pub const SMS_TOO_LONG_FLAG: &str = "SMS exceeds 160 character limit.";
pub const HIGH_SEVERITY_MISSING_ACTION_FLAG: &str =
    "Missing required action for high severity incident.";

/// Confirmed facts shorter than this (in characters) are flagged
pub const MIN_CONFIRMED_FACTS_LENGTH: usize = 15;

fn is_missing(action: Option<&str>) -> bool {
    action.is_none_or(|a| a.trim().is_empty())
}

fn too_few_details(confirmed_facts: &str) -> bool {
    confirmed_facts.chars().count() < MIN_CONFIRMED_FACTS_LENGTH
}

/// Compliance flags for a generation request, in fixed order
pub fn evaluate(required_action: Option<&str>, confirmed_facts: &str) -> Vec<String> {
    let mut flags = Vec::new();
    if is_missing(required_action) {
        flags.push(MISSING_ACTION_FLAG.to_string());
    }
    if too_few_details(confirmed_facts) {
        flags.push(INSUFFICIENT_DETAILS_FLAG.to_string());
    }
    flags
}

/// Review an operator-edited follow-up before it is stored or sent
pub fn review_follow_up(
    sms: &str,
    sms_channel: bool,
    severity: Severity,
    required_action: Option<&str>,
    confirmed_facts: &str,
) -> Vec<String> {
    let mut flags = Vec::new();
    if sms_channel && sms.chars().count() > SMS_MAX_LENGTH {
        flags.push(SMS_TOO_LONG_FLAG.to_string());
    }
    if severity == Severity::High && is_missing(required_action) {
        flags.push(HIGH_SEVERITY_MISSING_ACTION_FLAG.to_string());
    }
    if too_few_details(confirmed_facts) {
        flags.push(INSUFFICIENT_DETAILS_FLAG.to_string());
    }
    flags
}

/// Merge declared flags with server flags
///
/// Declared flags keep their order, server flags follow. Duplicates are
/// dropped everywhere; the first occurrence wins.
pub fn merge_flags<I>(declared: I, server: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut merged: Vec<String> = Vec::new();
    for flag in declared.into_iter().chain(server.iter().cloned()) {
        if !merged.contains(&flag) {
            merged.push(flag);
        }
    }
    merged
}
