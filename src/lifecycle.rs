//! Incident lifecycle tracking
//!
//! An incident moves `initial -> follow_up -> all_clear -> resolved`. The
//! lifecycle stores only timestamps; stage, status badge, and escalation are
//! derived from them at read time.

use crate::incident::{IncidentType, Severity};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Follow-ups due within this window are reported as due soon
pub const DUE_SOON_WINDOW_MINUTES: i64 = 5;

const ALL_CLEAR_EXCERPT_LIMIT: usize = 80;

/// Recommended time between the initial alert and the first follow-up
pub fn follow_up_cadence(severity: Severity) -> TimeDelta {
    match severity {
        Severity::High => TimeDelta::minutes(15),
        Severity::Medium => TimeDelta::minutes(30),
        Severity::Low => TimeDelta::minutes(60),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Incident is already resolved")]
    AlreadyResolved,
    #[error("All-clear message has already been generated")]
    AllClearAlreadyGenerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Initial,
    FollowUp,
    AllClear,
    Resolved,
}

/// Sidebar status of an incident at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusBadge {
    Active,
    #[serde(rename = "Follow-up Due Soon")]
    DueSoon,
    Overdue,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentLifecycle {
    pub initial_sent_at: DateTime<Utc>,
    pub follow_up_due_at: DateTime<Utc>,
    pub follow_up_sent_at: Option<DateTime<Utc>>,
    pub all_clear_generated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl IncidentLifecycle {
    /// Start a lifecycle with the follow-up due one cadence after `initial_sent_at`
    pub fn new(severity: Severity, initial_sent_at: DateTime<Utc>) -> Self {
        Self {
            initial_sent_at,
            follow_up_due_at: initial_sent_at + follow_up_cadence(severity),
            follow_up_sent_at: None,
            all_clear_generated_at: None,
            resolved_at: None,
        }
    }

    pub fn stage(&self) -> LifecycleStage {
        if self.resolved_at.is_some() {
            LifecycleStage::Resolved
        } else if self.all_clear_generated_at.is_some() {
            LifecycleStage::AllClear
        } else if self.follow_up_sent_at.is_some() {
            LifecycleStage::FollowUp
        } else {
            LifecycleStage::Initial
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// True when the first follow-up is past due and has not been sent
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.follow_up_sent_at.is_none() && now > self.follow_up_due_at
    }

    pub fn badge(&self, now: DateTime<Utc>) -> StatusBadge {
        if self.is_resolved() {
            return StatusBadge::Resolved;
        }
        if self.follow_up_sent_at.is_none() {
            let until_due = self.follow_up_due_at - now;
            if until_due < TimeDelta::zero() {
                return StatusBadge::Overdue;
            }
            if until_due <= TimeDelta::minutes(DUE_SOON_WINDOW_MINUTES) {
                return StatusBadge::DueSoon;
            }
        }
        StatusBadge::Active
    }

    /// High-severity incidents with an overdue follow-up need escalation
    pub fn needs_escalation(&self, severity: Severity, now: DateTime<Utc>) -> bool {
        severity == Severity::High && !self.is_resolved() && self.is_overdue(now)
    }

    /// Record that a follow-up went out; the first timestamp is kept
    pub fn mark_follow_up_sent(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_open()?;
        self.follow_up_sent_at.get_or_insert(now);
        Ok(())
    }

    pub fn generate_all_clear(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_open()?;
        if self.all_clear_generated_at.is_some() {
            return Err(LifecycleError::AllClearAlreadyGenerated);
        }
        self.all_clear_generated_at = Some(now);
        Ok(())
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_open()?;
        self.resolved_at = Some(now);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), LifecycleError> {
        if self.is_resolved() {
            return Err(LifecycleError::AlreadyResolved);
        }
        Ok(())
    }
}

/// All-clear SMS text built from the initial alert
pub fn all_clear_message(initial_sms: &str, sender: &str) -> String {
    let excerpt: String = initial_sms.chars().take(ALL_CLEAR_EXCERPT_LIMIT).collect();
    format!(
        "All clear: The situation has been resolved. {}... - {}",
        excerpt, sender
    )
}

pub fn all_clear_subject(incident_type: IncidentType, location: &str) -> String {
    format!("All Clear: {} at {}", incident_type, location)
}
