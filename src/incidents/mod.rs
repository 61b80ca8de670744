//! In-memory incident log
//!
//! Keeps every incident the operator has issued, newest first, together with
//! its lifecycle and follow-up drafts. The generation pipeline never touches
//! this store.

use crate::error::{AppError, AppResult};
use crate::generation::compliance::{merge_flags, review_follow_up};
use crate::generation::{EmailContent, GenerateResponse};
use crate::incident::{GenerateRequest, IncidentContext, Tone};
use crate::lifecycle::{
    IncidentLifecycle, LifecycleStage, StatusBadge, all_clear_message, all_clear_subject,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpMessage {
    pub sms: String,
    pub email: EmailContent,
}

/// Channels a follow-up goes out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channels {
    pub sms: bool,
    pub email: bool,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            sms: true,
            email: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: FollowUpStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub content: FollowUpMessage,
    pub channels: Channels,
    pub tone: Option<Tone>,
    #[serde(rename = "compliance_flags")]
    pub compliance_flags: Vec<String>,
}

/// Body of `POST /api/incidents/{id}/follow-ups`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFollowUp {
    pub status: FollowUpStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub content: FollowUpMessage,
    #[serde(default)]
    pub channels: Channels,
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default, rename = "compliance_flags")]
    pub compliance_flags: Vec<String>,
}

/// Body of `POST /api/incidents`: the original request plus what was generated
#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    #[serde(flatten)]
    pub request: GenerateRequest,
    pub outputs: GenerateResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub incident: IncidentContext,
    pub outputs: GenerateResponse,
    pub lifecycle: IncidentLifecycle,
    pub follow_ups: Vec<FollowUp>,
}

impl IncidentRecord {
    /// Record with state derived at `now`
    pub fn view(&self, now: DateTime<Utc>) -> IncidentView {
        IncidentView {
            stage: self.lifecycle.stage(),
            status: self.lifecycle.badge(now),
            needs_escalation: self
                .lifecycle
                .needs_escalation(self.incident.severity, now),
            record: self.clone(),
        }
    }
}

/// Incident record as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentView {
    #[serde(flatten)]
    pub record: IncidentRecord,
    pub stage: LifecycleStage,
    pub status: StatusBadge,
    pub needs_escalation: bool,
}

/// All-clear notice returned when the all-clear is generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllClearNotice {
    pub sms: String,
    pub email: EmailContent,
}

/// Lifecycle transitions an operator can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    FollowUpSent,
    AllClear,
    Resolve,
}

/// Newest-first store of incidents
#[derive(Debug, Default)]
pub struct IncidentLog {
    records: RwLock<Vec<IncidentRecord>>,
}

impl IncidentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new incident and start its lifecycle at `now`
    pub async fn create(
        &self,
        incident: IncidentContext,
        outputs: GenerateResponse,
        now: DateTime<Utc>,
    ) -> IncidentRecord {
        let record = IncidentRecord {
            id: Uuid::new_v4(),
            created_at: now,
            lifecycle: IncidentLifecycle::new(incident.severity, now),
            incident,
            outputs,
            follow_ups: Vec::new(),
        };

        self.records.write().await.insert(0, record.clone());
        tracing::info!(incident_id = %record.id, "Incident recorded");
        record
    }

    pub async fn list(&self) -> Vec<IncidentRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<IncidentRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Apply a lifecycle transition
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` for an unknown id; `AppError::Lifecycle` when the
    /// transition is not allowed in the current state.
    pub async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<IncidentRecord> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| not_found(id))?;

        match transition {
            Transition::FollowUpSent => record.lifecycle.mark_follow_up_sent(now)?,
            Transition::AllClear => record.lifecycle.generate_all_clear(now)?,
            Transition::Resolve => record.lifecycle.resolve(now)?,
        }

        tracing::info!(
            incident_id = %id,
            stage = ?record.lifecycle.stage(),
            "Incident lifecycle updated"
        );
        Ok(record.clone())
    }

    /// Mark the all-clear as generated and build its text
    pub async fn generate_all_clear(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<(IncidentRecord, AllClearNotice)> {
        let record = self.transition(id, Transition::AllClear, now).await?;
        let sms = all_clear_message(&record.outputs.sms, &record.incident.sender);
        let notice = AllClearNotice {
            email: EmailContent {
                subject: all_clear_subject(record.incident.incident_type, &record.incident.location),
                body: sms.clone(),
            },
            sms,
        };
        Ok((record, notice))
    }

    /// Review and store a follow-up draft
    ///
    /// Review flags are merged into the supplied flags. A follow-up stored as
    /// `sent` also marks the lifecycle follow-up as sent.
    pub async fn add_follow_up(
        &self,
        id: Uuid,
        new: NewFollowUp,
        now: DateTime<Utc>,
    ) -> AppResult<FollowUp> {
        if new.status == FollowUpStatus::Scheduled && new.scheduled_at.is_none() {
            return Err(AppError::Validation(
                "scheduledAt is required for scheduled follow-ups".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| not_found(id))?;

        if new.status == FollowUpStatus::Sent {
            record.lifecycle.mark_follow_up_sent(now)?;
        } else if record.lifecycle.is_resolved() {
            return Err(crate::lifecycle::LifecycleError::AlreadyResolved.into());
        }

        let review = review_follow_up(
            &new.content.sms,
            new.channels.sms,
            record.incident.severity,
            record.incident.required_action(),
            &record.incident.confirmed_facts,
        );

        let follow_up = FollowUp {
            id: Uuid::new_v4(),
            created_at: now,
            status: new.status,
            scheduled_at: new.scheduled_at,
            sent_at: (new.status == FollowUpStatus::Sent).then_some(now),
            content: new.content,
            channels: new.channels,
            tone: new.tone,
            compliance_flags: merge_flags(new.compliance_flags, &review),
        };

        record.follow_ups.insert(0, follow_up.clone());
        tracing::info!(
            incident_id = %id,
            follow_up_id = %follow_up.id,
            status = ?follow_up.status,
            flags = follow_up.compliance_flags.len(),
            "Follow-up stored"
        );
        Ok(follow_up)
    }
}

/// Validate an inbound incident body
pub fn validate_new_incident(new: NewIncident) -> AppResult<(IncidentContext, GenerateResponse)> {
    let incident = new.request.validate()?;
    Ok((incident, new.outputs))
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Incident {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ResponseMetadata;
    use crate::generation::compliance::{
        HIGH_SEVERITY_MISSING_ACTION_FLAG, INSUFFICIENT_DETAILS_FLAG, SMS_TOO_LONG_FLAG,
    };
    use crate::generation::mock::MockGenerator;
    use crate::incident::{IncidentType, Severity};
    use crate::lifecycle::LifecycleError;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 9, 14, 0, 0).unwrap()
    }

    fn incident(severity: Severity) -> (IncidentContext, GenerateResponse) {
        let ctx = IncidentContext::new(IncidentType::Fire, "123 Main St", "Fire")
            .with_severity(severity);
        let metadata = ResponseMetadata::new(t0(), ctx.sender.clone(), ctx.tone);
        let outputs = MockGenerator::default().generate(&ctx, &metadata);
        (ctx, outputs)
    }

    fn follow_up(status: FollowUpStatus, sms: &str) -> NewFollowUp {
        NewFollowUp {
            status,
            scheduled_at: None,
            content: FollowUpMessage {
                sms: sms.to_string(),
                email: EmailContent {
                    subject: "Update".to_string(),
                    body: "Body".to_string(),
                },
            },
            channels: Channels::default(),
            tone: None,
            compliance_flags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_lists_newest_first() {
        let log = IncidentLog::new();
        let (ctx, outputs) = incident(Severity::Low);
        let first = log.create(ctx.clone(), outputs.clone(), t0()).await;
        let second = log.create(ctx, outputs, t0() + TimeDelta::minutes(1)).await;

        let ids: Vec<Uuid> = log.list().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let log = IncidentLog::new();
        let err = log.get(Uuid::new_v4()).await.expect_err("should fail");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_transitions_and_conflicts() {
        let log = IncidentLog::new();
        let (ctx, outputs) = incident(Severity::Medium);
        let record = log.create(ctx, outputs, t0()).await;

        let (updated, notice) = log
            .generate_all_clear(record.id, t0() + TimeDelta::minutes(10))
            .await
            .expect("all-clear should succeed");
        assert_eq!(updated.lifecycle.stage(), LifecycleStage::AllClear);
        assert!(notice.sms.starts_with("All clear: The situation has been resolved. ALERT: Fire"));
        assert_eq!(notice.email.subject, "All Clear: Fire at 123 Main St");

        let err = log
            .generate_all_clear(record.id, t0())
            .await
            .expect_err("second all-clear should conflict");
        assert!(matches!(
            err,
            AppError::Lifecycle(LifecycleError::AllClearAlreadyGenerated)
        ));

        log.transition(record.id, Transition::Resolve, t0()).await.unwrap();
        let err = log
            .transition(record.id, Transition::FollowUpSent, t0())
            .await
            .expect_err("resolved incident should conflict");
        assert!(matches!(err, AppError::Lifecycle(LifecycleError::AlreadyResolved)));
    }

    #[tokio::test]
    async fn test_follow_up_review_flags_are_merged() {
        let log = IncidentLog::new();
        let (ctx, outputs) = incident(Severity::High);
        let record = log.create(ctx, outputs, t0()).await;

        let mut new = follow_up(FollowUpStatus::Draft, &"x".repeat(170));
        new.compliance_flags = vec![INSUFFICIENT_DETAILS_FLAG.to_string()];
        let stored = log.add_follow_up(record.id, new, t0()).await.unwrap();

        assert_eq!(
            stored.compliance_flags,
            vec![
                INSUFFICIENT_DETAILS_FLAG,
                SMS_TOO_LONG_FLAG,
                HIGH_SEVERITY_MISSING_ACTION_FLAG
            ]
        );
        assert_eq!(stored.sent_at, None);
    }

    #[tokio::test]
    async fn test_scheduled_follow_up_requires_time() {
        let log = IncidentLog::new();
        let (ctx, outputs) = incident(Severity::Low);
        let record = log.create(ctx, outputs, t0()).await;

        let err = log
            .add_follow_up(record.id, follow_up(FollowUpStatus::Scheduled, "Update"), t0())
            .await
            .expect_err("should fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sent_follow_up_updates_lifecycle() {
        let log = IncidentLog::new();
        let (ctx, outputs) = incident(Severity::Low);
        let record = log.create(ctx, outputs, t0()).await;
        let sent_time = t0() + TimeDelta::minutes(20);

        let stored = log
            .add_follow_up(record.id, follow_up(FollowUpStatus::Sent, "Update"), sent_time)
            .await
            .unwrap();
        assert_eq!(stored.sent_at, Some(sent_time));

        let record = log.get(record.id).await.unwrap();
        assert_eq!(record.lifecycle.follow_up_sent_at, Some(sent_time));
        assert_eq!(record.follow_ups.len(), 1);
    }

    #[tokio::test]
    async fn test_view_derives_status() {
        let log = IncidentLog::new();
        let (ctx, outputs) = incident(Severity::High);
        let record = log.create(ctx, outputs, t0()).await;

        let view = record.view(t0() + TimeDelta::minutes(20));
        assert_eq!(view.status, StatusBadge::Overdue);
        assert!(view.needs_escalation);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "Overdue");
        assert_eq!(json["incidentType"], "Fire");
        assert!(json["lifecycle"]["followUpDueAt"].is_string());
    }
}
