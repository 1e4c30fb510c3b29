//! Audit event schema.
//!
//! Events carry summary counts only — never raw content, never matched
//! values. Once appended they are immutable; purging a stored record leaves
//! its audit trail intact.

use crate::finding::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Store,
    Read,
    Blocked,
    Purge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Blocked,
    Denied,
    Error,
}

/// One line of the ledger. `prev_digest` is the SHA-256 of the previous
/// serialized event line, set by the log at append time; the first event
/// chains from the all-zero digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// UTC, monotonic-ordered within the ledger (clock regressions clamp).
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    /// Absent for blocked stores, where classification was never computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_classification: Option<Classification>,
    pub outcome: AuditOutcome,
    pub pii_count: usize,
    pub secret_count: usize,
    /// The StoredRecord this event concerns, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    /// Tamper-evidence chain link; filled in by the log on append.
    #[serde(default)]
    pub prev_digest: String,
}

impl AuditEvent {
    /// Creates an event with a fresh id and the current UTC timestamp.
    pub fn now(actor: impl Into<String>, action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
            target_classification: None,
            outcome,
            pii_count: 0,
            secret_count: 0,
            record_id: None,
            prev_digest: String::new(),
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.target_classification = Some(classification);
        self
    }

    pub fn with_counts(mut self, pii_count: usize, secret_count: usize) -> Self {
        self.pii_count = pii_count;
        self.secret_count = secret_count;
        self
    }

    pub fn with_record(mut self, record_id: Uuid) -> Self {
        self.record_id = Some(record_id);
        self
    }
}

/// Query filter for [`crate::audit::AuditLog::query`]. All fields are
/// conjunctive; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<AuditAction>,
    pub outcome: Option<AuditOutcome>,
    pub record_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref actor) = self.actor {
            if &event.actor != actor {
                return false;
            }
        }
        if let Some(action) = self.action {
            if event.action != action {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if event.outcome != outcome {
                return false;
            }
        }
        if let Some(record_id) = self.record_id {
            if event.record_id != Some(record_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let id = Uuid::new_v4();
        let event = AuditEvent::now("alice", AuditAction::Store, AuditOutcome::Success)
            .with_classification(Classification::Sensitive)
            .with_counts(2, 0)
            .with_record(id);
        assert_eq!(event.actor, "alice");
        assert_eq!(event.pii_count, 2);
        assert_eq!(event.record_id, Some(id));
        assert_eq!(event.target_classification, Some(Classification::Sensitive));
    }

    #[test]
    fn query_filters_conjunctively() {
        let event = AuditEvent::now("alice", AuditAction::Read, AuditOutcome::Denied);
        let q = AuditQuery {
            actor: Some("alice".to_string()),
            outcome: Some(AuditOutcome::Denied),
            ..Default::default()
        };
        assert!(q.matches(&event));
        let q = AuditQuery {
            actor: Some("bob".to_string()),
            ..Default::default()
        };
        assert!(!q.matches(&event));
    }

    #[test]
    fn serialized_event_is_single_json_line() {
        let event = AuditEvent::now("alice", AuditAction::Blocked, AuditOutcome::Blocked);
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains('\n'));
        let back: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back.event_id, event.event_id);
    }
}
