//! Append-only audit trail entries.
//!
//! The workflows never write audit entries on their own: every entry travels with the record
//! mutation it describes and the store commits both in one step.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::identity::UserId;

/// Who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuditActor {
    User(UserId),
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "verification.submitted")]
    VerificationSubmitted,
    #[serde(rename = "verification.status_changed")]
    VerificationStatusChanged,
    #[serde(rename = "verification.cancelled")]
    VerificationCancelled,
    #[serde(rename = "verification.purged")]
    VerificationPurged,
    #[serde(rename = "document.uploaded")]
    DocumentUploaded,
    #[serde(rename = "document.scanned")]
    DocumentScanned,
    #[serde(rename = "document.purged")]
    DocumentPurged,
}

impl AuditAction {
    pub const fn tag(self) -> &'static str {
        match self {
            AuditAction::VerificationSubmitted => "verification.submitted",
            AuditAction::VerificationStatusChanged => "verification.status_changed",
            AuditAction::VerificationCancelled => "verification.cancelled",
            AuditAction::VerificationPurged => "verification.purged",
            AuditAction::DocumentUploaded => "document.uploaded",
            AuditAction::DocumentScanned => "document.scanned",
            AuditAction::DocumentPurged => "document.purged",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: AuditActor,
    pub action: AuditAction,
    pub detail: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: AuditActor,
        action: AuditAction,
        detail: Value,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            action,
            detail,
            recorded_at,
        }
    }
}
