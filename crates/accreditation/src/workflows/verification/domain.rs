use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;
use crate::workflows::vault::DocumentId;

/// Approved verifications stay valid for one year after review.
pub const APPROVAL_VALIDITY_DAYS: i64 = 365;

/// Identifier wrapper for verification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerificationId(pub Uuid);

impl VerificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VerificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VerificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Basis on which the investor claims accreditation. Fixed once submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationType {
    Income,
    NetWorth,
    Professional,
}

impl VerificationType {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationType::Income => "income",
            VerificationType::NetWorth => "net_worth",
            VerificationType::Professional => "professional",
        }
    }
}

/// Self-reported financial figures in whole US dollars. Only the fields relevant to the
/// verification type are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialAttestation {
    #[serde(default)]
    pub annual_income: Option<u64>,
    #[serde(default)]
    pub income_source: Option<String>,
    #[serde(default)]
    pub net_worth: Option<u64>,
    #[serde(default)]
    pub liquid_net_worth: Option<u64>,
}

/// Inbound request from the investor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSubmission {
    #[serde(rename = "type")]
    pub kind: VerificationType,
    #[serde(default)]
    pub financials: FinancialAttestation,
    /// License designation (Series 7, 65, 82) backing a professional claim.
    #[serde(default)]
    pub professional_credential: Option<String>,
    pub attestation: bool,
    pub consent_to_verify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    /// Derived on read for approvals past their expiry; never stored.
    Expired,
    Cancelled,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::InReview => "in_review",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Expired => "expired",
            VerificationStatus::Cancelled => "cancelled",
        }
    }

    /// Open requests block a new submission from the same owner.
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            VerificationStatus::Pending | VerificationStatus::InReview
        )
    }

    /// Statuses a reviewer may set.
    pub const fn is_review_outcome(self) -> bool {
        matches!(
            self,
            VerificationStatus::InReview
                | VerificationStatus::Approved
                | VerificationStatus::Rejected
        )
    }

    pub const fn can_transition_to(self, next: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, next),
            (Pending, InReview | Approved | Rejected | Cancelled) | (InReview, Approved | Rejected)
        )
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub owner: UserId,
    pub kind: VerificationType,
    pub financials: FinancialAttestation,
    pub professional_credential: Option<String>,
    pub attestation: bool,
    pub consent_to_verify: bool,
    pub status: VerificationStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewer_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentId>,
}

impl VerificationRecord {
    pub(crate) fn from_submission(
        owner: UserId,
        submission: VerificationSubmission,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: VerificationId::new(),
            owner,
            kind: submission.kind,
            financials: submission.financials,
            professional_credential: submission.professional_credential,
            attestation: submission.attestation,
            consent_to_verify: submission.consent_to_verify,
            status: VerificationStatus::Pending,
            submitted_at,
            reviewed_at: None,
            reviewed_by: None,
            reviewer_notes: None,
            rejection_reason: None,
            expires_at: None,
            cancelled_at: None,
            documents: Vec::new(),
        }
    }

    /// Stored status with approval expiry applied.
    pub fn effective_status(&self, now: DateTime<Utc>) -> VerificationStatus {
        match (self.status, self.expires_at) {
            (VerificationStatus::Approved, Some(expires_at)) if expires_at <= now => {
                VerificationStatus::Expired
            }
            (status, _) => status,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == VerificationStatus::Approved
    }

    pub fn view(&self, now: DateTime<Utc>) -> VerificationView {
        VerificationView {
            id: self.id,
            owner: self.owner.clone(),
            kind: self.kind,
            status: self.effective_status(now),
            financials: self.financials.clone(),
            professional_credential: self.professional_credential.clone(),
            submitted_at: self.submitted_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by.clone(),
            reviewer_notes: self.reviewer_notes.clone(),
            rejection_reason: self.rejection_reason.clone(),
            expires_at: self.expires_at,
            cancelled_at: self.cancelled_at,
            documents: self.documents.clone(),
        }
    }
}

/// Reviewer decision applied through `update_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: VerificationStatus,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Read model returned to callers; `status` already reflects expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationView {
    pub id: VerificationId,
    pub owner: UserId,
    #[serde(rename = "type")]
    pub kind: VerificationType,
    pub status: VerificationStatus,
    pub financials: FinancialAttestation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional_credential: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub reviewer_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccreditationStatus {
    pub is_accredited: bool,
    pub current: Option<VerificationView>,
    pub history: Vec<VerificationView>,
}
