use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditActor, AuditEntry};
use crate::clock::Clock;
use crate::identity::{IdentityDirectory, UserId};
use crate::notify::{Notification, NotificationSink, NotificationTemplate};
use crate::storage::{read_with_retry, RepositoryError};
use crate::workflows::vault::DocumentId;
use crate::workflows::ErrorKind;

use super::domain::{
    AccreditationStatus, StatusUpdate, VerificationId, VerificationRecord, VerificationStatus,
    VerificationSubmission, VerificationView, APPROVAL_VALIDITY_DAYS,
};
use super::eligibility::{EligibilityError, EligibilityPolicy, SubmissionDefect, ValidationError};
use super::repository::VerificationRepository;

const CANCELLATION_REASON: &str = "withdrawn by applicant";

/// Service owning submission, review, cancellation, and status queries for verification
/// requests.
pub struct VerificationService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    directory: Arc<dyn IdentityDirectory>,
    clock: Arc<dyn Clock>,
    policy: EligibilityPolicy,
}

impl<R, N> VerificationService<R, N>
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        directory: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_policy(
            repository,
            notifier,
            directory,
            clock,
            EligibilityPolicy::default(),
        )
    }

    pub fn with_policy(
        repository: Arc<R>,
        notifier: Arc<N>,
        directory: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
        policy: EligibilityPolicy,
    ) -> Self {
        Self {
            repository,
            notifier,
            directory,
            clock,
            policy,
        }
    }

    /// Validate and persist a new pending request for `owner`. Owners holding an open request
    /// or an unexpired approval are refused until it closes or lapses.
    pub fn create(
        &self,
        owner: &UserId,
        submission: VerificationSubmission,
    ) -> Result<VerificationView, VerificationError> {
        self.policy.check(&submission)?;

        let now = self.clock.now();
        let record = VerificationRecord::from_submission(owner.clone(), submission, now);
        let audit = AuditEntry::new(
            AuditActor::User(owner.clone()),
            AuditAction::VerificationSubmitted,
            json!({
                "verification_id": record.id,
                "type": record.kind,
            }),
            now,
        );

        let stored = self.repository.insert(record, audit)?;
        info!(
            verification_id = %stored.id,
            owner = %stored.owner,
            kind = stored.kind.label(),
            "verification submitted"
        );
        Ok(stored.view(now))
    }

    /// Apply a reviewer decision. The owner is notified on a best-effort basis; delivery
    /// failures never undo the status change.
    pub fn update_status(
        &self,
        id: &VerificationId,
        update: StatusUpdate,
        reviewer: &UserId,
    ) -> Result<VerificationView, VerificationError> {
        let mut record = self.repository.fetch(id)?.ok_or(VerificationError::NotFound)?;

        if !update.status.is_review_outcome() {
            return Err(ValidationError::UnsupportedReviewStatus(update.status).into());
        }
        let rejection_reason = non_blank(update.rejection_reason);
        if update.status == VerificationStatus::Rejected && rejection_reason.is_none() {
            return Err(ValidationError::RejectionReasonRequired.into());
        }

        let now = self.clock.now();
        let previous = record.status;
        let current = record.effective_status(now);
        if !current.can_transition_to(update.status) {
            return Err(VerificationError::Conflict(format!(
                "cannot move a {current} verification to {}",
                update.status
            )));
        }

        record.status = update.status;
        record.reviewed_at = Some(now);
        record.reviewed_by = Some(reviewer.clone());
        record.reviewer_notes = non_blank(update.reviewer_notes);
        record.rejection_reason = match update.status {
            VerificationStatus::Rejected => rejection_reason,
            _ => None,
        };
        record.expires_at = match update.status {
            VerificationStatus::Approved => Some(now + Duration::days(APPROVAL_VALIDITY_DAYS)),
            _ => None,
        };

        let audit = AuditEntry::new(
            AuditActor::User(reviewer.clone()),
            AuditAction::VerificationStatusChanged,
            json!({
                "verification_id": record.id,
                "from": previous,
                "to": record.status,
                "reviewer": reviewer,
            }),
            now,
        );
        self.repository.update(record.clone(), previous, audit)?;
        info!(
            verification_id = %record.id,
            from = previous.label(),
            to = record.status.label(),
            reviewer = %reviewer,
            "verification status changed"
        );

        self.notify_owner(&record);
        Ok(record.view(now))
    }

    /// Withdraw a pending request on behalf of its owner. Requests owned by someone else are
    /// reported as missing.
    pub fn cancel(
        &self,
        id: &VerificationId,
        caller: &UserId,
    ) -> Result<VerificationView, VerificationError> {
        let mut record = self
            .repository
            .fetch(id)?
            .filter(|record| &record.owner == caller)
            .ok_or(VerificationError::NotFound)?;

        if record.status != VerificationStatus::Pending {
            return Err(VerificationError::Conflict(
                "only pending requests may be cancelled".to_string(),
            ));
        }

        let now = self.clock.now();
        record.status = VerificationStatus::Cancelled;
        record.cancelled_at = Some(now);

        let audit = AuditEntry::new(
            AuditActor::User(caller.clone()),
            AuditAction::VerificationCancelled,
            json!({
                "verification_id": record.id,
                "reason": CANCELLATION_REASON,
            }),
            now,
        );
        self.repository
            .update(record.clone(), VerificationStatus::Pending, audit)?;
        info!(verification_id = %record.id, "verification cancelled by owner");
        Ok(record.view(now))
    }

    /// Accreditation summary for `user`, newest request first.
    pub fn status(&self, user: &UserId) -> Result<AccreditationStatus, VerificationError> {
        let mut records = read_with_retry("verification.status", || {
            self.repository.for_owner(user)
        })?;
        let now = self.clock.now();

        // Reversed first so requests sharing a timestamp keep newest-first order.
        records.reverse();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        let is_accredited = records.iter().any(|record| record.is_active(now));
        let history: Vec<VerificationView> =
            records.iter().map(|record| record.view(now)).collect();

        Ok(AccreditationStatus {
            is_accredited,
            current: history.first().cloned(),
            history,
        })
    }

    pub fn get(&self, id: &VerificationId) -> Result<VerificationView, VerificationError> {
        let record = read_with_retry("verification.get", || self.repository.fetch(id))?
            .ok_or(VerificationError::NotFound)?;
        Ok(record.view(self.clock.now()))
    }

    /// Administrative purge: soft-deletes the request's documents and removes the request in
    /// one store transaction.
    pub fn purge(&self, id: &VerificationId, admin: &UserId) -> Result<usize, VerificationError> {
        let now = self.clock.now();
        let actor = AuditActor::User(admin.clone());

        let document_audit = |document_id: &DocumentId| {
            AuditEntry::new(
                actor.clone(),
                AuditAction::DocumentPurged,
                json!({ "document_id": document_id, "reason": "verification purged" }),
                now,
            )
        };
        let audit = |documents_purged: usize| {
            AuditEntry::new(
                actor.clone(),
                AuditAction::VerificationPurged,
                json!({
                    "verification_id": id,
                    "documents_purged": documents_purged,
                }),
                now,
            )
        };

        let purged_documents = self.repository.purge(id, now, &document_audit, &audit)?;
        info!(verification_id = %id, purged_documents, "verification purged");
        Ok(purged_documents)
    }

    fn notify_owner(&self, record: &VerificationRecord) {
        let template = match record.status {
            VerificationStatus::InReview => NotificationTemplate::VerificationInReview,
            VerificationStatus::Approved => NotificationTemplate::VerificationApproved,
            VerificationStatus::Rejected => NotificationTemplate::VerificationRejected,
            _ => return,
        };

        let owner = match self.directory.lookup(&record.owner) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                warn!(owner = %record.owner, "no directory entry for verification owner");
                return;
            }
            Err(err) => {
                warn!(owner = %record.owner, error = %err, "directory lookup failed");
                return;
            }
        };

        let mut params = BTreeMap::new();
        params.insert("status".to_string(), record.status.label().to_string());
        if let Some(reason) = &record.rejection_reason {
            params.insert("rejection_reason".to_string(), reason.clone());
        }
        if let Some(expires_at) = record.expires_at {
            params.insert("expires_at".to_string(), expires_at.to_rfc3339());
        }

        if let Err(err) = self.notifier.notify(Notification {
            email: owner.email,
            template,
            params,
        }) {
            warn!(
                verification_id = %record.id,
                error = %err,
                "status notification not delivered"
            );
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Error raised by the verification service.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    #[error("{0}")]
    Conflict(String),
    #[error("verification request not found")]
    NotFound,
    #[error(transparent)]
    Storage(RepositoryError),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::Validation(_) => ErrorKind::Validation,
            VerificationError::Eligibility(_) => ErrorKind::Eligibility,
            VerificationError::Conflict(_) => ErrorKind::Conflict,
            VerificationError::NotFound => ErrorKind::NotFound,
            VerificationError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<RepositoryError> for VerificationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(reason) => Self::Conflict(reason),
            RepositoryError::NotFound => Self::NotFound,
            unavailable @ RepositoryError::Unavailable(_) => Self::Storage(unavailable),
        }
    }
}

impl From<SubmissionDefect> for VerificationError {
    fn from(value: SubmissionDefect) -> Self {
        match value {
            SubmissionDefect::Invalid(err) => Self::Validation(err),
            SubmissionDefect::Ineligible(err) => Self::Eligibility(err),
        }
    }
}
