use chrono::{DateTime, Utc};

use crate::audit::AuditEntry;
use crate::identity::UserId;
use crate::storage::RepositoryError;
use crate::workflows::vault::DocumentId;

use super::domain::{VerificationId, VerificationRecord, VerificationStatus};

/// Storage abstraction for verification requests. Every mutation carries the audit entry that
/// describes it; implementations must commit both or neither.
pub trait VerificationRepository: Send + Sync {
    /// Insert a new request. Fails with `Conflict` when the owner already holds an open
    /// (pending or in-review) request or an approval still active at the record's submission
    /// time; the check and the write happen atomically.
    fn insert(
        &self,
        record: VerificationRecord,
        audit: AuditEntry,
    ) -> Result<VerificationRecord, RepositoryError>;

    /// Replace the status fields of a request, provided its stored status still equals
    /// `expected`. The document list is owned by the vault and is left untouched.
    fn update(
        &self,
        record: VerificationRecord,
        expected: VerificationStatus,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError>;

    fn fetch(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, RepositoryError>;

    /// All requests of one owner, in submission order.
    fn for_owner(&self, owner: &UserId) -> Result<Vec<VerificationRecord>, RepositoryError>;

    /// Administrative purge: soft-delete every live document of the request, stamping
    /// `deleted_at`, then physically remove the request. `document_audit` describes each
    /// document purge and `audit` the removal given the purged count. Everything commits
    /// together or not at all. Returns the number of documents purged.
    fn purge(
        &self,
        id: &VerificationId,
        deleted_at: DateTime<Utc>,
        document_audit: &dyn Fn(&DocumentId) -> AuditEntry,
        audit: &dyn Fn(usize) -> AuditEntry,
    ) -> Result<usize, RepositoryError>;
}
