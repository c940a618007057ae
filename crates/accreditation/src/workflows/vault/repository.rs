use chrono::{DateTime, Utc};

use crate::audit::AuditEntry;
use crate::storage::RepositoryError;
use crate::workflows::verification::{VerificationId, VerificationStatus};

use super::domain::{DocumentId, ScanRecord, ScanUpdate, StoredDocument};

/// Storage abstraction for vault documents. Mutations are narrow on purpose: a scan result or
/// a purge only ever touches the fields it owns, so concurrent sweeps and uploads cannot
/// overwrite each other.
pub trait DocumentRepository: Send + Sync {
    /// Stored status of the parent request, if it exists.
    fn verification_status(
        &self,
        id: &VerificationId,
    ) -> Result<Option<VerificationStatus>, RepositoryError>;

    /// Insert a document and attach it to its request. Fails with `NotFound` when the request
    /// is gone and `Conflict` when it is no longer pending; the check and the write are atomic
    /// with the audit append.
    fn insert_document(
        &self,
        document: StoredDocument,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError>;

    fn fetch_document(&self, id: &DocumentId) -> Result<Option<StoredDocument>, RepositoryError>;

    /// Documents of one request in upload order, purged ones included.
    fn documents_for(
        &self,
        verification_id: &VerificationId,
    ) -> Result<Vec<StoredDocument>, RepositoryError>;

    /// Live documents still waiting on a scan verdict, oldest first.
    fn pending_scans(&self, limit: usize) -> Result<Vec<StoredDocument>, RepositoryError>;

    /// Apply a scan verdict unless the document already has a final one. `NotFound` for unknown
    /// or purged documents. The audit entry is only appended when the verdict is applied.
    fn record_scan(
        &self,
        id: &DocumentId,
        scan: ScanRecord,
        audit: AuditEntry,
    ) -> Result<ScanUpdate, RepositoryError>;

    /// Ids of live documents whose retention window closed at or before `now`.
    fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<DocumentId>, RepositoryError>;

    /// Drop the payload and stamp `deleted_at`. Returns `false` when the document was already
    /// purged, in which case nothing is written.
    fn soft_delete(
        &self,
        id: &DocumentId,
        deleted_at: DateTime<Utc>,
        audit: AuditEntry,
    ) -> Result<bool, RepositoryError>;
}
