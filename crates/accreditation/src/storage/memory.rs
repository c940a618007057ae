use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::audit::AuditEntry;
use crate::identity::UserId;
use crate::workflows::vault::{
    DocumentId, DocumentRepository, ScanRecord, ScanUpdate, StoredDocument,
};
use crate::workflows::verification::{
    VerificationId, VerificationRecord, VerificationRepository, VerificationStatus,
};

use super::RepositoryError;

#[derive(Default)]
struct StoreState {
    verifications: Vec<VerificationRecord>,
    documents: Vec<StoredDocument>,
    audit: Vec<AuditEntry>,
}

impl StoreState {
    fn verification_mut(&mut self, id: &VerificationId) -> Option<&mut VerificationRecord> {
        self.verifications.iter_mut().find(|record| &record.id == id)
    }

    fn document_mut(&mut self, id: &DocumentId) -> Option<&mut StoredDocument> {
        self.documents.iter_mut().find(|document| &document.id == id)
    }
}

/// In-process store implementing both repositories behind a single lock, so each call is one
/// transaction spanning the record mutation and its audit entry.
///
/// The handle has an explicit lifecycle: it is usable from [`MemoryStore::open`] until
/// [`MemoryStore::close`], after which every call fails with `Unavailable`.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    open: AtomicBool,
}

impl MemoryStore {
    pub fn open() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            open: AtomicBool::new(true),
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Snapshot of the audit trail in append order.
    pub fn audit_log(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self.lock()?.audit.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        if !self.is_open() {
            return Err(RepositoryError::Unavailable("store is closed".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl VerificationRepository for MemoryStore {
    fn insert(
        &self,
        record: VerificationRecord,
        audit: AuditEntry,
    ) -> Result<VerificationRecord, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.verifications.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict(
                "verification id already exists".to_string(),
            ));
        }
        let owned = guard
            .verifications
            .iter()
            .filter(|existing| existing.owner == record.owner);
        for existing in owned {
            if existing.status.is_open() {
                return Err(RepositoryError::Conflict(
                    "an open verification request already exists for this user".to_string(),
                ));
            }
            if existing.is_active(record.submitted_at) {
                return Err(RepositoryError::Conflict(
                    "an active accreditation already exists for this user".to_string(),
                ));
            }
        }

        guard.verifications.push(record.clone());
        guard.audit.push(audit);
        Ok(record)
    }

    fn update(
        &self,
        mut record: VerificationRecord,
        expected: VerificationStatus,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let current = guard
            .verification_mut(&record.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "verification moved to {} concurrently",
                current.status
            )));
        }

        record.documents = std::mem::take(&mut current.documents);
        *current = record;
        guard.audit.push(audit);
        Ok(())
    }

    fn fetch(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .verifications
            .iter()
            .find(|record| &record.id == id)
            .cloned())
    }

    fn for_owner(&self, owner: &UserId) -> Result<Vec<VerificationRecord>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .verifications
            .iter()
            .filter(|record| &record.owner == owner)
            .cloned()
            .collect())
    }

    fn purge(
        &self,
        id: &VerificationId,
        deleted_at: DateTime<Utc>,
        document_audit: &dyn Fn(&DocumentId) -> AuditEntry,
        audit: &dyn Fn(usize) -> AuditEntry,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.lock()?;
        let position = guard
            .verifications
            .iter()
            .position(|record| &record.id == id)
            .ok_or(RepositoryError::NotFound)?;

        let state = &mut *guard;
        let mut entries = Vec::new();
        for document in state
            .documents
            .iter_mut()
            .filter(|document| &document.verification_id == id && !document.is_purged())
        {
            document.ciphertext = None;
            document.deleted_at = Some(deleted_at);
            entries.push(document_audit(&document.id));
        }
        let purged = entries.len();
        entries.push(audit(purged));

        state.verifications.remove(position);
        state.audit.extend(entries);
        Ok(purged)
    }
}

impl DocumentRepository for MemoryStore {
    fn verification_status(
        &self,
        id: &VerificationId,
    ) -> Result<Option<VerificationStatus>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .verifications
            .iter()
            .find(|record| &record.id == id)
            .map(|record| record.status))
    }

    fn insert_document(
        &self,
        document: StoredDocument,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let parent = guard
            .verification_mut(&document.verification_id)
            .ok_or(RepositoryError::NotFound)?;
        if parent.status != VerificationStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "verification is {} and no longer accepts documents",
                parent.status
            )));
        }

        parent.documents.push(document.id);
        guard.documents.push(document);
        guard.audit.push(audit);
        Ok(())
    }

    fn fetch_document(&self, id: &DocumentId) -> Result<Option<StoredDocument>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .documents
            .iter()
            .find(|document| &document.id == id)
            .cloned())
    }

    fn documents_for(
        &self,
        verification_id: &VerificationId,
    ) -> Result<Vec<StoredDocument>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .documents
            .iter()
            .filter(|document| &document.verification_id == verification_id)
            .cloned()
            .collect())
    }

    fn pending_scans(&self, limit: usize) -> Result<Vec<StoredDocument>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .documents
            .iter()
            .filter(|document| !document.scan_status.is_final() && !document.is_purged())
            .take(limit)
            .cloned()
            .collect())
    }

    fn record_scan(
        &self,
        id: &DocumentId,
        scan: ScanRecord,
        audit: AuditEntry,
    ) -> Result<ScanUpdate, RepositoryError> {
        let mut guard = self.lock()?;
        let document = guard
            .document_mut(id)
            .filter(|document| !document.is_purged())
            .ok_or(RepositoryError::NotFound)?;
        if document.scan_status.is_final() {
            return Ok(ScanUpdate::Unchanged {
                current: document.scan_status,
            });
        }

        document.scan_status = scan.status;
        document.scan_date = Some(scan.scanned_at);
        document.scan_result = Some(scan.detail);
        guard.audit.push(audit);
        Ok(ScanUpdate::Applied)
    }

    fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<DocumentId>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .documents
            .iter()
            .filter(|document| !document.is_purged() && document.scheduled_deletion <= now)
            .map(|document| document.id)
            .collect())
    }

    fn soft_delete(
        &self,
        id: &DocumentId,
        deleted_at: DateTime<Utc>,
        audit: AuditEntry,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.lock()?;
        let document = guard.document_mut(id).ok_or(RepositoryError::NotFound)?;
        if document.is_purged() {
            return Ok(false);
        }

        document.ciphertext = None;
        document.deleted_at = Some(deleted_at);
        guard.audit.push(audit);
        Ok(true)
    }
}
