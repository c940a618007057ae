use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::audit::{AuditAction, AuditActor, AuditEntry};
use crate::clock::ManualClock;
use crate::identity::UserId;
use crate::storage::{MemoryStore, RepositoryError};
use crate::workflows::vault::{
    DocumentId, DocumentKey, DocumentRepository, DocumentType, DocumentVault, MalwareScanner,
    ScanMode, ScanRecord, ScanUpdate, SignatureScanner, StoredDocument, UploadRequest,
};
use crate::workflows::verification::{
    FinancialAttestation, VerificationId, VerificationRecord, VerificationRepository,
    VerificationStatus, VerificationSubmission, VerificationType,
};

pub(super) const EICAR: &[u8] =
    b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn key() -> DocumentKey {
    DocumentKey::from_bytes([7u8; 32])
}

pub(super) fn owner() -> UserId {
    UserId("user-investor".to_string())
}

pub(super) fn submission() -> VerificationSubmission {
    VerificationSubmission {
        kind: VerificationType::NetWorth,
        financials: FinancialAttestation {
            net_worth: Some(1_750_000),
            liquid_net_worth: Some(400_000),
            ..FinancialAttestation::default()
        },
        professional_credential: None,
        attestation: true,
        consent_to_verify: true,
    }
}

/// Insert a pending request straight into the store and return its id.
pub(super) fn pending_request(store: &MemoryStore, owner: &UserId) -> VerificationId {
    let record = VerificationRecord::from_submission(owner.clone(), submission(), start());
    let audit = AuditEntry::new(
        AuditActor::User(owner.clone()),
        AuditAction::VerificationSubmitted,
        json!({ "verification_id": record.id }),
        start(),
    );
    store.insert(record, audit).expect("insert request").id
}

pub(super) fn move_to(store: &MemoryStore, id: &VerificationId, status: VerificationStatus) {
    let mut record = store
        .fetch(id)
        .expect("fetch succeeds")
        .expect("record present");
    let previous = record.status;
    record.status = status;
    let audit = AuditEntry::new(
        AuditActor::System,
        AuditAction::VerificationStatusChanged,
        json!({ "verification_id": id }),
        start(),
    );
    store.update(record, previous, audit).expect("status update");
}

pub(super) fn upload_request(
    verification_id: VerificationId,
    mime_type: &str,
    bytes: Vec<u8>,
) -> UploadRequest {
    let file_name = match mime_type {
        "image/png" => "license.png",
        "image/jpeg" => "license.jpg",
        _ => "statement.pdf",
    };
    UploadRequest {
        verification_id,
        uploaded_by: owner(),
        document_type: DocumentType::BankStatement,
        file_name: file_name.to_string(),
        mime_type: mime_type.to_string(),
        declared_size: bytes.len() as u64,
        bytes,
    }
}

pub(super) fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF".to_vec()
}

pub(super) struct Harness<R = MemoryStore, M = SignatureScanner> {
    pub(super) vault: DocumentVault<R, M>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) verification_id: VerificationId,
}

pub(super) fn harness(scan_mode: ScanMode) -> Harness {
    harness_with_scanner(Arc::new(SignatureScanner), scan_mode)
}

pub(super) fn harness_with_scanner<M>(scanner: Arc<M>, scan_mode: ScanMode) -> Harness<MemoryStore, M>
where
    M: MalwareScanner + 'static,
{
    let store = Arc::new(MemoryStore::open());
    let clock = Arc::new(ManualClock::new(start()));
    let verification_id = pending_request(&store, &owner());
    let vault = DocumentVault::new(store.clone(), scanner, &key(), clock.clone(), scan_mode);
    Harness {
        vault,
        store,
        clock,
        verification_id,
    }
}

/// How [`TamperingRepository`] misbehaves.
#[derive(Debug, Clone, Copy)]
pub(super) enum Tamper {
    FlipCiphertextByte,
    ForgeChecksum,
    /// Reads are untouched; purging this one document fails as if the backend dropped out.
    FailDelete(DocumentId),
}

/// Repository that corrupts documents on the way out of storage, simulating storage-level
/// tampering and faults.
pub(super) struct TamperingRepository {
    pub(super) inner: Arc<MemoryStore>,
    pub(super) tamper: Tamper,
}

impl TamperingRepository {
    fn corrupt(&self, mut document: StoredDocument) -> StoredDocument {
        match self.tamper {
            Tamper::FlipCiphertextByte => {
                if let Some(byte) = document
                    .ciphertext
                    .as_mut()
                    .and_then(|bytes| bytes.first_mut())
                {
                    *byte ^= 0x01;
                }
            }
            Tamper::ForgeChecksum => {
                document.checksum = "0".repeat(64);
            }
            Tamper::FailDelete(_) => {}
        }
        document
    }
}

impl DocumentRepository for TamperingRepository {
    fn verification_status(
        &self,
        id: &VerificationId,
    ) -> Result<Option<VerificationStatus>, RepositoryError> {
        self.inner.verification_status(id)
    }

    fn insert_document(
        &self,
        document: StoredDocument,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        self.inner.insert_document(document, audit)
    }

    fn fetch_document(&self, id: &DocumentId) -> Result<Option<StoredDocument>, RepositoryError> {
        Ok(self
            .inner
            .fetch_document(id)?
            .map(|document| self.corrupt(document)))
    }

    fn documents_for(
        &self,
        verification_id: &VerificationId,
    ) -> Result<Vec<StoredDocument>, RepositoryError> {
        self.inner.documents_for(verification_id)
    }

    fn pending_scans(&self, limit: usize) -> Result<Vec<StoredDocument>, RepositoryError> {
        Ok(self
            .inner
            .pending_scans(limit)?
            .into_iter()
            .map(|document| self.corrupt(document))
            .collect())
    }

    fn record_scan(
        &self,
        id: &DocumentId,
        scan: ScanRecord,
        audit: AuditEntry,
    ) -> Result<ScanUpdate, RepositoryError> {
        self.inner.record_scan(id, scan, audit)
    }

    fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<DocumentId>, RepositoryError> {
        self.inner.expired_documents(now)
    }

    fn soft_delete(
        &self,
        id: &DocumentId,
        deleted_at: DateTime<Utc>,
        audit: AuditEntry,
    ) -> Result<bool, RepositoryError> {
        if matches!(self.tamper, Tamper::FailDelete(refused) if &refused == id) {
            return Err(RepositoryError::Unavailable("write timed out".to_string()));
        }
        self.inner.soft_delete(id, deleted_at, audit)
    }
}

/// Vault reading through a [`TamperingRepository`] over the harness store.
pub(super) fn tampered_vault(
    harness: &Harness,
    tamper: Tamper,
    scan_mode: ScanMode,
) -> DocumentVault<TamperingRepository, SignatureScanner> {
    DocumentVault::new(
        Arc::new(TamperingRepository {
            inner: harness.store.clone(),
            tamper,
        }),
        Arc::new(SignatureScanner),
        &key(),
        harness.clock.clone(),
        scan_mode,
    )
}
