use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tracing::{error, info, warn};

use crate::audit::{AuditAction, AuditActor, AuditEntry};
use crate::clock::Clock;
use crate::storage::{read_with_retry, RepositoryError};
use crate::workflows::verification::{VerificationId, VerificationStatus};
use crate::workflows::ErrorKind;

use super::cipher::{checksum, CipherError, DocumentCipher, DocumentKey};
use super::domain::{
    AllowedMime, DocumentId, DocumentMetadata, ScanRecord, ScanStatus, ScanUpdate,
    StoredDocument, SweepSummary, UploadRequest, MAX_DOCUMENT_BYTES, RETENTION_DAYS,
};
use super::repository::DocumentRepository;
use super::scanner::{MalwareScanner, ScanReport};

/// When uploads are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Right after the upload commits, before `upload` returns.
    Inline,
    /// Left pending for [`DocumentVault::scan_pending`] or an external backend.
    Deferred,
}

impl ScanMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "deferred" | "async" => Some(Self::Deferred),
            _ => None,
        }
    }
}

/// Upload input the vault refuses to store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("unsupported content type '{0}' (expected application/pdf, image/jpeg, or image/png)")]
    UnsupportedMime(String),
    #[error("file of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },
    #[error("declared size {declared} does not match the {actual} bytes received")]
    SizeMismatch { declared: u64, actual: u64 },
    #[error("file is empty")]
    Empty,
    #[error("a file name is required")]
    MissingFileName,
}

/// Error raised by the document vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error(transparent)]
    Validation(#[from] UploadRejection),
    #[error("{0}")]
    Conflict(String),
    #[error("document not found")]
    NotFound,
    #[error("document integrity check failed: {0}")]
    Integrity(String),
    #[error("document encryption failed: {0}")]
    Encryption(CipherError),
    #[error(transparent)]
    Storage(RepositoryError),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Validation(_) => ErrorKind::Validation,
            VaultError::Conflict(_) => ErrorKind::Conflict,
            VaultError::NotFound => ErrorKind::NotFound,
            VaultError::Integrity(_) => ErrorKind::Integrity,
            VaultError::Encryption(_) | VaultError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<RepositoryError> for VaultError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(reason) => Self::Conflict(reason),
            RepositoryError::NotFound => Self::NotFound,
            unavailable @ RepositoryError::Unavailable(_) => Self::Storage(unavailable),
        }
    }
}

/// Service owning encryption, integrity checks, scanning, and retention of documents.
pub struct DocumentVault<R, M> {
    repository: Arc<R>,
    scanner: Arc<M>,
    cipher: DocumentCipher,
    clock: Arc<dyn Clock>,
    scan_mode: ScanMode,
}

impl<R, M> DocumentVault<R, M>
where
    R: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    pub fn new(
        repository: Arc<R>,
        scanner: Arc<M>,
        key: &DocumentKey,
        clock: Arc<dyn Clock>,
        scan_mode: ScanMode,
    ) -> Self {
        Self {
            repository,
            scanner,
            cipher: DocumentCipher::new(key),
            clock,
            scan_mode,
        }
    }

    /// Encrypt and store a document for a pending request. Returns metadata only; the scan
    /// verdict may still be pending when this returns.
    pub fn upload(&self, request: UploadRequest) -> Result<DocumentMetadata, VaultError> {
        match self
            .repository
            .verification_status(&request.verification_id)?
        {
            None => return Err(VaultError::NotFound),
            Some(VerificationStatus::Pending) => {}
            Some(status) => {
                return Err(VaultError::Conflict(format!(
                    "verification is {status}; documents can only be attached while pending"
                )))
            }
        }

        let mime_type = AllowedMime::parse(&request.mime_type)
            .ok_or_else(|| UploadRejection::UnsupportedMime(request.mime_type.clone()))?;
        if request.declared_size > MAX_DOCUMENT_BYTES {
            return Err(UploadRejection::TooLarge {
                size: request.declared_size,
                max: MAX_DOCUMENT_BYTES,
            }
            .into());
        }
        let actual = request.bytes.len() as u64;
        if actual != request.declared_size {
            return Err(UploadRejection::SizeMismatch {
                declared: request.declared_size,
                actual,
            }
            .into());
        }
        if actual == 0 {
            return Err(UploadRejection::Empty.into());
        }
        let file_name = request.file_name.trim();
        if file_name.is_empty() {
            return Err(UploadRejection::MissingFileName.into());
        }

        let document_id = DocumentId::new();
        let sealed = self
            .cipher
            .seal(&document_id, &request.verification_id, &request.bytes)
            .map_err(VaultError::Encryption)?;
        let uploaded_at = self.clock.now();

        let document = StoredDocument {
            id: document_id,
            verification_id: request.verification_id,
            uploaded_by: request.uploaded_by.clone(),
            document_type: request.document_type,
            file_name: file_name.to_string(),
            mime_type,
            file_size: actual,
            ciphertext: Some(sealed.ciphertext),
            nonce: sealed.nonce,
            checksum: checksum(&request.bytes),
            scan_status: ScanStatus::Pending,
            scan_date: None,
            scan_result: None,
            uploaded_at,
            scheduled_deletion: uploaded_at + Duration::days(RETENTION_DAYS),
            deleted_at: None,
        };
        let mut metadata = document.metadata();

        let audit = AuditEntry::new(
            AuditActor::User(request.uploaded_by),
            AuditAction::DocumentUploaded,
            json!({
                "document_id": document_id,
                "verification_id": request.verification_id,
                "document_type": request.document_type,
                "mime_type": mime_type.as_str(),
                "file_size": actual,
            }),
            uploaded_at,
        );
        self.repository.insert_document(document, audit)?;
        info!(
            document_id = %document_id,
            verification_id = %request.verification_id,
            file_size = actual,
            "document stored"
        );

        if self.scan_mode == ScanMode::Inline {
            match self.scan_plaintext(&document_id, &request.bytes) {
                Ok(status) => {
                    metadata.scan_status = status;
                }
                Err(err) => {
                    warn!(document_id = %document_id, error = %err, "inline scan not recorded");
                }
            }
        }

        Ok(metadata)
    }

    /// Decrypt a document. Access control is the caller's responsibility.
    pub fn retrieve(&self, document_id: &DocumentId) -> Result<Vec<u8>, VaultError> {
        let document = read_with_retry("vault.retrieve", || {
            self.repository.fetch_document(document_id)
        })?
        .ok_or(VaultError::NotFound)?;

        self.open_document(&document)
    }

    /// Metadata for a single document, purged documents included.
    pub fn metadata(&self, document_id: &DocumentId) -> Result<DocumentMetadata, VaultError> {
        let document = read_with_retry("vault.metadata", || {
            self.repository.fetch_document(document_id)
        })?
        .ok_or(VaultError::NotFound)?;
        Ok(document.metadata())
    }

    pub fn list(
        &self,
        verification_id: &VerificationId,
    ) -> Result<Vec<DocumentMetadata>, VaultError> {
        let documents = read_with_retry("vault.list", || {
            self.repository.documents_for(verification_id)
        })?;
        Ok(documents.iter().map(StoredDocument::metadata).collect())
    }

    /// Apply a verdict delivered by a scanning backend. Delivering the same verdict twice is a
    /// no-op, and the first final verdict always wins.
    pub fn record_scan(
        &self,
        document_id: &DocumentId,
        report: ScanReport,
    ) -> Result<ScanStatus, VaultError> {
        self.apply_scan(document_id, report.status(), report.detail)
    }

    /// Scan up to `limit` documents still waiting on a verdict. Returns how many received one.
    pub fn scan_pending(&self, limit: usize) -> Result<usize, VaultError> {
        let pending = self.repository.pending_scans(limit)?;
        let mut scanned = 0;

        for document in pending {
            let outcome = match self.open_document(&document) {
                Ok(plaintext) => self.scan_plaintext(&document.id, &plaintext),
                Err(VaultError::Integrity(reason)) => self.apply_scan(
                    &document.id,
                    ScanStatus::Error,
                    format!("integrity check failed: {reason}"),
                ),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(_) => scanned += 1,
                Err(VaultError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(scanned)
    }

    /// Soft-delete every document whose retention window has closed. Safe to re-run.
    ///
    /// A document that fails to purge is logged and left for the next pass; the rest of the
    /// batch still goes through. Fails only when nothing could be purged.
    pub fn purge_expired(&self) -> Result<usize, VaultError> {
        let now = self.clock.now();
        let expired = self.repository.expired_documents(now)?;
        let mut purged = 0;
        let mut first_failure = None;

        for document_id in expired {
            match self.soft_delete(&document_id, AuditActor::System, "retention window elapsed") {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(document_id = %document_id, error = %err, "retention purge failed");
                    first_failure.get_or_insert(err);
                }
            }
        }

        if purged > 0 {
            info!(purged, "purged expired document payloads");
        }
        match first_failure {
            Some(err) if purged == 0 => Err(err),
            _ => Ok(purged),
        }
    }

    /// One maintenance pass: retention purge first so expired payloads are never scanned,
    /// then up to `scan_limit` pending scans.
    pub fn sweep(&self, scan_limit: usize) -> Result<SweepSummary, VaultError> {
        let purged = self.purge_expired()?;
        let scanned = self.scan_pending(scan_limit)?;
        Ok(SweepSummary { purged, scanned })
    }

    fn soft_delete(
        &self,
        document_id: &DocumentId,
        actor: AuditActor,
        reason: &str,
    ) -> Result<bool, VaultError> {
        let now = self.clock.now();
        let audit = AuditEntry::new(
            actor,
            AuditAction::DocumentPurged,
            json!({ "document_id": document_id, "reason": reason }),
            now,
        );
        match self.repository.soft_delete(document_id, now, audit) {
            Ok(deleted) => Ok(deleted),
            // Removed between listing and purge.
            Err(RepositoryError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn open_document(&self, document: &StoredDocument) -> Result<Vec<u8>, VaultError> {
        let ciphertext = match (&document.ciphertext, document.deleted_at) {
            (Some(ciphertext), None) => ciphertext,
            _ => return Err(VaultError::NotFound),
        };

        let plaintext = self
            .cipher
            .open(
                &document.id,
                &document.verification_id,
                &document.nonce,
                ciphertext,
            )
            .map_err(|err| {
                error!(document_id = %document.id, "document failed authenticated decryption");
                VaultError::Integrity(err.to_string())
            })?;

        if checksum(&plaintext) != document.checksum {
            error!(document_id = %document.id, "document checksum mismatch after decryption");
            return Err(VaultError::Integrity(
                "plaintext checksum does not match stored checksum".to_string(),
            ));
        }

        Ok(plaintext)
    }

    fn scan_plaintext(
        &self,
        document_id: &DocumentId,
        plaintext: &[u8],
    ) -> Result<ScanStatus, VaultError> {
        match self.scanner.scan(plaintext) {
            Ok(report) => self.apply_scan(document_id, report.status(), report.detail),
            Err(err) => self.apply_scan(document_id, ScanStatus::Error, err.to_string()),
        }
    }

    fn apply_scan(
        &self,
        document_id: &DocumentId,
        status: ScanStatus,
        detail: String,
    ) -> Result<ScanStatus, VaultError> {
        let scanned_at = self.clock.now();
        let audit = AuditEntry::new(
            AuditActor::System,
            AuditAction::DocumentScanned,
            json!({
                "document_id": document_id,
                "scan_status": status.label(),
                "detail": detail.clone(),
            }),
            scanned_at,
        );
        let scan = ScanRecord {
            status,
            detail,
            scanned_at,
        };

        match self.repository.record_scan(document_id, scan, audit)? {
            ScanUpdate::Applied => {
                if status == ScanStatus::Infected {
                    warn!(document_id = %document_id, "scan flagged document as infected");
                }
                Ok(status)
            }
            ScanUpdate::Unchanged { current } => {
                if current != status {
                    warn!(
                        document_id = %document_id,
                        current = current.label(),
                        ignored = status.label(),
                        "late scan verdict ignored"
                    );
                }
                Ok(current)
            }
        }
    }
}
