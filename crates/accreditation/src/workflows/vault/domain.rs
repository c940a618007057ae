use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;
use crate::workflows::verification::VerificationId;

/// Uploaded payloads are purged this long after upload, whatever the review outcome.
pub const RETENTION_DAYS: i64 = 30;
/// Largest accepted upload (10 MiB).
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;
/// Documents scanned per maintenance pass unless the caller asks otherwise.
pub const DEFAULT_SCAN_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    BankStatement,
    TaxReturn,
    W2,
    BrokerageStatement,
    CpaLetter,
    AttorneyLetter,
    ProfessionalLicense,
    Other,
}

/// Content types the vault accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowedMime {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl AllowedMime {
    /// Parse a declared content type, ignoring parameters such as `charset`.
    pub fn parse(declared: &str) -> Option<Self> {
        let parsed: mime::Mime = declared.trim().parse().ok()?;
        let essence = parsed.essence_str();
        if essence == mime::APPLICATION_PDF.essence_str() {
            Some(Self::Pdf)
        } else if essence == mime::IMAGE_JPEG.essence_str() {
            Some(Self::Jpeg)
        } else if essence == mime::IMAGE_PNG.essence_str() {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AllowedMime::Pdf => "application/pdf",
            AllowedMime::Jpeg => "image/jpeg",
            AllowedMime::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Pending,
    Clean,
    Infected,
    Error,
}

impl ScanStatus {
    pub const fn is_final(self) -> bool {
        !matches!(self, ScanStatus::Pending)
    }

    pub const fn label(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
            ScanStatus::Error => "error",
        }
    }
}

/// Scan result as persisted on the document row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub status: ScanStatus,
    pub detail: String,
    pub scanned_at: DateTime<Utc>,
}

/// Outcome of applying a scan result to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanUpdate {
    Applied,
    /// The document already carried a final verdict, which is kept.
    Unchanged { current: ScanStatus },
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub purged: usize,
    pub scanned: usize,
}

/// Document row. `ciphertext` is `Some` exactly while `deleted_at` is `None`.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub verification_id: VerificationId,
    pub uploaded_by: UserId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub mime_type: AllowedMime,
    pub file_size: u64,
    pub ciphertext: Option<Vec<u8>>,
    pub nonce: [u8; 12],
    /// Hex SHA-256 of the plaintext.
    pub checksum: String,
    pub scan_status: ScanStatus,
    pub scan_date: Option<DateTime<Utc>>,
    pub scan_result: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub scheduled_deletion: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredDocument {
    pub fn is_purged(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            id: self.id,
            verification_id: self.verification_id,
            document_type: self.document_type,
            file_name: self.file_name.clone(),
            mime_type: self.mime_type,
            file_size: self.file_size,
            scan_status: self.scan_status,
            scan_date: self.scan_date,
            scan_result: self.scan_result.clone(),
            uploaded_at: self.uploaded_at,
            scheduled_deletion: self.scheduled_deletion,
            deleted_at: self.deleted_at,
        }
    }
}

// Payload bytes and checksum stay out of debug output.
impl fmt::Debug for StoredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredDocument")
            .field("id", &self.id)
            .field("verification_id", &self.verification_id)
            .field("document_type", &self.document_type)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("file_size", &self.file_size)
            .field("has_ciphertext", &self.ciphertext.is_some())
            .field("scan_status", &self.scan_status)
            .field("uploaded_at", &self.uploaded_at)
            .field("deleted_at", &self.deleted_at)
            .finish_non_exhaustive()
    }
}

/// Sanitized view of a document; never carries payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub id: DocumentId,
    pub verification_id: VerificationId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub mime_type: AllowedMime,
    pub file_size: u64,
    pub scan_status: ScanStatus,
    pub scan_date: Option<DateTime<Utc>>,
    pub scan_result: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub scheduled_deletion: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Inbound upload. `mime_type` is the caller-declared content type and is validated by the
/// vault.
#[derive(Clone)]
pub struct UploadRequest {
    pub verification_id: VerificationId,
    pub uploaded_by: UserId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub mime_type: String,
    pub declared_size: u64,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("verification_id", &self.verification_id)
            .field("document_type", &self.document_type)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}
