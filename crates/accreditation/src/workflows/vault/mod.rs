//! Encrypted storage for documents supporting a verification request.
//!
//! Uploads are sealed with AES-256-GCM, checksummed over the plaintext, and handed to a
//! pluggable malware scanner. Payloads are purged once their retention window closes while
//! the metadata row is kept for audit.

pub mod cipher;
pub mod domain;
pub mod repository;
pub mod scanner;
pub mod service;

#[cfg(test)]
mod tests;

pub use cipher::{CipherError, DocumentCipher, DocumentKey, KeyDecodeError};
pub use domain::{
    AllowedMime, DocumentId, DocumentMetadata, DocumentType, ScanRecord, ScanStatus, ScanUpdate,
    StoredDocument, SweepSummary, UploadRequest, DEFAULT_SCAN_BATCH, MAX_DOCUMENT_BYTES, RETENTION_DAYS,
};
pub use repository::DocumentRepository;
pub use scanner::{
    MalwareScanner, ScanError, ScanReport, ScanVerdict, SignatureScanner, StaticScanner,
};
pub use service::{DocumentVault, ScanMode, UploadRejection, VaultError};
