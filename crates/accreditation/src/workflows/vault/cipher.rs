//! AES-256-GCM encryption at rest for vault payloads.
//!
//! Each document is sealed under the process key with a fresh 96-bit nonce. The document and
//! verification ids are bound as associated data so a ciphertext cannot be swapped onto a
//! different row. The SHA-256 checksum is taken over the plaintext and checked again after
//! decryption.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::domain::DocumentId;
use crate::workflows::verification::VerificationId;

/// AES-GCM nonce size (12 bytes).
pub const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Process-wide document key. Read-only after start and redacted from debug output.
#[derive(Clone)]
pub struct DocumentKey([u8; KEY_SIZE]);

impl DocumentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Accepts 64 hex characters or standard base64 of exactly 32 bytes.
    pub fn from_encoded(raw: &str) -> Result<Self, KeyDecodeError> {
        let raw = raw.trim();
        let bytes = if raw.len() == KEY_SIZE * 2 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(raw).map_err(|_| KeyDecodeError::Encoding)?
        } else {
            STANDARD.decode(raw).map_err(|_| KeyDecodeError::Encoding)?
        };

        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| KeyDecodeError::Length(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyDecodeError {
    #[error("expected 64 hex characters or base64")]
    Encoding,
    #[error("expected a 32 byte key, got {0} bytes")]
    Length(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Seal,
    /// Wrong key, wrong row, or modified ciphertext.
    #[error("ciphertext failed authentication")]
    Authentication,
}

/// Output of [`DocumentCipher::seal`].
pub struct Sealed {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

#[derive(Clone)]
pub struct DocumentCipher {
    aead: Aes256Gcm,
}

impl DocumentCipher {
    pub fn new(key: &DocumentKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key.0);
        Self {
            aead: Aes256Gcm::new(key),
        }
    }

    pub fn seal(
        &self,
        document_id: &DocumentId,
        verification_id: &VerificationId,
        plaintext: &[u8],
    ) -> Result<Sealed, CipherError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let aad = associated_data(document_id, verification_id);
        let ciphertext = self
            .aead
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::Seal)?;

        Ok(Sealed { nonce, ciphertext })
    }

    pub fn open(
        &self,
        document_id: &DocumentId,
        verification_id: &VerificationId,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let aad = associated_data(document_id, verification_id);
        self.aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| CipherError::Authentication)
    }
}

impl fmt::Debug for DocumentCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentCipher")
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn associated_data(document_id: &DocumentId, verification_id: &VerificationId) -> [u8; 32] {
    let mut aad = [0u8; 32];
    aad[..16].copy_from_slice(document_id.0.as_bytes());
    aad[16..].copy_from_slice(verification_id.0.as_bytes());
    aad
}
