use serde::{Deserialize, Serialize};

use super::domain::ScanStatus;

/// Standard anti-malware test string.
const EICAR_SIGNATURE: &[u8] = b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanVerdict {
    Clean,
    Infected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub verdict: ScanVerdict,
    pub detail: String,
}

impl ScanReport {
    pub fn clean(detail: impl Into<String>) -> Self {
        Self {
            verdict: ScanVerdict::Clean,
            detail: detail.into(),
        }
    }

    pub fn infected(detail: impl Into<String>) -> Self {
        Self {
            verdict: ScanVerdict::Infected,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> ScanStatus {
        match self.verdict {
            ScanVerdict::Clean => ScanStatus::Clean,
            ScanVerdict::Infected => ScanStatus::Infected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("scanning backend unavailable: {0}")]
    Unavailable(String),
}

/// Malware/integrity scanning backend. Implementations may take arbitrarily long; the vault
/// never assumes a verdict is available when an upload returns.
pub trait MalwareScanner: Send + Sync {
    fn scan(&self, bytes: &[u8]) -> Result<ScanReport, ScanError>;
}

/// Local scanner that flags payloads carrying a known test signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureScanner;

impl MalwareScanner for SignatureScanner {
    fn scan(&self, bytes: &[u8]) -> Result<ScanReport, ScanError> {
        if bytes
            .windows(EICAR_SIGNATURE.len())
            .any(|window| window == EICAR_SIGNATURE)
        {
            Ok(ScanReport::infected("EICAR test signature"))
        } else {
            Ok(ScanReport::clean("no known signatures"))
        }
    }
}

/// Scanner returning a fixed outcome regardless of input.
#[derive(Debug, Clone)]
pub struct StaticScanner {
    outcome: Result<ScanReport, ScanError>,
}

impl StaticScanner {
    pub fn new(outcome: Result<ScanReport, ScanError>) -> Self {
        Self { outcome }
    }
}

impl MalwareScanner for StaticScanner {
    fn scan(&self, _bytes: &[u8]) -> Result<ScanReport, ScanError> {
        self.outcome.clone()
    }
}
