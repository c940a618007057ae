pub mod router;
pub mod vault;
pub mod verification;

pub use router::{accreditation_router, AccreditationApi};

use serde::Serialize;

/// Coarse failure classification shared by both workflows so callers can map errors onto
/// user-facing responses without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Eligibility,
    Conflict,
    NotFound,
    Integrity,
    Storage,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Eligibility => "eligibility",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Storage => "storage",
        }
    }
}
