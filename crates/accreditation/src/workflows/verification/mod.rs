//! Accredited-investor verification requests: submission, eligibility, review, and status.

pub mod domain;
pub mod eligibility;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AccreditationStatus, FinancialAttestation, StatusUpdate, VerificationId, VerificationRecord,
    VerificationStatus, VerificationSubmission, VerificationType, VerificationView,
    APPROVAL_VALIDITY_DAYS,
};
pub use eligibility::{
    EligibilityError, EligibilityPolicy, SubmissionDefect, ValidationError, MIN_ANNUAL_INCOME,
    MIN_NET_WORTH,
};
pub use repository::VerificationRepository;
pub use service::{VerificationError, VerificationService};
