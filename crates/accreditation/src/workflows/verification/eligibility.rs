use super::domain::{VerificationStatus, VerificationSubmission, VerificationType};

/// SEC Rule 501(a) single-filer income threshold.
pub const MIN_ANNUAL_INCOME: u64 = 200_000;
/// SEC Rule 501(a) net worth threshold, excluding primary residence.
pub const MIN_NET_WORTH: u64 = 1_000_000;

/// Malformed or incomplete input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("the applicant must attest that the submitted information is accurate")]
    AttestationRequired,
    #[error("the applicant must consent to verification")]
    ConsentRequired,
    #[error("liquid net worth (${liquid}) cannot exceed net worth (${total})")]
    LiquidNetWorthExceedsNetWorth { liquid: u64, total: u64 },
    #[error("status {0} cannot be set by a reviewer")]
    UnsupportedReviewStatus(VerificationStatus),
    #[error("a rejection reason is required when rejecting a verification")]
    RejectionReasonRequired,
}

/// Submission is well formed but does not meet an accreditation threshold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityError {
    #[error("annual income is required for income-based verification")]
    MissingAnnualIncome,
    #[error("annual income of ${found} is below the ${required} minimum")]
    IncomeBelowMinimum { required: u64, found: u64 },
    #[error("an income source is required for income-based verification")]
    MissingIncomeSource,
    #[error("net worth is required for net-worth-based verification")]
    MissingNetWorth,
    #[error("net worth of ${found} is below the ${required} minimum")]
    NetWorthBelowMinimum { required: u64, found: u64 },
    #[error("a professional credential is required for professional verification")]
    MissingCredential,
}

/// Either half of the submission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionDefect {
    Invalid(ValidationError),
    Ineligible(EligibilityError),
}

impl From<ValidationError> for SubmissionDefect {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<EligibilityError> for SubmissionDefect {
    fn from(value: EligibilityError) -> Self {
        Self::Ineligible(value)
    }
}

/// Thresholds applied to new submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    pub min_annual_income: u64,
    pub min_net_worth: u64,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            min_annual_income: MIN_ANNUAL_INCOME,
            min_net_worth: MIN_NET_WORTH,
        }
    }
}

impl EligibilityPolicy {
    pub fn check(&self, submission: &VerificationSubmission) -> Result<(), SubmissionDefect> {
        if !submission.attestation {
            return Err(ValidationError::AttestationRequired.into());
        }
        if !submission.consent_to_verify {
            return Err(ValidationError::ConsentRequired.into());
        }

        let financials = &submission.financials;
        match submission.kind {
            VerificationType::Income => {
                let income = financials
                    .annual_income
                    .ok_or(EligibilityError::MissingAnnualIncome)?;
                if income < self.min_annual_income {
                    return Err(EligibilityError::IncomeBelowMinimum {
                        required: self.min_annual_income,
                        found: income,
                    }
                    .into());
                }
                if is_blank(financials.income_source.as_deref()) {
                    return Err(EligibilityError::MissingIncomeSource.into());
                }
            }
            VerificationType::NetWorth => {
                let net_worth = financials
                    .net_worth
                    .ok_or(EligibilityError::MissingNetWorth)?;
                if let Some(liquid) = financials.liquid_net_worth {
                    if liquid > net_worth {
                        return Err(ValidationError::LiquidNetWorthExceedsNetWorth {
                            liquid,
                            total: net_worth,
                        }
                        .into());
                    }
                }
                if net_worth < self.min_net_worth {
                    return Err(EligibilityError::NetWorthBelowMinimum {
                        required: self.min_net_worth,
                        found: net_worth,
                    }
                    .into());
                }
            }
            VerificationType::Professional => {
                if is_blank(submission.professional_credential.as_deref()) {
                    return Err(EligibilityError::MissingCredential.into());
                }
            }
        }

        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |text| text.trim().is_empty())
}
