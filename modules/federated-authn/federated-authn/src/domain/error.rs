//! Domain errors for the federated `AuthN` strategy.

use federated_authn_sdk::{AuthOutcome, DirectoryError, RejectionReason, VerifierError};
use thiserror::Error;

/// Internal domain errors.
///
/// Every variant ends the attempt; [`DomainError::into_outcome`] decides
/// whether the caller sees a rejection or a system error.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("verification provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("identity verifier is not initialized")]
    VerifierNotInitialized,

    #[error("claimed subject '{claimed}' does not match verified subject '{verified}'")]
    SubjectMismatch { claimed: String, verified: String },

    #[error("no user for subject '{subject_id}' and new user registration is disabled")]
    RegistrationDisabled { subject_id: String },

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Rejections are expected login failures; everything else is a fault.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Self::InvalidToken(_) => Some(RejectionReason::InvalidToken),
            Self::SubjectMismatch { .. } => Some(RejectionReason::SubjectMismatch),
            Self::RegistrationDisabled { .. } => Some(RejectionReason::RegistrationDisabled),
            Self::ProviderUnavailable(_)
            | Self::VerifierNotInitialized
            | Self::Directory(_)
            | Self::Internal(_) => None,
        }
    }

    #[must_use]
    pub fn into_outcome(self) -> AuthOutcome {
        match self.rejection_reason() {
            Some(reason) => AuthOutcome::Rejected(reason),
            None => AuthOutcome::SystemError(self.to_string()),
        }
    }
}

impl From<VerifierError> for DomainError {
    fn from(e: VerifierError) -> Self {
        match e {
            VerifierError::InvalidToken(msg) => Self::InvalidToken(msg),
            VerifierError::ProviderUnavailable(msg) => Self::ProviderUnavailable(msg),
            VerifierError::NotInitialized => Self::VerifierNotInitialized,
            VerifierError::InvalidCredentials(msg) => {
                Self::Internal(format!("verifier credentials: {msg}"))
            }
        }
    }
}
