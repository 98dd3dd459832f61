//! Verification backend contract.
//!
//! A backend wraps the third-party capability that turns an opaque ID token
//! into a trusted subject id. The identity verifier treats it as a black box.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VerifierError;
use crate::models::CredentialSource;

/// A live verification client.
#[async_trait]
pub trait VerificationBackend: Send + Sync {
    /// Verify `token` and return the subject id it attests to.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the token is malformed, expired, or signature-invalid
    /// - `ProviderUnavailable` if the backend cannot be reached
    async fn verify_token(&self, token: &str) -> Result<String, VerifierError>;
}

/// Creates verification clients from credentials.
///
/// Construction must not perform network I/O; backends fetch whatever they
/// need lazily on the first `verify_token` call.
pub trait VerificationBackendFactory: Send + Sync {
    /// Build a client for `source`.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if the credential source is malformed or incomplete.
    fn connect(
        &self,
        source: &CredentialSource,
    ) -> Result<Arc<dyn VerificationBackend>, VerifierError>;
}
