//! Error types for the federated `AuthN` SDK.

use thiserror::Error;

/// Errors raised by the identity verifier and its backends.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// The token is malformed, expired, or its signature is invalid.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The verification backend could not be reached.
    #[error("verification provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// `verify` was called before `initialize` (or after `teardown`).
    #[error("identity verifier is not initialized")]
    NotInitialized,

    /// Credentials supplied at initialization are malformed. Fatal at startup.
    #[error("invalid verifier credentials: {0}")]
    InvalidCredentials(String),
}

/// Errors raised by user directory implementations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A uniqueness constraint was violated (e.g. duplicate `identifier`).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying store is not reachable.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
