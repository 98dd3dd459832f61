#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Federated `AuthN` SDK
//!
//! This crate provides the public API for the `federated_authn` module:
//!
//! - [`FederatedAuthNClient`] - Public API trait for the host pipeline
//! - [`VerificationBackend`] / [`VerificationBackendFactory`] - Identity provider contract
//! - [`UserDirectory`] / [`DirectoryTransaction`] - Local user store contract
//! - [`AuthOutcome`] - Three-way authentication result
//! - [`VerifierError`] / [`DirectoryError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use federated_authn_sdk::{CredentialPayload, FederatedAuthNClient, RequestContext};
//!
//! let payload = CredentialPayload::new(id_token, uid);
//! let outcome = strategy.authenticate(&RequestContext::new(), &payload).await;
//! let user = outcome.into_user();
//! ```

pub mod api;
pub mod backend_api;
pub mod directory_api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::FederatedAuthNClient;
pub use backend_api::{VerificationBackend, VerificationBackendFactory};
pub use directory_api::{DirectoryTransaction, UserDirectory};
pub use error::{DirectoryError, VerifierError};
pub use models::{
    AuthOutcome, AuthenticationMethod, CredentialPayload, CredentialSource,
    INVALID_CREDENTIALS_MESSAGE, NewAuthenticationMethod, NewUser, RejectionReason,
    RequestContext, User, VerifiedIdentity,
};
