//! Domain models for the federated `AuthN` strategy.

use std::fmt;

use schemars::JsonSchema;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Message shown to end callers for every failed login, whatever the cause.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid credentials";

/// Credential payload presented by the caller on each login attempt.
///
/// This is the input shape contributed to the host's request schema. Both
/// fields are required.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[schemars(
    title = "FederatedAuthInput",
    description = "The encoded ID token and subject id returned by the identity provider"
)]
pub struct CredentialPayload {
    /// Encoded ID token issued by the identity provider. Never serialized;
    /// `SecretString` keeps it out of `Debug` output.
    #[schemars(with = "String")]
    pub token: SecretString,
    /// Subject id the caller claims the token belongs to.
    pub claimed_subject_id: String,
}

impl CredentialPayload {
    #[must_use]
    pub fn new(token: impl Into<String>, claimed_subject_id: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            claimed_subject_id: claimed_subject_id.into(),
        }
    }
}

/// Trusted output of the identity verifier. Lives for one attempt only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub verified_at: OffsetDateTime,
}

/// Link between a local user and one external-provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationMethod {
    pub id: Uuid,
    /// Name of the strategy that owns this identity (e.g. `"firebase"`).
    pub strategy: String,
    /// Subject id assigned by the external provider.
    pub external_identifier: String,
}

/// Authentication method that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthenticationMethod {
    pub strategy: String,
    pub external_identifier: String,
}

/// Local user record owned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// External subject id; unique across the directory.
    pub identifier: String,
    pub verified: bool,
    pub authentication_methods: Vec<AuthenticationMethod>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Returns the authentication method registered for `strategy`, if any.
    #[must_use]
    pub fn authentication_method(&self, strategy: &str) -> Option<&AuthenticationMethod> {
        self.authentication_methods
            .iter()
            .find(|m| m.strategy == strategy)
    }
}

/// User record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub identifier: String,
    pub verified: bool,
    /// Already-persisted methods the new user should reference.
    pub authentication_methods: Vec<AuthenticationMethod>,
}

/// Per-request context handed to the strategy and to the user directory.
///
/// Directory implementations use it to scope their work to the current
/// request; the strategy uses `request_id` for log correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Uuid,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn with_request_id(request_id: Uuid) -> Self {
        Self { request_id }
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the identity verifier gets its credentials from.
///
/// Resolved once, at initialization.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Service-account key material, optionally with an alternate
    /// verification endpoint (emulators, private deployments).
    Explicit {
        key_material: SecretString,
        endpoint: Option<String>,
    },
    /// Credentials discovered from the process environment.
    Ambient,
}

/// Why an attempt was rejected. Only ever logged, never shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Token malformed, expired, or signature-invalid.
    InvalidToken,
    /// Token is valid but attests to a different subject than claimed.
    SubjectMismatch,
    /// No local user exists and registration is disabled.
    RegistrationDisabled,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken => f.write_str("invalid token"),
            Self::SubjectMismatch => f.write_str("claimed subject does not match verified subject"),
            Self::RegistrationDisabled => f.write_str("new user registration is disabled"),
        }
    }
}

/// Result of a single authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials accepted; the user is the authenticated principal.
    Authenticated(User),
    /// Credentials rejected. Not a system failure.
    Rejected(RejectionReason),
    /// Something broke while authenticating (provider outage, storage
    /// failure). Fails closed, like a rejection.
    SystemError(String),
}

impl AuthOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Borrow the authenticated user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Rejected(_) | Self::SystemError(_) => None,
        }
    }

    /// Collapse into the host pipeline's `User | false` contract.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Rejected(_) | Self::SystemError(_) => None,
        }
    }

    /// Message safe to return to the end caller.
    ///
    /// Every failure renders the same text so callers cannot tell a bad
    /// token from a backend outage.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Authenticated(_) => "authenticated",
            Self::Rejected(_) | Self::SystemError(_) => INVALID_CREDENTIALS_MESSAGE,
        }
    }
}
