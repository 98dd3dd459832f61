//! Public API trait for the federated `AuthN` strategy.
//!
//! The host authentication pipeline calls this trait once per login request.

use async_trait::async_trait;

use crate::models::{AuthOutcome, CredentialPayload, RequestContext};

/// Public API trait for the federated `AuthN` strategy.
///
/// ```ignore
/// let outcome = strategy.authenticate(&ctx, &payload).await;
/// match outcome.into_user() {
///     Some(user) => login(user),
///     None => reject(INVALID_CREDENTIALS_MESSAGE),
/// }
/// ```
#[async_trait]
pub trait FederatedAuthNClient: Send + Sync {
    /// Verify the payload's token and resolve the matching local user.
    ///
    /// Never fails: internal errors are logged and reported as
    /// [`AuthOutcome::SystemError`], which callers must treat as a failed login.
    async fn authenticate(&self, ctx: &RequestContext, payload: &CredentialPayload) -> AuthOutcome;
}
