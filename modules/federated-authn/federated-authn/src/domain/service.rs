//! Authentication flow: verify, then match or provision.

use std::sync::Arc;

use federated_authn_sdk::{
    AuthOutcome, CredentialPayload, DirectoryError, DirectoryTransaction, NewAuthenticationMethod,
    NewUser, RequestContext, User, UserDirectory, VerifiedIdentity,
};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, instrument, warn};

use super::error::DomainError;
use super::verifier::IdentityVerifier;

/// Federation service.
///
/// Holds no per-attempt state; one instance serves every concurrent login.
pub struct Service {
    strategy_name: String,
    allow_new_user_registration: bool,
    verifier: Arc<IdentityVerifier>,
    directory: Arc<dyn UserDirectory>,
}

impl Service {
    #[must_use]
    pub fn new(
        strategy_name: String,
        allow_new_user_registration: bool,
        verifier: Arc<IdentityVerifier>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            strategy_name,
            allow_new_user_registration,
            verifier,
            directory,
        }
    }

    #[must_use]
    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    /// Run one authentication attempt.
    ///
    /// Never propagates errors: rejections are logged at `warn`, faults at
    /// `error`, and both come back as a non-authenticated outcome.
    #[instrument(
        skip_all,
        fields(strategy = %self.strategy_name, request_id = %ctx.request_id())
    )]
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        payload: &CredentialPayload,
    ) -> AuthOutcome {
        match self.try_authenticate(ctx, payload).await {
            Ok(user) => AuthOutcome::Authenticated(user),
            Err(e) => {
                if let Some(reason) = e.rejection_reason() {
                    warn!(%reason, error = %e, "Authentication rejected");
                } else {
                    error!(error = ?e, "Authentication failed with an internal error");
                }
                e.into_outcome()
            }
        }
    }

    async fn try_authenticate(
        &self,
        ctx: &RequestContext,
        payload: &CredentialPayload,
    ) -> Result<User, DomainError> {
        let identity = self.verifier.verify(payload.token.expose_secret()).await?;

        if identity.subject_id != payload.claimed_subject_id {
            return Err(DomainError::SubjectMismatch {
                claimed: payload.claimed_subject_id.clone(),
                verified: identity.subject_id,
            });
        }

        if let Some(user) = self
            .directory
            .find_by_identifier(ctx, &identity.subject_id)
            .await?
        {
            debug!(subject_id = %identity.subject_id, "Matched existing user");
            return Ok(user);
        }

        if !self.allow_new_user_registration {
            return Err(DomainError::RegistrationDisabled {
                subject_id: identity.subject_id,
            });
        }

        match self.provision(ctx, &identity).await {
            Err(DomainError::Directory(DirectoryError::Conflict(detail))) => {
                // A concurrent attempt provisioned the same subject first
                debug!(%detail, subject_id = %identity.subject_id, "Provisioning conflict, re-reading user");
                self.directory
                    .find_by_identifier(ctx, &identity.subject_id)
                    .await?
                    .ok_or(DomainError::Directory(DirectoryError::Conflict(detail)))
            }
            other => other,
        }
    }

    /// Create the authentication method, then the user, in one transaction.
    async fn provision(
        &self,
        ctx: &RequestContext,
        identity: &VerifiedIdentity,
    ) -> Result<User, DomainError> {
        let mut tx = self.directory.begin(ctx).await?;

        match self.stage_new_user(tx.as_mut(), identity).await {
            Ok(user) => {
                tx.commit().await?;
                info!(
                    subject_id = %identity.subject_id,
                    user_id = %user.id,
                    "Provisioned new user"
                );
                Ok(user)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back provisioning");
                }
                Err(e.into())
            }
        }
    }

    async fn stage_new_user(
        &self,
        tx: &mut dyn DirectoryTransaction,
        identity: &VerifiedIdentity,
    ) -> Result<User, DirectoryError> {
        let method = tx
            .save_authentication_method(NewAuthenticationMethod {
                strategy: self.strategy_name.clone(),
                external_identifier: identity.subject_id.clone(),
            })
            .await?;

        tx.save_user(NewUser {
            identifier: identity.subject_id.clone(),
            verified: true,
            authentication_methods: vec![method],
        })
        .await
    }
}
