//! Identity verifier service.
//!
//! Owns the verification backend client for every strategy instance that
//! shares it. The client is created at most once per verifier, no matter how
//! many strategies call [`IdentityVerifier::initialize`] or how concurrently
//! they do it.

use std::sync::Arc;

use federated_authn_sdk::{
    CredentialSource, VerificationBackend, VerificationBackendFactory, VerifiedIdentity,
    VerifierError,
};
use parking_lot::RwLock;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Shared, lifecycle-managed wrapper around a verification backend.
pub struct IdentityVerifier {
    factory: Arc<dyn VerificationBackendFactory>,
    /// Written only by `initialize` and `teardown`.
    state: RwLock<ClientState>,
}

#[derive(Default)]
struct ClientState {
    client: Option<Arc<dyn VerificationBackend>>,
    /// Number of `initialize` calls not yet matched by `teardown`.
    holders: usize,
}

impl IdentityVerifier {
    #[must_use]
    pub fn new(factory: Arc<dyn VerificationBackendFactory>) -> Self {
        Self {
            factory,
            state: RwLock::new(ClientState::default()),
        }
    }

    /// Register a holder and create the backend client unless one exists.
    ///
    /// Returns `true` if this call created the client, `false` if an existing
    /// one was reused. Creation happens under the write lock, so concurrent
    /// first-time callers produce exactly one client. Every successful call
    /// must be balanced by one [`IdentityVerifier::teardown`].
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if `source` is malformed. Callers should treat
    /// this as a fatal startup error. A failed call registers no holder.
    pub fn initialize(&self, source: &CredentialSource) -> Result<bool, VerifierError> {
        let mut state = self.state.write();
        if state.client.is_some() {
            state.holders += 1;
            debug!(holders = state.holders, "Verification client already initialized, reusing");
            return Ok(false);
        }

        let mode = match source {
            CredentialSource::Explicit { .. } => "explicit",
            CredentialSource::Ambient => "ambient",
        };
        let client = self.factory.connect(source)?;
        state.client = Some(client);
        state.holders = 1;
        info!(mode, "Verification client initialized");
        Ok(true)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().client.is_some()
    }

    /// Verify `token` and return the identity it attests to.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if no client exists
    /// - `InvalidToken` / `ProviderUnavailable` from the backend
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerifierError> {
        // Clone the client out so no lock is held across the backend call
        let client = self
            .state
            .read()
            .client
            .clone()
            .ok_or(VerifierError::NotInitialized)?;

        let subject_id = client.verify_token(token).await?;
        Ok(VerifiedIdentity {
            subject_id,
            verified_at: OffsetDateTime::now_utc(),
        })
    }

    /// Drop one holder and release the backend client once none remain.
    ///
    /// Returns `true` if the client was released. Attempts already holding the
    /// client finish normally; later calls to `verify` fail with
    /// `NotInitialized` until the verifier is initialized again. Without a
    /// matching `initialize` this is a no-op.
    pub fn teardown(&self) -> bool {
        let mut state = self.state.write();
        if state.client.is_none() {
            return false;
        }
        state.holders = state.holders.saturating_sub(1);
        if state.holders > 0 {
            debug!(holders = state.holders, "Verification client still in use");
            return false;
        }
        state.client = None;
        info!("Verification client released");
        true
    }
}
