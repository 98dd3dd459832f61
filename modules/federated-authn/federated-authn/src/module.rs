//! Federated `AuthN` strategy module.

use std::sync::{Arc, OnceLock};

use anyhow::Context;
use async_trait::async_trait;
use federated_authn_sdk::{AuthOutcome, CredentialPayload, FederatedAuthNClient, RequestContext};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::{DEFAULT_STRATEGY_NAME, FederatedAuthNConfig};
use crate::context::HostContext;
use crate::domain::{IdentityVerifier, Service};
use crate::infra::firebase::FirebaseBackendFactory;

/// Name under which the strategy reads `modules.<name>.config`.
pub const MODULE_NAME: &str = "federated-authn";

/// Lifecycle hooks the host drives.
#[async_trait]
pub trait StrategyLifecycle: Send + Sync {
    /// Strategy name recorded on authentication methods.
    fn name(&self) -> &str;

    /// Resolve collaborators and configuration, and initialize the verifier.
    ///
    /// # Errors
    ///
    /// Any error is fatal: the host must refuse to start.
    async fn init(&self, ctx: &HostContext) -> anyhow::Result<()>;

    /// Release the verifier client. Safe to call repeatedly or before `init`.
    async fn destroy(&self);
}

/// Federation strategy: verify an external ID token, then match or
/// provision the local user.
///
/// Several strategies may share one [`IdentityVerifier`] via
/// [`FederatedAuthNStrategy::with_verifier`]; the verifier creates its client
/// once no matter how many of them initialize, and keeps it until the last of
/// them is destroyed.
#[derive(Default)]
pub struct FederatedAuthNStrategy {
    verifier: OnceLock<Arc<IdentityVerifier>>,
    service: OnceLock<Arc<Service>>,
    /// Whether this strategy currently counts as a holder of the verifier.
    holds_verifier: Mutex<bool>,
}

impl FederatedAuthNStrategy {
    /// Strategy that builds a Firebase verifier from its configuration at init.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy that uses a caller-supplied verifier.
    #[must_use]
    pub fn with_verifier(verifier: Arc<IdentityVerifier>) -> Self {
        Self {
            verifier: OnceLock::from(verifier),
            service: OnceLock::new(),
            holds_verifier: Mutex::new(false),
        }
    }

    /// JSON Schema of the credential payload this strategy accepts.
    #[must_use]
    pub fn input_schema() -> schemars::Schema {
        schemars::schema_for!(CredentialPayload)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.service.get().is_some()
            && *self.holds_verifier.lock()
            && self
                .verifier
                .get()
                .is_some_and(|verifier| verifier.is_initialized())
    }

    fn verifier_for(&self, cfg: &FederatedAuthNConfig) -> Arc<IdentityVerifier> {
        Arc::clone(self.verifier.get_or_init(|| {
            Arc::new(IdentityVerifier::new(Arc::new(FirebaseBackendFactory::new(
                cfg.http_timeout(),
                cfg.key_refresh_interval(),
            ))))
        }))
    }
}

#[async_trait]
impl StrategyLifecycle for FederatedAuthNStrategy {
    fn name(&self) -> &str {
        self.service
            .get()
            .map_or(DEFAULT_STRATEGY_NAME, |service| service.strategy_name())
    }

    async fn init(&self, ctx: &HostContext) -> anyhow::Result<()> {
        info!(module = ctx.module_name(), "Initializing federated authn strategy");

        let cfg: FederatedAuthNConfig = ctx.config()?;
        cfg.validate()
            .with_context(|| format!("invalid configuration for '{}'", ctx.module_name()))?;
        let directory = ctx.directory()?;
        let source = cfg.credentials.resolve()?;

        info!(
            strategy = %cfg.strategy_name,
            allow_new_user_registration = cfg.allow_new_user_registration,
            key_refresh_secs = cfg.key_refresh_secs,
            "Loaded strategy configuration"
        );

        let verifier = self.verifier_for(&cfg);
        {
            let mut held = self.holds_verifier.lock();
            if !*held {
                verifier
                    .initialize(&source)
                    .context("failed to initialize identity verifier")?;
                *held = true;
            }
        }

        if self.service.get().is_some() {
            debug!("Strategy already initialized, keeping existing service");
            return Ok(());
        }
        let service = Arc::new(Service::new(
            cfg.strategy_name.clone(),
            cfg.allow_new_user_registration,
            verifier,
            directory,
        ));
        if self.service.set(service).is_err() {
            debug!("Concurrent init already installed the service");
            return Ok(());
        }

        info!(strategy = %cfg.strategy_name, "Federated authn strategy initialized");
        Ok(())
    }

    async fn destroy(&self) {
        let Some(verifier) = self.verifier.get() else {
            return;
        };
        {
            let mut held = self.holds_verifier.lock();
            if !*held {
                return;
            }
            *held = false;
            if !verifier.teardown() {
                debug!(strategy = self.name(), "Verifier still held by other strategies");
            }
        }
        info!(strategy = self.name(), "Federated authn strategy destroyed");
    }
}

#[async_trait]
impl FederatedAuthNClient for FederatedAuthNStrategy {
    async fn authenticate(&self, ctx: &RequestContext, payload: &CredentialPayload) -> AuthOutcome {
        let service = self.service.get().filter(|_| *self.holds_verifier.lock());
        let Some(service) = service else {
            error!(
                request_id = %ctx.request_id(),
                "Authentication attempted before the strategy was initialized"
            );
            return AuthOutcome::SystemError("strategy is not initialized".to_owned());
        };
        service.authenticate(ctx, payload).await
    }
}
