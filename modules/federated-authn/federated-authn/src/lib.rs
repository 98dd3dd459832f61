#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Federated `AuthN` Strategy
//!
//! Authenticates callers who present an ID token from an external identity
//! provider. The token is verified, its subject is checked against the
//! subject the caller claims, and the local user for that subject is
//! returned, or provisioned on first login when registration is allowed.
//!
//! Every failure is closed: the caller gets
//! [`AuthOutcome::Rejected`](federated_authn_sdk::AuthOutcome::Rejected) for
//! expected login failures and
//! [`AuthOutcome::SystemError`](federated_authn_sdk::AuthOutcome::SystemError)
//! for faults, never an authenticated user.
//!
//! ## Configuration
//!
//! ```yaml
//! modules:
//!   federated-authn:
//!     config:
//!       strategy_name: firebase
//!       allow_new_user_registration: false
//!       key_refresh_secs: 3600
//!       http_timeout_secs: 10
//!       credentials:
//!         mode: explicit            # or "ambient"
//!         key_file: /etc/app/service-account.json
//! ```

pub mod config;
pub mod context;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::FederatedAuthNConfig;
pub use context::{ConfigProvider, FigmentConfigProvider, HostContext};
pub use domain::IdentityVerifier;
pub use infra::firebase::FirebaseBackendFactory;
pub use infra::storage::{InMemoryUserDirectory, SeaOrmUserDirectory};
pub use module::{FederatedAuthNStrategy, MODULE_NAME, StrategyLifecycle};
