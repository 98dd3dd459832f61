//! Configuration for the federated `AuthN` strategy.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use federated_authn_sdk::CredentialSource;
use secrecy::SecretString;
use serde::Deserialize;

/// Strategy name used when the configuration does not set one.
pub const DEFAULT_STRATEGY_NAME: &str = "firebase";

/// Module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FederatedAuthNConfig {
    /// Name recorded on authentication methods created by this strategy.
    pub strategy_name: String,

    /// Create a local user on first login from an unknown subject.
    pub allow_new_user_registration: bool,

    /// Where the verifier gets its credentials from.
    pub credentials: CredentialSourceConfig,

    /// How long fetched signing keys are trusted before a refresh.
    pub key_refresh_secs: u64,

    /// Timeout for signing-key fetches.
    pub http_timeout_secs: u64,
}

impl Default for FederatedAuthNConfig {
    fn default() -> Self {
        Self {
            strategy_name: DEFAULT_STRATEGY_NAME.to_owned(),
            allow_new_user_registration: false,
            credentials: CredentialSourceConfig::default(),
            key_refresh_secs: 3600,
            http_timeout_secs: 10,
        }
    }
}

impl FederatedAuthNConfig {
    #[must_use]
    pub fn key_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.key_refresh_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy name is blank or the HTTP timeout is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.strategy_name.trim().is_empty() {
            bail!("strategy_name must not be empty");
        }
        if self.http_timeout_secs == 0 {
            bail!("http_timeout_secs must be greater than zero");
        }
        if self.key_refresh_secs == 0 {
            bail!("key_refresh_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Credential source as written in configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CredentialSourceConfig {
    /// Service-account key, inline or from a file.
    Explicit {
        /// Service-account JSON.
        #[serde(default)]
        key_material: Option<SecretString>,
        /// Path to a service-account JSON file.
        #[serde(default)]
        key_file: Option<PathBuf>,
        /// Alternate signing-key endpoint.
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// Discover credentials from the environment.
    #[default]
    Ambient,
}

impl CredentialSourceConfig {
    /// Resolve into the SDK credential source, reading key files if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if explicit mode names neither or both of
    /// `key_material` and `key_file`, or the key file cannot be read.
    pub fn resolve(&self) -> anyhow::Result<CredentialSource> {
        match self {
            Self::Ambient => Ok(CredentialSource::Ambient),
            Self::Explicit {
                key_material,
                key_file,
                endpoint,
            } => {
                let key_material = match (key_material, key_file) {
                    (Some(material), None) => material.clone(),
                    (None, Some(path)) => std::fs::read_to_string(path)
                        .with_context(|| {
                            format!("failed to read service account key {}", path.display())
                        })?
                        .into(),
                    (None, None) => {
                        bail!("explicit credentials require `key_material` or `key_file`")
                    }
                    (Some(_), Some(_)) => {
                        bail!("`key_material` and `key_file` are mutually exclusive")
                    }
                };
                Ok(CredentialSource::Explicit {
                    key_material,
                    endpoint: endpoint.clone(),
                })
            }
        }
    }
}
