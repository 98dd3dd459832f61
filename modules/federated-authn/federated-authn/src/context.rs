//! Host context handed to the strategy at init.
//!
//! Carries the host configuration and the collaborators the host wires in.
//! Configuration is layered with `figment`: a YAML file, then environment
//! variables prefixed with `APP__` (`__` separates nesting levels), e.g.
//! `APP__MODULES__FEDERATED-AUTHN__CONFIG__ALLOW_NEW_USER_REGISTRATION=true`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use federated_authn_sdk::UserDirectory;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Environment prefix for configuration overrides.
pub const ENV_PREFIX: &str = "APP__";

/// Source of per-module configuration.
pub trait ConfigProvider: Send + Sync {
    /// Raw configuration entry for `module` (the object holding `config`).
    fn get_module_config(&self, module: &str) -> Option<&serde_json::Value>;
}

#[derive(Debug, Default, Deserialize)]
struct HostConfig {
    #[serde(default)]
    modules: HashMap<String, serde_json::Value>,
}

/// Module configuration loaded from YAML plus environment overrides.
#[derive(Debug, Default)]
pub struct FigmentConfigProvider {
    modules: HashMap<String, serde_json::Value>,
}

impl FigmentConfigProvider {
    /// Load `path` and apply `APP__` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not valid YAML, or does not
    /// match the expected layout.
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        // figment silently skips missing files
        if !path.is_file() {
            bail!("configuration file {} does not exist", path.display());
        }
        Self::extract(Figment::new().merge(Yaml::file(path)))
            .with_context(|| format!("failed to load configuration from {}", path.display()))
    }

    /// Parse `yaml` and apply `APP__` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML or does not match the
    /// expected layout.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Self::extract(Figment::new().merge(Yaml::string(yaml)))
            .context("failed to parse configuration")
    }

    fn extract(figment: Figment) -> anyhow::Result<Self> {
        let host: HostConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(Self {
            modules: host.modules,
        })
    }
}

impl ConfigProvider for FigmentConfigProvider {
    fn get_module_config(&self, module: &str) -> Option<&serde_json::Value> {
        self.modules.get(module)
    }
}

/// What the host provides to a strategy during init.
#[derive(Clone)]
pub struct HostContext {
    module_name: String,
    config: Arc<dyn ConfigProvider>,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl HostContext {
    #[must_use]
    pub fn builder(module_name: impl Into<String>) -> HostContextBuilder {
        HostContextBuilder {
            module_name: module_name.into(),
            config: None,
            directory: None,
        }
    }

    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Deserialize this module's `config` section.
    ///
    /// A missing module entry or `config` key yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but does not deserialize into `T`.
    pub fn config<T: DeserializeOwned + Default>(&self) -> anyhow::Result<T> {
        let Some(section) = self
            .config
            .get_module_config(&self.module_name)
            .and_then(|entry| entry.get("config"))
        else {
            return Ok(T::default());
        };
        serde_json::from_value(section.clone())
            .with_context(|| format!("invalid configuration for module '{}'", self.module_name))
    }

    /// The user directory the host registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the host did not provide one.
    pub fn directory(&self) -> anyhow::Result<Arc<dyn UserDirectory>> {
        self.directory.clone().ok_or_else(|| {
            anyhow!(
                "no user directory registered for module '{}'",
                self.module_name
            )
        })
    }
}

pub struct HostContextBuilder {
    module_name: String,
    config: Option<Arc<dyn ConfigProvider>>,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl HostContextBuilder {
    #[must_use]
    pub fn config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn build(self) -> HostContext {
        HostContext {
            module_name: self.module_name,
            config: self
                .config
                .unwrap_or_else(|| Arc::new(FigmentConfigProvider::default())),
            directory: self.directory,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::FederatedAuthNConfig;

    const YAML: &str = r"
modules:
  federated-authn:
    config:
      strategy_name: google
      allow_new_user_registration: false
      key_refresh_secs: 600
";

    #[test]
    fn reads_module_section_from_yaml() {
        temp_env::with_vars_unset(
            ["APP__MODULES__FEDERATED-AUTHN__CONFIG__ALLOW_NEW_USER_REGISTRATION"],
            || {
                let provider = FigmentConfigProvider::from_yaml_str(YAML).unwrap();
                let ctx = HostContext::builder("federated-authn")
                    .config(Arc::new(provider))
                    .build();

                let cfg: FederatedAuthNConfig = ctx.config().unwrap();
                assert_eq!(cfg.strategy_name, "google");
                assert_eq!(cfg.key_refresh_secs, 600);
                assert_eq!(cfg.http_timeout_secs, 10);
                assert!(!cfg.allow_new_user_registration);
            },
        );
    }

    #[test]
    fn environment_overrides_yaml() {
        temp_env::with_var(
            "APP__MODULES__FEDERATED-AUTHN__CONFIG__ALLOW_NEW_USER_REGISTRATION",
            Some("true"),
            || {
                let provider = FigmentConfigProvider::from_yaml_str(YAML).unwrap();
                let ctx = HostContext::builder("federated-authn")
                    .config(Arc::new(provider))
                    .build();

                let cfg: FederatedAuthNConfig = ctx.config().unwrap();
                assert!(cfg.allow_new_user_registration);
                assert_eq!(cfg.strategy_name, "google");
            },
        );
    }

    #[test]
    fn reads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let provider = FigmentConfigProvider::from_yaml_file(file.path()).unwrap();
        assert!(provider.get_module_config("federated-authn").is_some());
        assert!(provider.get_module_config("other").is_none());
    }

    #[test]
    fn missing_yaml_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FigmentConfigProvider::from_yaml_file(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn missing_section_yields_defaults() {
        let ctx = HostContext::builder("federated-authn").build();
        let cfg: FederatedAuthNConfig = ctx.config().unwrap();
        assert_eq!(cfg.strategy_name, "firebase");
        assert!(ctx.directory().is_err());
    }

    #[test]
    fn malformed_section_is_an_error() {
        let provider = FigmentConfigProvider::from_yaml_str(
            "modules:\n  federated-authn:\n    config:\n      key_refresh_secs: soon\n",
        )
        .unwrap();
        let ctx = HostContext::builder("federated-authn")
            .config(Arc::new(provider))
            .build();

        assert!(ctx.config::<FederatedAuthNConfig>().is_err());
    }
}
