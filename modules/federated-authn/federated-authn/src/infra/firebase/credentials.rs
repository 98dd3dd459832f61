//! Project resolution from explicit or ambient credentials.

use std::path::Path;

use federated_authn_sdk::{CredentialSource, VerifierError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

/// Public signing keys for Firebase ID tokens.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Issuer prefix; the project id is appended.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

pub const ENV_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_GCLOUD_PROJECT: &str = "GCLOUD_PROJECT";

const SERVICE_ACCOUNT: &str = "service_account";
const AUTHORIZED_USER: &str = "authorized_user";

/// Service-account key file contents. Only the fields we check are kept.
#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    private_key: Option<SecretString>,
}

/// Just enough of an application-default credentials file to tell its kind.
#[derive(Deserialize)]
struct AmbientCredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    /// Present on `authorized_user` files written by `gcloud auth application-default login`.
    #[serde(default)]
    quota_project_id: Option<String>,
}

/// Everything the token backend needs to know about the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseProject {
    pub project_id: String,
    /// Set when the project came from a service-account key.
    pub client_email: Option<String>,
    pub jwks_url: String,
}

impl FirebaseProject {
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }
}

fn invalid(msg: impl Into<String>) -> VerifierError {
    VerifierError::InvalidCredentials(msg.into())
}

fn parse_service_account(json: &str) -> Result<ServiceAccountKey, VerifierError> {
    let key: ServiceAccountKey = serde_json::from_str(json)
        .map_err(|e| invalid(format!("service account key is not valid JSON: {e}")))?;

    if key.kind != SERVICE_ACCOUNT {
        return Err(invalid(format!(
            "expected key type 'service_account', got '{}'",
            key.kind
        )));
    }
    if key.project_id.trim().is_empty() {
        return Err(invalid("service account key has no project_id"));
    }
    if key.client_email.trim().is_empty() {
        return Err(invalid("service account key has no client_email"));
    }
    let is_pem = key.private_key.as_ref().is_some_and(|pem| {
        let pem = pem.expose_secret();
        pem.contains("-----BEGIN") && pem.contains("PRIVATE KEY-----")
    });
    if !is_pem {
        return Err(invalid("service account private_key is not a PEM private key"));
    }
    Ok(key)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn project_from_env() -> Option<String> {
    non_empty_env(ENV_CLOUD_PROJECT).or_else(|| non_empty_env(ENV_GCLOUD_PROJECT))
}

/// Resolve the project from a `GOOGLE_APPLICATION_CREDENTIALS` file.
///
/// Service-account keys carry their project. User credentials do not, so the
/// project comes from `quota_project_id` or the project variables.
fn from_credentials_file(path: &Path) -> Result<FirebaseProject, VerifierError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| invalid(format!("failed to read {}: {e}", path.display())))?;
    let file: AmbientCredentialsFile = serde_json::from_str(&json)
        .map_err(|e| invalid(format!("{} is not valid JSON: {e}", path.display())))?;

    match file.kind.as_str() {
        SERVICE_ACCOUNT => {
            let key = parse_service_account(&json)?;
            Ok(FirebaseProject {
                project_id: key.project_id,
                client_email: Some(key.client_email),
                jwks_url: DEFAULT_JWKS_URL.to_owned(),
            })
        }
        AUTHORIZED_USER => {
            let project_id = file
                .quota_project_id
                .filter(|p| !p.trim().is_empty())
                .or_else(project_from_env)
                .ok_or_else(|| {
                    invalid(format!(
                        "user credentials name no project: set quota_project_id, \
                         {ENV_CLOUD_PROJECT} or {ENV_GCLOUD_PROJECT}"
                    ))
                })?;
            Ok(FirebaseProject {
                project_id,
                client_email: None,
                jwks_url: DEFAULT_JWKS_URL.to_owned(),
            })
        }
        other => Err(invalid(format!(
            "unsupported credentials type '{other}' in {}",
            path.display()
        ))),
    }
}

/// Resolve the project a backend should verify tokens for.
///
/// # Errors
///
/// `InvalidCredentials` if the key material is malformed or, in ambient
/// mode, nothing in the environment identifies a project.
pub fn resolve_project(source: &CredentialSource) -> Result<FirebaseProject, VerifierError> {
    match source {
        CredentialSource::Explicit {
            key_material,
            endpoint,
        } => {
            let key = parse_service_account(key_material.expose_secret())?;
            Ok(FirebaseProject {
                project_id: key.project_id,
                client_email: Some(key.client_email),
                jwks_url: endpoint
                    .clone()
                    .unwrap_or_else(|| DEFAULT_JWKS_URL.to_owned()),
            })
        }
        CredentialSource::Ambient => {
            if let Some(path) = non_empty_env(ENV_APPLICATION_CREDENTIALS) {
                debug!(path = %path, "Using application default credentials file");
                return from_credentials_file(Path::new(&path));
            }

            let project_id = project_from_env().ok_or_else(|| {
                invalid(format!(
                    "no ambient credentials: set {ENV_APPLICATION_CREDENTIALS}, \
                     {ENV_CLOUD_PROJECT} or {ENV_GCLOUD_PROJECT}"
                ))
            })?;
            Ok(FirebaseProject {
                project_id,
                client_email: None,
                jwks_url: DEFAULT_JWKS_URL.to_owned(),
            })
        }
    }
}
