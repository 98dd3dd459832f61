//! Firebase ID token verification backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use federated_authn_sdk::{
    CredentialSource, VerificationBackend, VerificationBackendFactory, VerifierError,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::credentials::{FirebaseProject, resolve_project};
use super::jwks::JwksCache;

/// Longest `sub` Firebase issues.
const MAX_SUBJECT_LEN: usize = 128;

/// Clock skew tolerated on `exp` and `iat`.
const LEEWAY_SECS: u64 = 60;

/// Builds [`FirebaseTokenBackend`]s. Construction does no network I/O; signing
/// keys are fetched on first verification.
pub struct FirebaseBackendFactory {
    http_timeout: Duration,
    key_refresh: Duration,
}

impl FirebaseBackendFactory {
    #[must_use]
    pub fn new(http_timeout: Duration, key_refresh: Duration) -> Self {
        Self {
            http_timeout,
            key_refresh,
        }
    }
}

impl VerificationBackendFactory for FirebaseBackendFactory {
    fn connect(
        &self,
        source: &CredentialSource,
    ) -> Result<Arc<dyn VerificationBackend>, VerifierError> {
        let project = resolve_project(source)?;
        let http = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| {
                VerifierError::ProviderUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        info!(
            project_id = %project.project_id,
            jwks_url = %project.jwks_url,
            "Firebase token backend ready"
        );
        Ok(Arc::new(FirebaseTokenBackend::new(
            &project,
            JwksCache::new(project.jwks_url.clone(), http, self.key_refresh),
        )))
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    iat: i64,
}

/// Verifies RS256 ID tokens issued for one Firebase project.
pub struct FirebaseTokenBackend {
    project_id: String,
    issuer: String,
    keys: JwksCache,
}

impl FirebaseTokenBackend {
    #[must_use]
    pub fn new(project: &FirebaseProject, keys: JwksCache) -> Self {
        Self {
            project_id: project.project_id.clone(),
            issuer: project.issuer(),
            keys,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.project_id]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);
        validation
    }
}

fn invalid(msg: impl Into<String>) -> VerifierError {
    VerifierError::InvalidToken(msg.into())
}

fn map_jwt_error(err: &jsonwebtoken::errors::Error) -> VerifierError {
    match err.kind() {
        ErrorKind::ExpiredSignature => invalid("token has expired"),
        ErrorKind::InvalidSignature => invalid("token signature is invalid"),
        ErrorKind::InvalidAudience => invalid("token audience does not match the project"),
        ErrorKind::InvalidIssuer => invalid("token issuer does not match the project"),
        ErrorKind::ImmatureSignature => invalid("token is not yet valid"),
        ErrorKind::MissingRequiredClaim(claim) => invalid(format!("token is missing '{claim}'")),
        _ => invalid(format!("malformed token: {err}")),
    }
}

#[async_trait]
impl VerificationBackend for FirebaseTokenBackend {
    async fn verify_token(&self, token: &str) -> Result<String, VerifierError> {
        let header = decode_header(token).map_err(|e| map_jwt_error(&e))?;
        if header.alg != Algorithm::RS256 {
            return Err(invalid("token is not signed with RS256"));
        }
        let kid = header
            .kid
            .ok_or_else(|| invalid("token header has no 'kid'"))?;

        let key = self.keys.get_key(&kid).await?;
        let data = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| map_jwt_error(&e))?;
        let claims = data.claims;

        let latest_iat = OffsetDateTime::now_utc().unix_timestamp() + LEEWAY_SECS.cast_signed();
        if claims.iat > latest_iat {
            return Err(invalid("token was issued in the future"));
        }
        if claims.sub.is_empty() {
            return Err(invalid("token has an empty 'sub'"));
        }
        if claims.sub.chars().count() > MAX_SUBJECT_LEN {
            return Err(invalid(format!(
                "token 'sub' is longer than {MAX_SUBJECT_LEN} characters"
            )));
        }

        debug!(kid = %kid, "Firebase ID token verified");
        Ok(claims.sub)
    }
}
