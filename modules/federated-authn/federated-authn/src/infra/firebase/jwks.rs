//! Signing-key fetching and caching.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use federated_authn_sdk::VerifierError;
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

/// Minimum age of the cached key set before an unknown `kid` may trigger a
/// refetch. Bounds how often bogus tokens can make us hit the endpoint.
const UNKNOWN_KID_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Default)]
struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

enum Lookup {
    Hit(DecodingKey),
    /// Fresh set without this `kid`, fetched too recently to refetch.
    Unknown,
    Refresh,
}

/// RSA signing keys by `kid`, fetched lazily and refreshed on expiry or on
/// an unknown `kid`.
pub struct JwksCache {
    url: String,
    http: reqwest::Client,
    refresh_interval: Duration,
    keys: RwLock<KeySet>,
    /// Serializes refetches so concurrent misses share one request.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl JwksCache {
    #[must_use]
    pub fn new(url: String, http: reqwest::Client, refresh_interval: Duration) -> Self {
        Self {
            url,
            http,
            refresh_interval,
            keys: RwLock::new(KeySet::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn lookup(&self, kid: &str) -> Lookup {
        let set = self.keys.read();
        let Some(fetched_at) = set.fetched_at else {
            return Lookup::Refresh;
        };
        let age = fetched_at.elapsed();
        if age >= self.refresh_interval {
            return Lookup::Refresh;
        }
        match set.keys.get(kid) {
            Some(key) => Lookup::Hit(key.clone()),
            None if age >= UNKNOWN_KID_COOLDOWN => Lookup::Refresh,
            None => Lookup::Unknown,
        }
    }

    /// Get the decoding key for `kid`, refetching the key set if needed.
    ///
    /// # Errors
    ///
    /// - `ProviderUnavailable` if a needed refetch fails
    /// - `InvalidToken` if `kid` is not in the current key set
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey, VerifierError> {
        match self.lookup(kid) {
            Lookup::Hit(key) => return Ok(key),
            Lookup::Unknown => return Err(unknown_kid(kid)),
            Lookup::Refresh => {}
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited
        match self.lookup(kid) {
            Lookup::Hit(key) => return Ok(key),
            Lookup::Unknown => return Err(unknown_kid(kid)),
            Lookup::Refresh => {}
        }

        debug!(kid, "Signing key missing or stale, refreshing");
        self.refresh().await?;

        self.keys
            .read()
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| unknown_kid(kid))
    }

    /// Fetch the key set and replace the cache.
    ///
    /// # Errors
    ///
    /// `ProviderUnavailable` if the endpoint is unreachable, answers with a
    /// non-success status, or returns no usable RSA signing key.
    pub async fn refresh(&self) -> Result<(), VerifierError> {
        debug!(url = %self.url, "Fetching signing keys");

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| unavailable(format!("failed to fetch signing keys: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!(
                "signing key endpoint returned status {status}"
            )));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| unavailable(format!("failed to parse signing keys: {e}")))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if jwk.key_use.as_deref() == Some("enc") {
                continue;
            }
            match to_decoding_key(&jwk) {
                Ok((kid, key)) => {
                    keys.insert(kid, key);
                }
                Err(reason) => {
                    warn!(kid = ?jwk.kid, kty = %jwk.kty, %reason, "Skipping unusable signing key");
                }
            }
        }

        if keys.is_empty() {
            return Err(unavailable("no usable signing keys in key set"));
        }

        let count = keys.len();
        *self.keys.write() = KeySet {
            keys,
            fetched_at: Some(Instant::now()),
        };
        debug!(url = %self.url, key_count = count, "Signing keys refreshed");
        Ok(())
    }
}

fn to_decoding_key(jwk: &Jwk) -> Result<(String, DecodingKey), String> {
    if jwk.kty != "RSA" {
        return Err(format!("unsupported key type {}", jwk.kty));
    }
    let kid = jwk.kid.clone().ok_or("key has no kid")?;
    let n = jwk.n.as_deref().ok_or("RSA key missing 'n'")?;
    let e = jwk.e.as_deref().ok_or("RSA key missing 'e'")?;
    let key = DecodingKey::from_rsa_components(n, e).map_err(|e| e.to_string())?;
    Ok((kid, key))
}

fn unknown_kid(kid: &str) -> VerifierError {
    VerifierError::InvalidToken(format!("no signing key with kid '{kid}'"))
}

fn unavailable(msg: impl Into<String>) -> VerifierError {
    VerifierError::ProviderUnavailable(msg.into())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const MODULUS: &str = include_str!("../../../tests/fixtures/rsa_modulus.txt");

    fn cache(server: &MockServer, refresh: Duration) -> JwksCache {
        JwksCache::new(server.url("/jwks"), reqwest::Client::new(), refresh)
    }

    #[tokio::test]
    async fn fetches_once_and_serves_from_cache() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(200).json_body(json!({
                    "keys": [
                        {"kty": "RSA", "kid": "k1", "use": "sig", "alg": "RS256", "n": MODULUS, "e": "AQAB"},
                        {"kty": "EC", "kid": "k2", "crv": "P-256", "x": "AA", "y": "AA"}
                    ]
                }));
            })
            .await;

        let cache = cache(&server, Duration::from_secs(3600));
        cache.get_key("k1").await.unwrap();
        cache.get_key("k1").await.unwrap();

        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn unknown_kid_within_cooldown_is_invalid_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(200).json_body(json!({
                    "keys": [{"kty": "RSA", "kid": "k1", "n": MODULUS, "e": "AQAB"}]
                }));
            })
            .await;

        let cache = cache(&server, Duration::from_secs(3600));
        let err = cache.get_key("rotated-away").await.err().unwrap();
        assert!(matches!(err, VerifierError::InvalidToken(_)));

        let err = cache.get_key("rotated-away").await.err().unwrap();
        assert!(matches!(err, VerifierError::InvalidToken(_)));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn expired_set_is_refetched() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(200).json_body(json!({
                    "keys": [{"kty": "RSA", "kid": "k1", "n": MODULUS, "e": "AQAB"}]
                }));
            })
            .await;

        let cache = cache(&server, Duration::ZERO);
        cache.get_key("k1").await.unwrap();
        cache.get_key("k1").await.unwrap();

        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn endpoint_errors_are_provider_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(503);
            })
            .await;

        let err = cache(&server, Duration::from_secs(60))
            .get_key("k1")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, VerifierError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn key_set_without_rsa_keys_is_provider_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(200)
                    .json_body(json!({"keys": [{"kty": "oct", "kid": "k1"}]}));
            })
            .await;

        let err = cache(&server, Duration::from_secs(60))
            .get_key("k1")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, VerifierError::ProviderUnavailable(_)));
    }
}
