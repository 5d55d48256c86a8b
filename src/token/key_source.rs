//! Public-key retrieval and caching.
//!
//! A [`KeySource`] hands out the current `kid -> public key` map. The two network-backed sources
//! cache fetched keys per instance: [`UrlKeySource`] honors the `Cache-Control: max-age` of the
//! key endpoint, [`JwksKeySource`] uses a fixed TTL. A refresh builds the replacement key set
//! completely before swapping it into the cache, so concurrent readers either see the old
//! complete map or the new one, never a partial map. Concurrent refreshes are not de-duplicated;
//! the cache stays correct either way.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use url::Url;

use super::VerificationError;

/// How long JWKS responses are trusted. JWKS endpoints are not assumed to publish cache headers
/// worth honoring.
const JWKS_CACHE_TTL_SECONDS: i64 = 6 * 60 * 60;

/// An immutable set of public keys indexed by key id.
#[derive(Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    /// Create an empty key set.
    pub fn new() -> Self {
        KeySet::default()
    }

    /// Add a key under `kid`.
    pub fn insert(&mut self, kid: impl Into<String>, key: DecodingKey) {
        self.keys.insert(kid.into(), key);
    }

    /// Look up a key by id.
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    /// Iterate over all keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DecodingKey)> {
        self.keys.iter().map(|(kid, key)| (kid.as_str(), key))
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Return `true` if the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Build a key set from a `kid -> PEM` map as served by a certificate endpoint.
    fn from_pem_map(pems: HashMap<String, String>) -> Result<KeySet, VerificationError> {
        let mut set = KeySet::new();
        for (kid, pem) in pems {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .or_else(|_| DecodingKey::from_ec_pem(pem.as_bytes()))
                .map_err(|err| {
                    VerificationError::KeyFetch(format!(
                        "response contains an unusable public key for kid \"{kid}\": {err}"
                    ))
                })?;
            set.insert(kid, key);
        }
        Ok(set)
    }
}

// DecodingKey is not Debug, so print the kids only. Key material never belongs in logs anyway.
impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("KeySet").field("kids", &kids).finish()
    }
}

/// A source of public keys for signature verification.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Return the current key set, fetching or refreshing it if needed.
    async fn fetch_keys(&self) -> Result<Arc<KeySet>, VerificationError>;
}

struct CachedKeys {
    keys: Arc<KeySet>,
    expires_at: DateTime<Utc>,
}

/// Cache slot shared by the network-backed sources. Written only on refresh completion.
type KeyCache = RwLock<Option<CachedKeys>>;

fn cached_keys(cache: &KeyCache) -> Option<Arc<KeySet>> {
    let cache = cache
        .read()
        .expect("thread holding key cache lock should not panic");
    let cached = cache.as_ref()?;
    if Utc::now() < cached.expires_at {
        log::trace!(target: "gatekit", "serving public keys from cache");
        Some(cached.keys.clone())
    } else {
        None
    }
}

fn store_keys(cache: &KeyCache, keys: Arc<KeySet>, expires_at: DateTime<Utc>) {
    let mut cache = cache
        .write()
        .expect("thread holding key cache lock should not panic");
    *cache = Some(CachedKeys { keys, expires_at });
}

/// Key source polling a URL that serves a JSON `kid -> PEM public key` map.
///
/// The response's `Cache-Control: max-age` directive drives the cache TTL; without it the keys
/// are considered immediately stale and every lookup refetches.
pub struct UrlKeySource {
    url: Url,
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
    cache: KeyCache,
}

impl UrlKeySource {
    /// Create a source polling `url`.
    pub fn new(url: impl AsRef<str>) -> crate::Result<Self> {
        Self::with_client(url, reqwest::Client::new())
    }

    /// Create a source with a caller-configured HTTP client (proxy, timeouts, TLS options).
    pub fn with_client(url: impl AsRef<str>, client: reqwest::Client) -> crate::Result<Self> {
        let url = Url::parse(url.as_ref()).map_err(crate::Error::InvalidKeySourceUrl)?;
        Ok(UrlKeySource {
            url,
            client,
            cache: RwLock::new(None),
        })
    }

    async fn refresh(&self) -> Result<Arc<KeySet>, VerificationError> {
        log::debug!(target: "gatekit", url = self.url.as_str(); "fetching public keys");
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| VerificationError::KeyFetch(err.without_url().to_string()))?;

        let max_age = max_age_seconds(response.headers());
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| VerificationError::KeyFetch(err.without_url().to_string()))?;

        let json: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            VerificationError::KeyFetch(format!(
                "response is not JSON (HTTP {status}): {}",
                body_snippet(&body)
            ))
        })?;

        // An error member marks a failure regardless of the HTTP status.
        if let Some(error) = json.get("error") {
            let detail = match json.get("error_description") {
                Some(description) => format!("{error} ({description})"),
                None => error.to_string(),
            };
            return Err(VerificationError::KeyFetch(detail));
        }
        if !status.is_success() {
            return Err(VerificationError::KeyFetch(format!("HTTP {status}: {body}")));
        }

        let pems: HashMap<String, String> = serde_json::from_value(json).map_err(|_| {
            VerificationError::KeyFetch(
                "response is not a map of key ids to PEM public keys".to_owned(),
            )
        })?;
        let keys = Arc::new(KeySet::from_pem_map(pems)?);

        let now = Utc::now();
        let expires_at = match max_age {
            Some(seconds) => now + Duration::seconds(seconds),
            // No cache directive: serve this result but treat it as already stale.
            None => now,
        };
        log::debug!(target: "gatekit",
            count = keys.len(),
            max_age:debug = max_age;
            "fetched public keys");
        store_keys(&self.cache, keys.clone(), expires_at);
        Ok(keys)
    }
}

#[async_trait]
impl KeySource for UrlKeySource {
    async fn fetch_keys(&self) -> Result<Arc<KeySet>, VerificationError> {
        if let Some(keys) = cached_keys(&self.cache) {
            return Ok(keys);
        }
        self.refresh().await
    }
}

impl fmt::Debug for UrlKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlKeySource")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// Cap of the raw response body echoed into fetch-error messages.
const BODY_SNIPPET_MAX_CHARS: usize = 256;

fn body_snippet(body: &str) -> String {
    if body.chars().count() <= BODY_SNIPPET_MAX_CHARS {
        body.to_owned()
    } else {
        let truncated: String = body.chars().take(BODY_SNIPPET_MAX_CHARS).collect();
        format!("{truncated}...")
    }
}

/// Parse the `max-age` directive out of a `Cache-Control` header, if any.
fn max_age_seconds(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    let cache_control = headers.get(CACHE_CONTROL)?.to_str().ok()?;
    cache_control.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")?
            .parse::<i64>()
            .ok()
    })
}

/// Key source resolving keys from a standard JWKS document, cached for a fixed six hours.
pub struct JwksKeySource {
    url: Url,
    client: reqwest::Client,
    cache: KeyCache,
}

impl JwksKeySource {
    /// Create a source reading the JWKS document at `url`.
    pub fn new(url: impl AsRef<str>) -> crate::Result<Self> {
        Self::with_client(url, reqwest::Client::new())
    }

    /// Create a source with a caller-configured HTTP client.
    pub fn with_client(url: impl AsRef<str>, client: reqwest::Client) -> crate::Result<Self> {
        let url = Url::parse(url.as_ref()).map_err(crate::Error::InvalidKeySourceUrl)?;
        Ok(JwksKeySource {
            url,
            client,
            cache: RwLock::new(None),
        })
    }

    async fn refresh(&self) -> Result<Arc<KeySet>, VerificationError> {
        log::debug!(target: "gatekit", url = self.url.as_str(); "fetching JWKS document");
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| VerificationError::KeyFetch(err.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(VerificationError::KeyFetch(format!("HTTP {status}")));
        }
        let jwks: JwkSet = response.json().await.map_err(|_| {
            VerificationError::KeyFetch("response is not a valid JWKS document".to_owned())
        })?;

        let mut set = KeySet::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                log::warn!(target: "gatekit", "skipping JWKS key without a kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => set.insert(kid, key),
                Err(err) => {
                    log::warn!(target: "gatekit",
                        kid = kid.as_str(),
                        error:display = err;
                        "skipping unusable JWKS key");
                }
            }
        }
        if set.is_empty() {
            return Err(VerificationError::KeyFetch(
                "JWKS document contains no usable keys".to_owned(),
            ));
        }

        let keys = Arc::new(set);
        store_keys(
            &self.cache,
            keys.clone(),
            Utc::now() + Duration::seconds(JWKS_CACHE_TTL_SECONDS),
        );
        Ok(keys)
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    async fn fetch_keys(&self) -> Result<Arc<KeySet>, VerificationError> {
        if let Some(keys) = cached_keys(&self.cache) {
            return Ok(keys);
        }
        self.refresh().await
    }
}

impl fmt::Debug for JwksKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksKeySource")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// Key source serving a fixed in-memory key set. For tests and emulator wiring.
#[derive(Debug)]
pub struct StaticKeySource {
    keys: Arc<KeySet>,
}

impl StaticKeySource {
    /// Create a source serving `keys`.
    pub fn new(keys: KeySet) -> Self {
        StaticKeySource {
            keys: Arc::new(keys),
        }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch_keys(&self) -> Result<Arc<KeySet>, VerificationError> {
        Ok(self.keys.clone())
    }
}
