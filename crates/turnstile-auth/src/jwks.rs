//! Signing key sets and JWT verification.
//!
//! [`JwksCache`] is shared by every token-based strategy. Fresh key sets are
//! served from a read lock; refreshes for the same URL are serialized so a
//! burst of requests triggers a single fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use turnstile_core::JwksConfig;

use crate::error::AuthError;

/// Signature algorithms accepted on identity tokens. Symmetric algorithms
/// are never accepted.
pub const ALLOWED_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Source of key sets.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetches the key set published at `url`.
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError>;
}

/// Fetches key sets over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    http: reqwest::Client,
}

impl HttpJwksFetcher {
    /// Creates a fetcher over an existing client.
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError> {
        let unavailable = |reason: String| AuthError::KeySetUnavailable {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP status {}", response.status().as_u16())));
        }
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| unavailable(e.to_string()))
    }
}

struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Key sets keyed by URL.
pub struct JwksCache {
    fetcher: Arc<dyn JwksFetcher>,
    entries: RwLock<HashMap<String, CachedKeySet>>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    refresh_interval: Duration,
    min_refresh_interval: Duration,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("urls", &self.entries.read().keys().cloned().collect::<Vec<_>>())
            .field("refresh_interval", &self.refresh_interval)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    /// Creates a cache with the given refresh policy.
    #[must_use]
    pub fn new(fetcher: Arc<dyn JwksFetcher>, config: &JwksConfig) -> Self {
        Self {
            fetcher,
            entries: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            refresh_interval: config.refresh_interval(),
            min_refresh_interval: config.min_refresh_interval(),
        }
    }

    /// Returns the key set for `url`, fetching it if missing or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch is needed and fails.
    pub async fn get(&self, url: &str) -> Result<Arc<JwkSet>, AuthError> {
        let interval = self.refresh_interval;
        if let Some(keys) = self.cached(url, |entry| entry.fetched_at.elapsed() < interval) {
            return Ok(keys);
        }
        self.refresh_if(url, |entry| entry.fetched_at.elapsed() >= interval)
            .await
    }

    /// Returns the key for `kid`. An unknown key id forces one refresh,
    /// unless the key set was fetched within the minimum refresh interval.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if no key matches after any refresh.
    pub async fn key(&self, url: &str, kid: Option<&str>) -> Result<Jwk, AuthError> {
        let keys = self.get(url).await?;
        if let Some(jwk) = select_key(&keys, kid) {
            return Ok(jwk.clone());
        }

        let Some(kid) = kid else {
            return Err(AuthError::KeyNotFound {
                kid: String::new(),
            });
        };

        let min = self.min_refresh_interval;
        let keys = self
            .refresh_if(url, |entry| {
                entry.keys.find(kid).is_none() && entry.fetched_at.elapsed() >= min
            })
            .await?;
        select_key(&keys, Some(kid))
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound {
                kid: kid.to_string(),
            })
    }

    fn cached(&self, url: &str, usable: impl Fn(&CachedKeySet) -> bool) -> Option<Arc<JwkSet>> {
        self.entries
            .read()
            .get(url)
            .filter(|entry| usable(*entry))
            .map(|entry| Arc::clone(&entry.keys))
    }

    /// Fetches `url` unless another caller already replaced the entry with
    /// one that `stale` no longer flags.
    async fn refresh_if(
        &self,
        url: &str,
        stale: impl Fn(&CachedKeySet) -> bool,
    ) -> Result<Arc<JwkSet>, AuthError> {
        let lock = Arc::clone(
            self.refresh_locks
                .lock()
                .entry(url.to_string())
                .or_default(),
        );
        let _guard = lock.lock().await;

        if let Some(keys) = self.cached(url, |entry| !stale(entry)) {
            return Ok(keys);
        }

        tracing::debug!(url, "fetching key set");
        let keys = Arc::new(self.fetcher.fetch(url).await?);
        self.entries.write().insert(
            url.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    }
}

/// What a token must satisfy to be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExpectations {
    /// Key set URL.
    pub jwks_url: String,
    /// Required `iss` claim.
    pub issuer: String,
    /// Required `aud` claim.
    pub audience: String,
}

/// Verifies identity tokens against cached key sets.
#[derive(Debug, Clone)]
pub struct JwtVerifier {
    cache: Arc<JwksCache>,
}

impl JwtVerifier {
    /// Creates a verifier over a shared cache.
    #[must_use]
    pub const fn new(cache: Arc<JwksCache>) -> Self {
        Self { cache }
    }

    /// Verifies the signature, expiry, issuer and audience of `token` and
    /// returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for disallowed algorithms or
    /// failed validation, [`AuthError::KeyNotFound`] when no key matches,
    /// and [`AuthError::KeySetUnavailable`] when keys cannot be fetched.
    pub async fn verify<C: DeserializeOwned>(
        &self,
        token: &str,
        expect: &TokenExpectations,
    ) -> Result<C, AuthError> {
        let header = jsonwebtoken::decode_header(token)?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::InvalidToken {
                reason: format!("algorithm {:?} is not allowed", header.alg),
            });
        }

        let jwk = self
            .cache
            .key(&expect.jwks_url, header.kid.as_deref())
            .await?;
        let key = DecodingKey::from_jwk(&jwk)?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[expect.issuer.as_str()]);
        validation.set_audience(&[expect.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Ok(jsonwebtoken::decode::<C>(token, &key, &validation)?.claims)
    }
}
