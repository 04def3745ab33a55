//! HTTPS well-known file challenge strategy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use turnstile_core::{
    AdmissionError, AuthGrant, AuthMethod, AuthProof, HttpChallengeConfig, Namespace, Result,
};

use crate::error::AuthError;
use crate::strategy::{unexpected_proof, AuthStrategy};

/// Fetches challenge files.
#[async_trait]
pub trait WellKnownFetcher: Send + Sync {
    /// Returns the body served at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Http`] for transport failures and non-success
    /// responses.
    async fn fetch(&self, url: &str) -> std::result::Result<String, AuthError>;
}

/// Fetcher that refuses plaintext and bounds redirects.
#[derive(Debug, Clone)]
pub struct HttpsFetcher {
    http: reqwest::Client,
}

impl HttpsFetcher {
    /// Builds the fetcher's client from the challenge configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the client cannot be built.
    pub fn from_config(
        config: &HttpChallengeConfig,
        user_agent: &str,
    ) -> std::result::Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .https_only(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout())
            .user_agent(user_agent)
            .build()
            .map_err(|e| AuthError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WellKnownFetcher for HttpsFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, AuthError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::http(url, &e))?;
        if !response.status().is_success() {
            return Err(AuthError::Http {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status().as_u16()),
            });
        }
        response.text().await.map_err(|e| AuthError::http(url, &e))
    }
}

/// Proves control of `com.example` through
/// `https://example.com/.well-known/registry-auth` containing a line
/// `registry-verification=<token>`.
pub struct HttpStrategy {
    fetcher: Arc<dyn WellKnownFetcher>,
    config: HttpChallengeConfig,
    grant_ttl: Duration,
}

impl std::fmt::Debug for HttpStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStrategy")
            .field("config", &self.config)
            .field("grant_ttl", &self.grant_ttl)
            .finish_non_exhaustive()
    }
}

impl HttpStrategy {
    /// Creates the strategy over the given fetcher.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn WellKnownFetcher>,
        config: HttpChallengeConfig,
        grant_ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            config,
            grant_ttl,
        }
    }
}

#[async_trait]
impl AuthStrategy for HttpStrategy {
    fn method(&self) -> &str {
        AuthMethod::Http.as_str()
    }

    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        let AuthProof::Http { token } = proof else {
            return Err(unexpected_proof(self.method(), proof).into());
        };
        if token.trim().is_empty() {
            return Err(AdmissionError::format(
                "HTTP verification token cannot be empty",
            ));
        }

        let domain = namespace.to_domain();
        let url = self.config.challenge_url(&domain);
        let expected = self.config.expected_value(token.trim());

        let fetched = tokio::time::timeout(self.config.timeout(), self.fetcher.fetch(&url))
            .await
            .unwrap_or_else(|_| {
                Err(AuthError::Http {
                    url: url.clone(),
                    reason: "timed out".to_string(),
                })
            });
        let verified = match fetched {
            Ok(body) => body.lines().any(|line| line.trim() == expected),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "challenge fetch failed");
                false
            }
        };
        if !verified {
            return Err(AdmissionError::proof(format!(
                "HTTP verification failed for '{domain}'"
            )));
        }

        Ok(AuthGrant::issue(
            namespace.clone(),
            self.method(),
            domain,
            self.grant_ttl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use turnstile_core::ErrorCategory;

    struct FakeFetcher {
        body: std::result::Result<String, ()>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn serving(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: Ok(body.to_string()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                body: Err(()),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl WellKnownFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<String, AuthError> {
            self.requested.lock().push(url.to_string());
            self.body.clone().map_err(|()| AuthError::Http {
                url: url.to_string(),
                reason: "HTTP status 404".to_string(),
            })
        }
    }

    fn strategy(fetcher: Arc<FakeFetcher>) -> HttpStrategy {
        HttpStrategy::new(
            fetcher,
            HttpChallengeConfig::default(),
            Duration::from_secs(300),
        )
    }

    fn proof() -> AuthProof {
        AuthProof::Http {
            token: "abc123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_matching_line() {
        let fetcher = FakeFetcher::serving("# ownership\nregistry-verification=abc123  \n");

        let grant = strategy(Arc::clone(&fetcher))
            .authenticate(&Namespace::parse("com.example.api").unwrap(), &proof())
            .await
            .unwrap();
        assert_eq!(grant.subject, "api.example.com");
        assert_eq!(
            fetcher.requested.lock().as_slice(),
            ["https://api.example.com/.well-known/registry-auth"]
        );
    }

    #[tokio::test]
    async fn test_substring_is_not_a_match() {
        let fetcher = FakeFetcher::serving("xregistry-verification=abc123x");

        let err = strategy(fetcher)
            .authenticate(&Namespace::parse("com.example").unwrap(), &proof())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP verification failed for 'example.com'");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_proof_error() {
        let err = strategy(FakeFetcher::failing())
            .authenticate(&Namespace::parse("com.example").unwrap(), &proof())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
    }

    #[tokio::test]
    async fn test_plaintext_refused() {
        let fetcher =
            HttpsFetcher::from_config(&HttpChallengeConfig::default(), "turnstile-test").unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/.well-known/registry-auth")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Http { .. }));
    }
}
