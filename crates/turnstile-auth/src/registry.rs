//! Strategy dispatch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use turnstile_core::{AuthConfig, AuthGrant, AuthMethod, AuthProof, Namespace, Result};

use crate::anonymous::AnonymousStrategy;
use crate::dns::{DnsStrategy, HickoryTxtResolver};
use crate::error::AuthError;
use crate::github::GitHubTokenStrategy;
use crate::http::{HttpStrategy, HttpsFetcher};
use crate::jwks::{HttpJwksFetcher, JwksCache};
use crate::oidc::{GitHubOidcStrategy, OidcStrategy};
use crate::strategy::AuthStrategy;

fn user_agent() -> String {
    format!("turnstile/{}", env!("CARGO_PKG_VERSION"))
}

/// Maps dispatch keys to strategies.
///
/// Methods turned off in configuration stay known to the registry so that
/// requests for them fail as disabled rather than unknown.
#[derive(Default)]
pub struct AuthRegistry {
    strategies: HashMap<String, Arc<dyn AuthStrategy>>,
    disabled: BTreeSet<String>,
}

impl std::fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRegistry")
            .field("methods", &self.methods())
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl AuthRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every enabled built-in strategy, with a process-wide key-set
    /// cache fetching over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if a client cannot be built or a
    /// configured value is malformed.
    pub fn from_config(config: &AuthConfig) -> std::result::Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.jwks.fetch_timeout())
            .user_agent(user_agent())
            .build()
            .map_err(|e| AuthError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        let cache = Arc::new(JwksCache::new(
            Arc::new(HttpJwksFetcher::new(http)),
            &config.jwks,
        ));
        Self::from_config_with(config, cache)
    }

    /// Like [`from_config`](Self::from_config) but over a caller-owned
    /// key-set cache.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if a client cannot be built or a
    /// configured value is malformed.
    pub fn from_config_with(
        config: &AuthConfig,
        cache: Arc<JwksCache>,
    ) -> std::result::Result<Self, AuthError> {
        let ttl = config.grant_ttl();
        let mut registry = Self::new();

        if config.github.enabled {
            let http = reqwest::Client::builder()
                .timeout(config.github.timeout())
                .user_agent(user_agent())
                .build()
                .map_err(|e| AuthError::InvalidConfig {
                    reason: format!("failed to build HTTP client: {e}"),
                })?;
            registry.register(Arc::new(GitHubTokenStrategy::new(http, &config.github, ttl)));
        } else {
            registry.disable(AuthMethod::GithubAt.as_str());
        }

        if config.github_oidc.enabled {
            registry.register(Arc::new(GitHubOidcStrategy::new(
                &config.github_oidc,
                Arc::clone(&cache),
                ttl,
            )));
        } else {
            registry.disable(AuthMethod::GithubOidc.as_str());
        }

        if config.oidc_providers.is_empty() {
            registry.disable(AuthMethod::Oidc.as_str());
        } else {
            registry.register(Arc::new(OidcStrategy::new(
                &config.oidc_providers,
                cache,
                ttl,
            )));
        }

        if config.dns.enabled {
            let resolver = Arc::new(HickoryTxtResolver::from_config(&config.dns)?);
            registry.register(Arc::new(DnsStrategy::new(resolver, config.dns.clone(), ttl)));
        } else {
            registry.disable(AuthMethod::Dns.as_str());
        }

        if config.http.enabled {
            let fetcher = Arc::new(HttpsFetcher::from_config(&config.http, &user_agent())?);
            registry.register(Arc::new(HttpStrategy::new(fetcher, config.http.clone(), ttl)));
        } else {
            registry.disable(AuthMethod::Http.as_str());
        }

        if config.anonymous.enabled {
            registry.register(Arc::new(AnonymousStrategy::new(&config.anonymous, ttl)?));
        } else {
            registry.disable(AuthMethod::None.as_str());
        }

        tracing::debug!(methods = ?registry.methods(), "auth strategies registered");
        Ok(registry)
    }

    /// Registers a strategy under its own dispatch key, replacing any
    /// previous strategy or disabled marker for that key.
    pub fn register(&mut self, strategy: Arc<dyn AuthStrategy>) {
        let method = strategy.method().to_string();
        self.disabled.remove(&method);
        self.strategies.insert(method, strategy);
    }

    /// Adds a strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn AuthStrategy>) -> Self {
        self.register(strategy);
        self
    }

    /// Marks a method as disabled, removing any registered strategy.
    pub fn disable(&mut self, method: &str) {
        self.strategies.remove(method);
        self.disabled.insert(method.to_string());
    }

    /// Returns the registered dispatch keys, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Returns the strategy for `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<&Arc<dyn AuthStrategy>> {
        self.strategies.get(method)
    }

    /// Dispatches `proof` to the strategy for its method.
    ///
    /// # Errors
    ///
    /// Returns a config error for unknown or disabled methods, otherwise
    /// whatever the strategy returns.
    pub async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        let method = proof.method();
        let Some(strategy) = self.strategies.get(method) else {
            let err = if self.disabled.contains(method) {
                AuthError::MethodDisabled {
                    method: method.to_string(),
                }
            } else {
                AuthError::UnknownMethod {
                    method: method.to_string(),
                }
            };
            tracing::warn!(method, namespace = %namespace, error = %err, "auth method unavailable");
            return Err(err.into());
        };

        match strategy.authenticate(namespace, proof).await {
            Ok(grant) => {
                tracing::info!(
                    method,
                    namespace = %namespace,
                    granted = %grant.namespace,
                    subject = %grant.subject,
                    "namespace ownership established"
                );
                Ok(grant)
            }
            Err(e) => {
                tracing::info!(
                    method,
                    namespace = %namespace,
                    category = e.category().as_str(),
                    "namespace ownership not established"
                );
                Err(e)
            }
        }
    }
}
