//! Token-based strategies: GitHub Actions OIDC and operator-defined OIDC
//! providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use turnstile_core::{
    AdmissionError, AuthGrant, AuthMethod, AuthProof, GitHubOidcConfig, Namespace,
    OidcProviderConfig, Result,
};

use crate::error::AuthError;
use crate::github::owns_namespace;
use crate::jwks::{JwksCache, JwtVerifier, TokenExpectations};
use crate::strategy::{unexpected_proof, AuthStrategy};

/// Claims read from GitHub Actions tokens.
#[derive(Debug, Deserialize)]
struct GitHubActionsClaims {
    repository: String,
    repository_owner: String,
}

/// Verifies GitHub Actions identity tokens.
///
/// A token minted for `octocat/weather` grants `io.github.octocat`.
#[derive(Debug, Clone)]
pub struct GitHubOidcStrategy {
    verifier: JwtVerifier,
    expect: TokenExpectations,
    grant_ttl: Duration,
}

impl GitHubOidcStrategy {
    /// Creates the strategy over a shared key-set cache.
    #[must_use]
    pub fn new(config: &GitHubOidcConfig, cache: Arc<JwksCache>, grant_ttl: Duration) -> Self {
        Self {
            verifier: JwtVerifier::new(cache),
            expect: TokenExpectations {
                jwks_url: config.jwks_url.clone(),
                issuer: config.issuer.clone(),
                audience: config.audience.clone(),
            },
            grant_ttl,
        }
    }
}

#[async_trait]
impl AuthStrategy for GitHubOidcStrategy {
    fn method(&self) -> &str {
        AuthMethod::GithubOidc.as_str()
    }

    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        let AuthProof::GithubOidc { token } = proof else {
            return Err(unexpected_proof(self.method(), proof).into());
        };

        let claims: GitHubActionsClaims = self
            .verifier
            .verify(token.expose_secret(), &self.expect)
            .await
            .map_err(|e| log_rejection(self.method(), e))?;

        if !owns_namespace(namespace, &claims.repository_owner) {
            tracing::debug!(
                owner = %claims.repository_owner,
                namespace = %namespace,
                "GitHub Actions owner does not match namespace"
            );
            return Err(AdmissionError::proof(format!(
                "GitHub Actions identity is not permitted to publish under '{namespace}'"
            )));
        }

        Ok(AuthGrant::issue(
            namespace.clone(),
            self.method(),
            claims.repository,
            self.grant_ttl,
        ))
    }
}

/// Verifies tokens from operator-configured providers.
#[derive(Debug, Clone)]
pub struct OidcStrategy {
    verifier: JwtVerifier,
    providers: HashMap<String, OidcProviderConfig>,
    grant_ttl: Duration,
}

impl OidcStrategy {
    /// Creates the strategy for the given providers.
    #[must_use]
    pub fn new(
        providers: &[OidcProviderConfig],
        cache: Arc<JwksCache>,
        grant_ttl: Duration,
    ) -> Self {
        Self {
            verifier: JwtVerifier::new(cache),
            providers: providers
                .iter()
                .map(|p| (p.name.clone(), p.clone()))
                .collect(),
            grant_ttl,
        }
    }

    /// Maps verified claims to the namespace the provider grants.
    fn granted_namespace(
        provider: &OidcProviderConfig,
        claims: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<Namespace> {
        let value = claims.get(&provider.namespace_claim)?.as_str()?;
        let raw = match &provider.namespace_prefix {
            Some(prefix) => format!("{prefix}.{value}"),
            None => value.to_string(),
        };
        Namespace::parse(&raw).ok()
    }
}

#[async_trait]
impl AuthStrategy for OidcStrategy {
    fn method(&self) -> &str {
        AuthMethod::Oidc.as_str()
    }

    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        let AuthProof::Oidc { provider, token } = proof else {
            return Err(unexpected_proof(self.method(), proof).into());
        };
        let config = self
            .providers
            .get(provider)
            .ok_or_else(|| AuthError::UnknownProvider {
                provider: provider.clone(),
            })?;

        let expect = TokenExpectations {
            jwks_url: config.jwks_url.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        };
        let claims: serde_json::Map<String, serde_json::Value> = self
            .verifier
            .verify(token.expose_secret(), &expect)
            .await
            .map_err(|e| log_rejection(self.method(), e))?;

        let Some(granted) = Self::granted_namespace(config, &claims) else {
            tracing::debug!(
                provider = %provider,
                claim = %config.namespace_claim,
                "namespace claim missing or malformed"
            );
            return Err(AdmissionError::proof("identity token verification failed"));
        };
        if !granted.covers(namespace) {
            return Err(AdmissionError::proof(format!(
                "OIDC identity is not permitted to publish under '{namespace}'"
            )));
        }

        let subject = claims
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(granted.as_str())
            .to_string();
        Ok(AuthGrant::issue(granted, self.method(), subject, self.grant_ttl))
    }
}

fn log_rejection(method: &str, err: AuthError) -> AdmissionError {
    tracing::debug!(method, error = %err, "identity token rejected");
    err.into()
}
