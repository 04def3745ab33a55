//! Anonymous publishing.

use std::time::Duration;

use async_trait::async_trait;
use turnstile_core::{
    AdmissionError, AnonymousConfig, AuthGrant, AuthMethod, AuthProof, Namespace, Result,
};

use crate::error::AuthError;
use crate::strategy::{unexpected_proof, AuthStrategy};

/// Grants the fixed anonymous prefix and nothing else.
#[derive(Debug, Clone)]
pub struct AnonymousStrategy {
    prefix: Namespace,
    grant_ttl: Duration,
}

impl AnonymousStrategy {
    /// Creates the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the prefix is not a valid
    /// namespace.
    pub fn new(config: &AnonymousConfig, grant_ttl: Duration) -> std::result::Result<Self, AuthError> {
        let prefix =
            Namespace::parse(&config.namespace_prefix).map_err(|e| AuthError::InvalidConfig {
                reason: format!("anonymous namespace prefix: {e}"),
            })?;
        Ok(Self { prefix, grant_ttl })
    }
}

#[async_trait]
impl AuthStrategy for AnonymousStrategy {
    fn method(&self) -> &str {
        AuthMethod::None.as_str()
    }

    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        if !matches!(proof, AuthProof::None) {
            return Err(unexpected_proof(self.method(), proof).into());
        }
        if !self.prefix.covers(namespace) {
            return Err(AdmissionError::proof(format!(
                "anonymous authentication may only publish under '{}'",
                self.prefix
            )));
        }

        Ok(AuthGrant::issue(
            self.prefix.clone(),
            self.method(),
            "anonymous",
            self.grant_ttl,
        ))
    }
}
