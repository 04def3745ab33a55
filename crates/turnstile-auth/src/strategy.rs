//! The authentication strategy trait.

use async_trait::async_trait;
use turnstile_core::{AuthGrant, AuthProof, Namespace, Result};

use crate::error::AuthError;

/// One way of proving control over a namespace.
///
/// Strategies hold no per-request state. Each call either returns a grant
/// scoped to what was proven or an error describing why it was not.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Returns the dispatch key this strategy is registered under.
    fn method(&self) -> &str;

    /// Proves that the caller controls `namespace`.
    ///
    /// # Errors
    ///
    /// Returns a proof error when ownership is not established, a config
    /// error for proofs the strategy cannot handle, or an unreachable error
    /// when an identity provider is down.
    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant>;
}

/// Error for a proof routed to the wrong strategy.
pub(crate) fn unexpected_proof(strategy: &str, proof: &AuthProof) -> AuthError {
    AuthError::UnexpectedProof {
        strategy: strategy.to_string(),
        proof: proof.method().to_string(),
    }
}
