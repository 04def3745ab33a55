//! # Turnstile Auth
//!
//! Namespace ownership strategies for the Turnstile admission gate.
//!
//! A publish request carries proof material tagged with a method. The
//! [`AuthRegistry`] routes it to the matching [`AuthStrategy`], which either
//! returns a short-lived [`AuthGrant`](turnstile_core::AuthGrant) scoped to
//! what was proven or rejects the request.
//!
//! | method        | proof                         | grants                                |
//! |---------------|-------------------------------|---------------------------------------|
//! | `github_at`   | GitHub access token           | `io.github.<login>` / `io.github.<org>` |
//! | `github_oidc` | GitHub Actions identity token | `io.github.<repository_owner>`        |
//! | `oidc`        | provider identity token       | namespace from a configured claim     |
//! | `dns`         | TXT record token              | the namespace's reversed domain       |
//! | `http`        | well-known file token         | the namespace's reversed domain       |
//! | `none`        | nothing                       | the fixed anonymous prefix            |
//!
//! Token strategies share one [`JwksCache`]. It is the only mutable state
//! shared between requests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use turnstile_auth::AuthRegistry;
//! use turnstile_core::{AuthConfig, AuthProof, Namespace};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = AuthRegistry::from_config(&AuthConfig::default())?;
//! let namespace = Namespace::parse("com.example")?;
//! let proof = AuthProof::Dns { token: "abc123".to_string() };
//! let grant = registry.authenticate(&namespace, &proof).await?;
//! println!("granted {}", grant.namespace);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod anonymous;
mod dns;
mod error;
mod github;
mod http;
mod jwks;
mod oidc;
mod registry;
mod strategy;

#[cfg(test)]
mod test_keys;

pub use anonymous::AnonymousStrategy;
pub use dns::{DnsStrategy, HickoryTxtResolver, TxtResolver};
pub use error::AuthError;
pub use github::GitHubTokenStrategy;
pub use http::{HttpStrategy, HttpsFetcher, WellKnownFetcher};
pub use jwks::{
    HttpJwksFetcher, JwksCache, JwksFetcher, JwtVerifier, TokenExpectations, ALLOWED_ALGORITHMS,
};
pub use oidc::{GitHubOidcStrategy, OidcStrategy};
pub use registry::AuthRegistry;
pub use strategy::AuthStrategy;
