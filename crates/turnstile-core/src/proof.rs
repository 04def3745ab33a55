//! Proof material submitted to establish namespace control.

use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;

/// Built-in authentication methods and their dispatch keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// GitHub personal or OAuth access token.
    GithubAt,
    /// GitHub Actions OIDC token.
    GithubOidc,
    /// Token from an operator-configured OIDC provider.
    Oidc,
    /// DNS TXT record challenge.
    Dns,
    /// HTTPS well-known file challenge.
    Http,
    /// Anonymous publishing under a fixed prefix.
    None,
}

impl AuthMethod {
    /// All built-in methods.
    pub const ALL: [Self; 6] = [
        Self::GithubAt,
        Self::GithubOidc,
        Self::Oidc,
        Self::Dns,
        Self::Http,
        Self::None,
    ];

    /// Returns the dispatch key for this method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GithubAt => "github_at",
            Self::GithubOidc => "github_oidc",
            Self::Oidc => "oidc",
            Self::Dns => "dns",
            Self::Http => "http",
            Self::None => "none",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof material, tagged by the method that consumes it.
///
/// Tokens are held as [`SecretString`] so they never show up in logs or
/// `Debug` output.
///
/// ```
/// use turnstile_core::AuthProof;
///
/// let proof: AuthProof =
///     serde_json::from_str(r#"{"method": "dns", "token": "abc123"}"#).unwrap();
/// assert_eq!(proof.method(), "dns");
/// ```
#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthProof {
    /// GitHub access token.
    GithubAt {
        /// Bearer token.
        token: SecretString,
    },

    /// GitHub Actions OIDC identity token.
    GithubOidc {
        /// Signed JWT.
        token: SecretString,
    },

    /// Identity token from a configured OIDC provider.
    Oidc {
        /// Name of the configured provider.
        provider: String,
        /// Signed JWT.
        token: SecretString,
    },

    /// DNS challenge. The evidence is looked up live; the token is what the
    /// caller placed in the TXT record.
    Dns {
        /// Verification token.
        token: String,
    },

    /// HTTP challenge. The evidence is fetched live; the token is what the
    /// caller placed in the well-known file.
    Http {
        /// Verification token.
        token: String,
    },

    /// No proof.
    None,
}

impl AuthProof {
    /// Returns the dispatch key of the method this proof is for.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the built-in method this proof is for.
    #[must_use]
    pub const fn kind(&self) -> AuthMethod {
        match self {
            Self::GithubAt { .. } => AuthMethod::GithubAt,
            Self::GithubOidc { .. } => AuthMethod::GithubOidc,
            Self::Oidc { .. } => AuthMethod::Oidc,
            Self::Dns { .. } => AuthMethod::Dns,
            Self::Http { .. } => AuthMethod::Http,
            Self::None => AuthMethod::None,
        }
    }
}
