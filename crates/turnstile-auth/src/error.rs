//! Error types for the auth crate.
//!
//! Strategies keep detailed causes in [`AuthError`] for debug logging and
//! hand the client only the coarse [`AdmissionError`] it converts into.

use thiserror::Error;
use turnstile_core::AdmissionError;

/// Errors that can occur while establishing namespace ownership.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No strategy is registered under the requested key.
    #[error("unknown auth method '{method}'")]
    UnknownMethod {
        /// The requested method key.
        method: String,
    },

    /// The strategy exists but the operator disabled it.
    #[error("auth method '{method}' is disabled")]
    MethodDisabled {
        /// The requested method key.
        method: String,
    },

    /// The proof names an OIDC provider that is not configured.
    #[error("OIDC provider '{provider}' is not configured")]
    UnknownProvider {
        /// Provider name from the proof.
        provider: String,
    },

    /// A strategy was handed proof material for another method.
    #[error("{strategy} strategy cannot handle '{proof}' proof")]
    UnexpectedProof {
        /// The strategy that received the proof.
        strategy: String,
        /// The proof's method.
        proof: String,
    },

    /// A token failed signature or claim verification.
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// Failure reason.
        reason: String,
    },

    /// No key in the key set matches the token.
    #[error("no signing key matches key id '{kid}'")]
    KeyNotFound {
        /// Key id from the token header.
        kid: String,
    },

    /// The key set could not be fetched.
    #[error("failed to fetch key set from {url}: {reason}")]
    KeySetUnavailable {
        /// Key set URL.
        url: String,
        /// Failure reason.
        reason: String,
    },

    /// The name has no TXT records (NXDOMAIN or empty answer).
    #[error("no TXT records found for {name}")]
    NoRecords {
        /// Queried name.
        name: String,
    },

    /// A DNS lookup failed in a way that may succeed on retry.
    #[error("DNS lookup failed for {name}: {reason}")]
    DnsLookup {
        /// Queried name.
        name: String,
        /// Failure reason.
        reason: String,
    },

    /// A challenge or API request failed.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// Requested URL.
        url: String,
        /// Failure reason.
        reason: String,
    },

    /// An identity provider answered unexpectedly.
    #[error("{service} returned an unexpected response: {reason}")]
    Upstream {
        /// Service name.
        service: String,
        /// Failure reason.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for invalidity.
        reason: String,
    },
}

impl AuthError {
    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::KeySetUnavailable { .. }
                | Self::DnsLookup { .. }
                | Self::Http { .. }
                | Self::Upstream { .. }
        )
    }

    /// Creates an HTTP error from a reqwest failure.
    #[must_use]
    pub fn http(url: impl Into<String>, err: &reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            reason: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken {
            reason: err.to_string(),
        }
    }
}

impl From<AuthError> for AdmissionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownMethod { .. }
            | AuthError::MethodDisabled { .. }
            | AuthError::UnknownProvider { .. }
            | AuthError::UnexpectedProof { .. }
            | AuthError::InvalidConfig { .. } => Self::config(err.to_string()),
            AuthError::InvalidToken { .. } | AuthError::KeyNotFound { .. } => {
                Self::proof("identity token verification failed")
            }
            AuthError::KeySetUnavailable { .. } | AuthError::Upstream { .. } => {
                Self::unreachable(err.to_string())
            }
            AuthError::NoRecords { .. } | AuthError::DnsLookup { .. } | AuthError::Http { .. } => {
                Self::proof(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::ErrorCategory;

    #[test]
    fn test_error_display() {
        let err = AuthError::UnknownMethod {
            method: "carrier_pigeon".to_string(),
        };
        assert_eq!(err.to_string(), "unknown auth method 'carrier_pigeon'");
    }

    #[test]
    fn test_retryable() {
        assert!(AuthError::DnsLookup {
            name: "_registry-auth.example.com".to_string(),
            reason: "timeout".to_string(),
        }
        .is_retryable());
        assert!(!AuthError::NoRecords {
            name: "_registry-auth.example.com".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_config_errors_convert_to_config() {
        let err: AdmissionError = AuthError::UnknownProvider {
            provider: "corp".to_string(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.to_string(), "OIDC provider 'corp' is not configured");
    }

    #[test]
    fn test_token_errors_hide_detail() {
        let err: AdmissionError = AuthError::InvalidToken {
            reason: "InvalidAudience".to_string(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert!(!err.to_string().contains("Audience"));
    }
}
