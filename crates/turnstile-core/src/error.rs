//! Error taxonomy for admission decisions.
//!
//! Every component reports failures through [`AdmissionError`]. Each variant
//! carries exactly one human-readable reason, and the `Display` output is that
//! reason verbatim so callers can surface it to clients unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`AdmissionError`] as the error type.
pub type Result<T> = std::result::Result<T, AdmissionError>;

/// Errors that can occur while admitting a publish request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// A reference or identifier is malformed. Never retried.
    #[error("{0}")]
    Format(String),

    /// A forbidden field combination or a rule of the target registry type
    /// was violated.
    #[error("{0}")]
    Policy(String),

    /// Namespace ownership could not be established.
    #[error("{0}")]
    Proof(String),

    /// A network probe or lookup failed. May be transient.
    #[error("{0}")]
    Unreachable(String),

    /// The request named something the operator has not configured.
    #[error("{0}")]
    Config(String),
}

impl AdmissionError {
    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Creates a policy error.
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy(message.into())
    }

    /// Creates a proof error.
    pub fn proof(message: impl Into<String>) -> Self {
        Self::Proof(message.into())
    }

    /// Creates an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Format(_) => ErrorCategory::Format,
            Self::Policy(_) => ErrorCategory::Policy,
            Self::Proof(_) => ErrorCategory::Proof,
            Self::Unreachable(_) => ErrorCategory::Unreachable,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Returns the human-readable reason.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Format(m)
            | Self::Policy(m)
            | Self::Proof(m)
            | Self::Unreachable(m)
            | Self::Config(m) => m,
        }
    }

    /// Returns true if the client caused this error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::Policy(_) | Self::Proof(_))
    }

    /// Returns true if a manual retry by the caller may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Broad category of an admission failure, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Malformed input.
    Format,
    /// Rule violation.
    Policy,
    /// Ownership not proven.
    Proof,
    /// Network check failed.
    Unreachable,
    /// Operator misconfiguration.
    Config,
}

impl ErrorCategory {
    /// Returns the category as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Policy => "policy",
            Self::Proof => "proof",
            Self::Unreachable => "unreachable",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
