//! Error types for registry lookups.

use thiserror::Error;
use turnstile_core::AdmissionError;

/// Errors that can occur while contacting a package registry.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The request did not complete within the probe timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The registry could not be reached.
    #[error("failed to connect to {url}: {message}")]
    ConnectionFailed {
        /// Requested URL.
        url: String,
        /// Underlying error.
        message: String,
    },

    /// The registry answered with a non-success status.
    #[error("HTTP status {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The registry answered with a body that could not be decoded.
    #[error("invalid response from registry: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// A registry authentication challenge could not be satisfied.
    #[error("registry token exchange failed: {message}")]
    TokenExchange {
        /// Error message.
        message: String,
    },

    /// Any other transport failure.
    #[error("request failed: {message}")]
    Request {
        /// Error message.
        message: String,
    },
}

impl ProbeError {
    /// Returns true if a later attempt might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed { .. } => true,
            Self::HttpStatus { status } => *status >= 500 || *status == 429,
            Self::InvalidResponse { .. } | Self::TokenExchange { .. } | Self::Request { .. } => {
                false
            }
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::ConnectionFailed {
                url,
                message: err.to_string(),
            }
        } else if err.is_status() {
            Self::HttpStatus {
                status: err.status().map_or(0, |s| s.as_u16()),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            Self::Request {
                message: err.to_string(),
            }
        }
    }
}

impl From<ProbeError> for AdmissionError {
    fn from(err: ProbeError) -> Self {
        Self::unreachable(err.to_string())
    }
}
