//! HTTP reachability probing and index lookups.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::ProbeError;

/// User agent sent with every registry request.
#[must_use]
pub fn user_agent() -> String {
    format!("turnstile/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds the HTTP client shared by the validators.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent())
        .build()
        .map_err(|e| ProbeError::Request {
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Checks that a URL is publicly downloadable.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Probes `url`, returning the final status when it is 2xx or 3xx.
    ///
    /// # Errors
    ///
    /// Returns an error for any other status, a timeout, or a transport
    /// failure.
    async fn probe(&self, url: &str) -> Result<u16, ProbeError>;
}

/// Probe that issues `HEAD` and falls back to a one-byte ranged `GET` when
/// the server does not support `HEAD`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
}

impl HttpProbe {
    /// Creates a probe over an existing client.
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Creates a probe with its own client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProbeError> {
        Ok(Self::new(build_http_client(timeout)?))
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<u16, ProbeError> {
        let mut status = self.http.head(url).send().await?.status();

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            tracing::debug!(url, %status, "HEAD not supported, retrying with ranged GET");
            status = self
                .http
                .get(url)
                .header(RANGE, "bytes=0-0")
                .send()
                .await?
                .status();
        }

        if status.is_success() || status.is_redirection() {
            Ok(status.as_u16())
        } else {
            Err(ProbeError::HttpStatus {
                status: status.as_u16(),
            })
        }
    }
}

/// Fetches a JSON document, returning `None` on 404.
///
/// # Errors
///
/// Returns an error for any other non-success status, a transport failure,
/// or a body that does not decode as `T`.
pub async fn fetch_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
) -> Result<Option<T>, ProbeError> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ProbeError::HttpStatus {
            status: status.as_u16(),
        });
    }

    response
        .json()
        .await
        .map(Some)
        .map_err(|e| ProbeError::InvalidResponse {
            message: e.to_string(),
        })
}
