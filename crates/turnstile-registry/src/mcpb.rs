//! MCP bundle validation.
//!
//! Bundles are addressed by a direct download URL and pinned by file hash, so
//! the declaration must carry a hash and must not carry index coordinates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use turnstile_core::{AdmissionError, PackageDeclaration, RegistryType, Result};

use crate::error::ProbeError;
use crate::probe::ReachabilityProbe;
use crate::validator::PackageValidator;

/// Validator for `mcpb` packages.
pub struct McpbValidator {
    probe: Arc<dyn ReachabilityProbe>,
    timeout: Duration,
}

impl McpbValidator {
    /// Default bound on the reachability probe.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a validator over a probe.
    #[must_use]
    pub fn new(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            probe,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the probe timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Applies every rule that does not need the network, returning the
    /// parsed download URL.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn check_fields(package: &PackageDeclaration) -> Result<url::Url> {
        if package.version().is_some() {
            return Err(AdmissionError::policy(
                "MCPB packages must not have 'version' field",
            ));
        }
        if package.registry_base_url().is_some() {
            return Err(AdmissionError::policy(
                "MCPB packages must not have 'registryBaseUrl' field",
            ));
        }
        if package.file_sha256().is_none() {
            return Err(AdmissionError::policy(
                "MCPB package must include a fileSha256 hash for integrity verification",
            ));
        }
        if package.identifier.is_empty() {
            return Err(AdmissionError::policy(
                "package identifier is required for MCPB packages",
            ));
        }

        let url = url::Url::parse(&package.identifier)
            .map_err(|e| AdmissionError::format(format!("invalid MCPB package URL: {e}")))?;
        if !url.has_host() {
            return Err(AdmissionError::format(format!(
                "invalid MCPB package URL: '{}' has no host",
                package.identifier
            )));
        }

        if !package.identifier.to_ascii_lowercase().contains("mcp") {
            return Err(AdmissionError::policy(
                "MCPB package URL must contain 'mcp'",
            ));
        }

        Ok(url)
    }
}

#[async_trait]
impl PackageValidator for McpbValidator {
    fn registry_type(&self) -> RegistryType {
        RegistryType::Mcpb
    }

    async fn validate(&self, package: &PackageDeclaration, server_name: &str) -> Result<()> {
        let url = Self::check_fields(package)?;

        let outcome = tokio::time::timeout(self.timeout, self.probe.probe(url.as_str()))
            .await
            .unwrap_or_else(|_| {
                Err(ProbeError::Timeout {
                    url: url.to_string(),
                })
            });

        match outcome {
            Ok(status) => {
                tracing::debug!(server = server_name, url = %url, status, "MCPB package reachable");
                Ok(())
            }
            Err(e) => Err(AdmissionError::unreachable(format!(
                "MCPB package '{}' is not publicly accessible: {e}",
                package.identifier
            ))),
        }
    }
}
