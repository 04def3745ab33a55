//! OCI image validation.
//!
//! The registry and tag live in the identifier itself, so the declaration's
//! version and base URL fields must be absent. The image is checked with an
//! anonymous manifest `HEAD` against the Distribution API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use turnstile_core::{AdmissionError, OciConfig, PackageDeclaration, RegistryType, Result};

use crate::error::ProbeError;
use crate::oci::{BearerChallenge, MediaType, OciGrammar, OciReference, TokenResponse};
use crate::validator::PackageValidator;

/// Validator for `oci` packages.
#[derive(Debug, Clone)]
pub struct OciValidator {
    http: reqwest::Client,
    grammar: OciGrammar,
    allowed_registries: Vec<String>,
    api_base_override: Option<String>,
}

impl OciValidator {
    /// Creates a validator from the OCI configuration.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &OciConfig) -> Self {
        Self {
            http,
            grammar: OciGrammar::from(config),
            allowed_registries: config.allowed_registries.clone(),
            api_base_override: None,
        }
    }

    /// Sends manifest requests to `api_base` instead of the registry named
    /// by the reference. Used for pull-through mirrors.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base_override = Some(api_base.into());
        self
    }

    /// Applies every rule that does not need the network, returning the
    /// parsed reference.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn check_fields(&self, package: &PackageDeclaration) -> Result<OciReference> {
        if package.version().is_some() {
            return Err(AdmissionError::policy(
                "OCI packages must not have 'version' field",
            ));
        }
        if package.registry_base_url().is_some() {
            return Err(AdmissionError::policy(
                "OCI packages must not have 'registryBaseUrl' field",
            ));
        }
        if package.identifier.is_empty() {
            return Err(AdmissionError::policy(
                "package identifier is required for OCI packages",
            ));
        }

        let reference = self.grammar.parse(&package.identifier)?;
        if !self
            .allowed_registries
            .iter()
            .any(|r| r == &reference.registry)
        {
            return Err(AdmissionError::policy(format!(
                "OCI registry '{}' is not supported",
                reference.registry
            )));
        }

        Ok(reference)
    }

    /// Checks that the manifest exists and is pullable anonymously.
    async fn check_manifest(
        &self,
        reference: &OciReference,
    ) -> std::result::Result<(), ProbeError> {
        let api_base = self
            .api_base_override
            .clone()
            .unwrap_or_else(|| reference.api_base_url());
        let url = reference.manifest_url(&api_base);

        let response = self.head_manifest(&url, None).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status != StatusCode::UNAUTHORIZED {
            return Err(ProbeError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(BearerChallenge::parse)
            .ok_or(ProbeError::HttpStatus {
                status: status.as_u16(),
            })?;

        let token = self.fetch_token(&challenge).await?;
        tracing::debug!(reference = %reference, "retrying manifest request with anonymous token");

        let status = self.head_manifest(&url, Some(&token)).await?.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::HttpStatus {
                status: status.as_u16(),
            })
        }
    }

    async fn head_manifest(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> std::result::Result<reqwest::Response, ProbeError> {
        let mut request = self
            .http
            .head(url)
            .header(ACCEPT, MediaType::manifest_accept());
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
    ) -> std::result::Result<String, ProbeError> {
        let url = challenge.token_url().ok_or_else(|| ProbeError::TokenExchange {
            message: format!("invalid realm '{}'", challenge.realm),
        })?;

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::TokenExchange {
                message: format!("token endpoint returned {}", response.status().as_u16()),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| ProbeError::TokenExchange {
            message: e.to_string(),
        })?;
        body.into_token().ok_or_else(|| ProbeError::TokenExchange {
            message: "token endpoint returned no token".to_string(),
        })
    }
}

#[async_trait]
impl PackageValidator for OciValidator {
    fn registry_type(&self) -> RegistryType {
        RegistryType::Oci
    }

    async fn validate(&self, package: &PackageDeclaration, server_name: &str) -> Result<()> {
        let reference = self.check_fields(package)?;

        self.check_manifest(&reference).await.map_err(|e| {
            AdmissionError::unreachable(format!(
                "OCI image '{}' is not publicly accessible: {e}",
                package.identifier
            ))
        })?;

        tracing::debug!(server = server_name, reference = %reference, "OCI image reachable");
        Ok(())
    }
}
