//! Package validator trait and dispatch by registry type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use turnstile_core::{AdmissionError, PackageDeclaration, RegistriesConfig, RegistryType, Result};

use crate::mcpb::McpbValidator;
use crate::npm::NpmValidator;
use crate::nuget::NuGetValidator;
use crate::oci_validator::OciValidator;
use crate::probe::{build_http_client, HttpProbe};
use crate::pypi::PyPiValidator;

/// Rules for one registry type.
///
/// Implementations check field rules in a fixed order and report the first
/// violation. Network checks run last, only after every local rule passes.
#[async_trait]
pub trait PackageValidator: Send + Sync {
    /// Returns the registry type this validator handles.
    fn registry_type(&self) -> RegistryType;

    /// Validates `package` as declared by the server `server_name`.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    async fn validate(&self, package: &PackageDeclaration, server_name: &str) -> Result<()>;
}

/// Validators keyed by registry type.
#[derive(Clone, Default)]
pub struct ValidatorSet {
    validators: HashMap<RegistryType, Arc<dyn PackageValidator>>,
}

impl std::fmt::Debug for ValidatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.validators.keys().map(RegistryType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ValidatorSet")
            .field("registry_types", &types)
            .finish()
    }
}

impl ValidatorSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard set of validators sharing one HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be created.
    pub fn from_config(config: &RegistriesConfig) -> Result<Self> {
        let http = build_http_client(config.probe_timeout())
            .map_err(|e| AdmissionError::config(e.to_string()))?;

        Ok(Self::new()
            .with_validator(
                McpbValidator::new(Arc::new(HttpProbe::new(http.clone())))
                    .with_timeout(config.probe_timeout()),
            )
            .with_validator(OciValidator::new(http.clone(), &config.oci))
            .with_validator(NpmValidator::new(http.clone(), &config.npm_base_url))
            .with_validator(PyPiValidator::new(http.clone(), &config.pypi_base_url))
            .with_validator(NuGetValidator::new(http, &config.nuget_base_url)))
    }

    /// Registers a validator, replacing any previous one for its type.
    #[must_use]
    pub fn with_validator(mut self, validator: impl PackageValidator + 'static) -> Self {
        self.register(Arc::new(validator));
        self
    }

    /// Registers a shared validator, replacing any previous one for its type.
    pub fn register(&mut self, validator: Arc<dyn PackageValidator>) {
        self.validators.insert(validator.registry_type(), validator);
    }

    /// Returns the validator for a registry type.
    #[must_use]
    pub fn get(&self, registry_type: RegistryType) -> Option<&Arc<dyn PackageValidator>> {
        self.validators.get(&registry_type)
    }

    /// Returns the number of registered validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns true if no validators are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validates a package with the validator for its registry type.
    ///
    /// # Errors
    ///
    /// Returns a policy error if no validator handles the type, otherwise
    /// whatever the validator reports.
    pub async fn validate(&self, package: &PackageDeclaration, server_name: &str) -> Result<()> {
        let validator = self.get(package.registry_type).ok_or_else(|| {
            AdmissionError::policy(format!(
                "unsupported registry type '{}'",
                package.registry_type
            ))
        })?;
        validator.validate(package, server_name).await
    }
}
