//! NuGet package validation.

use async_trait::async_trait;
use serde::Deserialize;
use turnstile_core::{AdmissionError, PackageDeclaration, RegistryType, Result};

use crate::index::{check_index_fields, normalize_base};
use crate::probe::fetch_json;
use crate::validator::PackageValidator;

/// Flat-container version listing.
#[derive(Debug, Deserialize)]
struct VersionIndex {
    #[serde(default)]
    versions: Vec<String>,
}

/// Validator for `nuget` packages.
///
/// Ids and versions are compared lower-cased, as the flat container stores
/// them.
#[derive(Debug, Clone)]
pub struct NuGetValidator {
    http: reqwest::Client,
    base_url: String,
}

impl NuGetValidator {
    /// Creates a validator against the given API origin.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url).to_string(),
        }
    }
}

#[async_trait]
impl PackageValidator for NuGetValidator {
    fn registry_type(&self) -> RegistryType {
        RegistryType::Nuget
    }

    async fn validate(&self, package: &PackageDeclaration, _server_name: &str) -> Result<()> {
        let coords = check_index_fields(RegistryType::Nuget, &self.base_url, package)?;
        let id = coords.name.to_lowercase();
        let version = coords.version.to_lowercase();
        let url = format!("{}/v3-flatcontainer/{id}/index.json", self.base_url);

        let listed = fetch_json::<VersionIndex>(&self.http, &url)
            .await?
            .is_some_and(|index| index.versions.iter().any(|v| v.to_lowercase() == version));

        if listed {
            Ok(())
        } else {
            Err(AdmissionError::unreachable(format!(
                "NuGet package '{}' version '{}' not found",
                coords.name, coords.version
            )))
        }
    }
}
