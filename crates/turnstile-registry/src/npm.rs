//! npm package validation.

use async_trait::async_trait;
use serde::Deserialize;
use turnstile_core::{AdmissionError, PackageDeclaration, RegistryType, Result};

use crate::index::{check_index_fields, normalize_base};
use crate::probe::fetch_json;
use crate::validator::PackageValidator;

/// The fields of an npm version document that matter here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionDocument {
    #[serde(default)]
    mcp_name: Option<String>,
}

/// Validator for `npm` packages.
///
/// The published version must declare the server it belongs to in its
/// `mcpName` field.
#[derive(Debug, Clone)]
pub struct NpmValidator {
    http: reqwest::Client,
    base_url: String,
}

impl NpmValidator {
    /// Creates a validator against the given registry origin.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url).to_string(),
        }
    }
}

#[async_trait]
impl PackageValidator for NpmValidator {
    fn registry_type(&self) -> RegistryType {
        RegistryType::Npm
    }

    async fn validate(&self, package: &PackageDeclaration, server_name: &str) -> Result<()> {
        let coords = check_index_fields(RegistryType::Npm, &self.base_url, package)?;
        let url = format!("{}/{}/{}", self.base_url, coords.name, coords.version);

        let Some(doc) = fetch_json::<VersionDocument>(&self.http, &url).await? else {
            return Err(AdmissionError::unreachable(format!(
                "npm package '{}@{}' not found",
                coords.name, coords.version
            )));
        };

        match doc.mcp_name.as_deref() {
            Some(found) if found == server_name => Ok(()),
            Some(found) => Err(AdmissionError::policy(format!(
                "npm package '{}' mcpName '{found}' does not match server name '{server_name}'",
                coords.name
            ))),
            None => Err(AdmissionError::policy(format!(
                "npm package '{}' is missing the 'mcpName' field",
                coords.name
            ))),
        }
    }
}
