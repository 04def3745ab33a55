//! PyPI package validation.

use async_trait::async_trait;
use serde::Deserialize;
use turnstile_core::{AdmissionError, PackageDeclaration, RegistryType, Result};

use crate::index::{check_index_fields, normalize_base};
use crate::probe::fetch_json;
use crate::validator::PackageValidator;

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    info: ReleaseInfo,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    #[serde(default)]
    description: Option<String>,
}

/// Validator for `pypi` packages.
///
/// The release description must contain an `mcp-name: <server>` marker.
#[derive(Debug, Clone)]
pub struct PyPiValidator {
    http: reqwest::Client,
    base_url: String,
}

impl PyPiValidator {
    /// Creates a validator against the given index origin.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url).to_string(),
        }
    }
}

#[async_trait]
impl PackageValidator for PyPiValidator {
    fn registry_type(&self) -> RegistryType {
        RegistryType::Pypi
    }

    async fn validate(&self, package: &PackageDeclaration, server_name: &str) -> Result<()> {
        let coords = check_index_fields(RegistryType::Pypi, &self.base_url, package)?;
        let url = format!(
            "{}/pypi/{}/{}/json",
            self.base_url, coords.name, coords.version
        );

        let Some(doc) = fetch_json::<ReleaseDocument>(&self.http, &url).await? else {
            return Err(AdmissionError::unreachable(format!(
                "PyPI package '{}=={}' not found",
                coords.name, coords.version
            )));
        };

        let marker = format!("mcp-name: {server_name}");
        if doc
            .info
            .description
            .as_deref()
            .is_some_and(|d| d.contains(&marker))
        {
            Ok(())
        } else {
            Err(AdmissionError::policy(format!(
                "PyPI package '{}' description must contain '{marker}'",
                coords.name
            )))
        }
    }
}
