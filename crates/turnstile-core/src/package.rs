//! Package declarations and publish requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AdmissionError;
use crate::proof::AuthProof;

/// The package ecosystem a declaration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    /// npm package.
    Npm,
    /// Python Package Index package.
    Pypi,
    /// OCI container image.
    Oci,
    /// NuGet package.
    Nuget,
    /// MCP bundle addressed by direct download URL.
    Mcpb,
}

impl RegistryType {
    /// All registry types.
    pub const ALL: [Self; 5] = [Self::Npm, Self::Pypi, Self::Oci, Self::Nuget, Self::Mcpb];

    /// Returns the wire tag for this registry type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Oci => "oci",
            Self::Nuget => "nuget",
            Self::Mcpb => "mcpb",
        }
    }

    /// Returns the name used in client-facing messages.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "PyPI",
            Self::Oci => "OCI",
            Self::Nuget => "NuGet",
            Self::Mcpb => "MCPB",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryType {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AdmissionError::policy(format!("unsupported registry type '{s}'")))
    }
}

/// A single package declared by a server manifest.
///
/// Optional string fields that are present but empty are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDeclaration {
    /// Target ecosystem.
    pub registry_type: RegistryType,

    /// Package name, image reference, or download URL.
    #[serde(default)]
    pub identifier: String,

    /// Package version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// SHA-256 of the artifact file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,

    /// Base URL of the package index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_base_url: Option<String>,

    /// Runtime hint for clients (e.g. `npx`, `uvx`, `docker`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<String>,
}

impl PackageDeclaration {
    /// Creates a declaration with only the required fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_core::{PackageDeclaration, RegistryType};
    ///
    /// let pkg = PackageDeclaration::new(RegistryType::Npm, "@acme/weather-mcp")
    ///     .with_version("1.2.0");
    /// assert_eq!(pkg.version(), Some("1.2.0"));
    /// assert_eq!(pkg.file_sha256(), None);
    /// ```
    #[must_use]
    pub fn new(registry_type: RegistryType, identifier: impl Into<String>) -> Self {
        Self {
            registry_type,
            identifier: identifier.into(),
            version: None,
            file_sha256: None,
            registry_base_url: None,
            runtime_hint: None,
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the file hash.
    #[must_use]
    pub fn with_file_sha256(mut self, hash: impl Into<String>) -> Self {
        self.file_sha256 = Some(hash.into());
        self
    }

    /// Sets the registry base URL.
    #[must_use]
    pub fn with_registry_base_url(mut self, url: impl Into<String>) -> Self {
        self.registry_base_url = Some(url.into());
        self
    }

    /// Returns the version, if present and non-empty.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        non_empty(self.version.as_ref())
    }

    /// Returns the file hash, if present and non-empty.
    #[must_use]
    pub fn file_sha256(&self) -> Option<&str> {
        non_empty(self.file_sha256.as_ref())
    }

    /// Returns the registry base URL, if present and non-empty.
    #[must_use]
    pub fn registry_base_url(&self) -> Option<&str> {
        non_empty(self.registry_base_url.as_ref())
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// The server entry being published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerManifest {
    /// Server name, `<namespace>/<name>`.
    pub name: String,

    /// Server version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Declared packages, in declaration order.
    #[serde(default)]
    pub packages: Vec<PackageDeclaration>,
}

impl ServerManifest {
    /// Creates a manifest with no packages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            packages: Vec::new(),
        }
    }

    /// Appends a package declaration.
    #[must_use]
    pub fn with_package(mut self, package: PackageDeclaration) -> Self {
        self.packages.push(package);
        self
    }
}

/// A deserialized publish request as handed over by the HTTP layer.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// Namespace the caller claims.
    pub namespace: String,

    /// Proof of control over the namespace.
    pub auth: AuthProof,

    /// Entry to publish.
    pub manifest: ServerManifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_type_from_str() {
        assert_eq!("MCPB".parse::<RegistryType>().unwrap(), RegistryType::Mcpb);
        let err = "cargo".parse::<RegistryType>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported registry type 'cargo'");
    }

    #[test]
    fn test_declaration_camel_case_fields() {
        let json = r#"{
            "registryType": "mcpb",
            "identifier": "https://example.com/server.mcpb",
            "fileSha256": "abc",
            "registryBaseUrl": ""
        }"#;
        let pkg: PackageDeclaration = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.registry_type, RegistryType::Mcpb);
        assert_eq!(pkg.file_sha256(), Some("abc"));
        assert_eq!(pkg.registry_base_url(), None);
        assert_eq!(pkg.version(), None);
    }

    #[test]
    fn test_publish_request_decode() {
        let json = r#"{
            "namespace": "io.github.octocat",
            "auth": {"method": "github_at", "token": "ghp_x"},
            "manifest": {
                "name": "io.github.octocat/weather",
                "packages": [
                    {"registryType": "npm", "identifier": "weather-mcp", "version": "1.0.0"}
                ]
            }
        }"#;
        let req: PublishRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.auth.method(), "github_at");
        assert_eq!(req.manifest.packages.len(), 1);
        assert_eq!(req.manifest.packages[0].version(), Some("1.0.0"));
    }
}
