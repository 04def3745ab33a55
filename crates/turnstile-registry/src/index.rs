//! Field rules shared by the package-index validators (npm, PyPI, NuGet).

use turnstile_core::{AdmissionError, PackageDeclaration, RegistryType, Result};

/// Coordinates of a package in an index, after the field rules pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCoordinates<'a> {
    /// Package name or id.
    pub name: &'a str,
    /// Package version.
    pub version: &'a str,
}

/// Applies the field rules for an index-backed registry type.
///
/// # Errors
///
/// Returns a policy error for the first violated rule: missing identifier,
/// missing version, non-canonical base URL, then a stray file hash.
pub fn check_index_fields<'a>(
    registry_type: RegistryType,
    canonical_base: &str,
    package: &'a PackageDeclaration,
) -> Result<IndexCoordinates<'a>> {
    let label = registry_type.display_name();

    if package.identifier.is_empty() {
        return Err(AdmissionError::policy(format!(
            "package identifier is required for {label} packages"
        )));
    }
    let Some(version) = package.version() else {
        return Err(AdmissionError::policy(format!(
            "{label} packages must include a version"
        )));
    };

    if let Some(base) = package.registry_base_url() {
        if normalize_base(base) != normalize_base(canonical_base) {
            return Err(AdmissionError::policy(format!(
                "registry base URL '{base}' is not supported for {label} packages; use '{canonical_base}'"
            )));
        }
    }

    if package.file_sha256().is_some() {
        return Err(AdmissionError::policy(format!(
            "{label} packages must not have 'fileSha256' field"
        )));
    }

    Ok(IndexCoordinates {
        name: &package.identifier,
        version,
    })
}

/// Strips trailing slashes so `https://pypi.org/` equals `https://pypi.org`.
#[must_use]
pub fn normalize_base(base: &str) -> &str {
    base.trim_end_matches('/')
}
