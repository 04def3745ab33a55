//! Check-package command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use turnstile_core::{PackageDeclaration, RegistryType, ValidationVerdict};
use turnstile_registry::ValidatorSet;

/// Arguments for the check-package command.
#[derive(Args)]
pub struct CheckPackageArgs {
    /// Registry type (mcpb, oci, npm, pypi, nuget)
    #[arg(short = 't', long = "type")]
    pub registry_type: RegistryType,

    /// Package identifier (URL, image reference, or package name)
    pub identifier: String,

    /// Server name the package is declared by
    #[arg(short, long)]
    pub server: String,

    /// Package version
    #[arg(long)]
    pub version: Option<String>,

    /// SHA-256 of the package file
    #[arg(long)]
    pub file_sha256: Option<String>,

    /// Registry base URL
    #[arg(long)]
    pub registry_base_url: Option<String>,

    /// Path to the configuration file (YAML)
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the probe timeout, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl CheckPackageArgs {
    fn declaration(&self) -> PackageDeclaration {
        let mut package = PackageDeclaration::new(self.registry_type, &self.identifier);
        if let Some(version) = &self.version {
            package = package.with_version(version);
        }
        if let Some(hash) = &self.file_sha256 {
            package = package.with_file_sha256(hash);
        }
        if let Some(url) = &self.registry_base_url {
            package = package.with_registry_base_url(url);
        }
        package
    }
}

/// Runs the check-package command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the package is
/// rejected.
pub async fn run(args: &CheckPackageArgs) -> Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(secs) = args.timeout {
        config.registries.probe_timeout_secs = secs;
    }

    let validators =
        ValidatorSet::from_config(&config.registries).context("Failed to build validators")?;
    let package = args.declaration();

    info!(
        registry_type = %package.registry_type,
        identifier = %package.identifier,
        server = %args.server,
        "Checking package"
    );

    let result = validators.validate(&package, &args.server).await;
    let verdict = ValidationVerdict::from_result(0, &package, &result);
    println!("{verdict}");

    result.with_context(|| format!("Package '{}' rejected", package.identifier))
}
