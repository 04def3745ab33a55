//! CLI commands and argument parsing.

pub mod admit;
pub mod check_package;
pub mod parse_ref;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use turnstile_core::AdmissionConfig;

/// Turnstile - publish admission for server registries
#[derive(Parser)]
#[command(name = "turnstile")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate a publish request and validate its packages
    Admit(admit::AdmitArgs),

    /// Parse an OCI image reference
    ParseRef(parse_ref::ParseRefArgs),

    /// Validate a single package declaration
    CheckPackage(check_package::CheckPackageArgs),

    /// Print version information
    Version,
}

/// Loads the configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<AdmissionConfig> {
    match path {
        Some(path) => AdmissionConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(AdmissionConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, AdmissionConfig::default());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turnstile.yaml");
        std::fs::write(&path, "auth:\n  grant_ttl_secs: 60\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.auth.grant_ttl_secs, 60);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/turnstile.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
