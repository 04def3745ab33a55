//! Parse-ref command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use turnstile_registry::{OciGrammar, OciReference};

/// Arguments for the parse-ref command.
#[derive(Args)]
pub struct ParseRefArgs {
    /// Image reference (e.g. `ghcr.io/owner/repo:v1.0.0`)
    pub reference: String,

    /// Path to the configuration file (YAML), for registry defaults
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the parsed reference as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the parse-ref command.
///
/// # Errors
///
/// Returns an error if the reference is malformed.
pub fn run(args: &ParseRefArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let grammar = OciGrammar::from(&config.registries.oci);
    let reference = grammar
        .parse(&args.reference)
        .with_context(|| format!("Invalid reference '{}'", args.reference))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reference)?);
    } else {
        print!("{}", describe(&reference));
    }
    Ok(())
}

fn describe(reference: &OciReference) -> String {
    let mut out = String::new();
    out.push_str(&format!("Reference:  {reference}\n"));
    out.push_str(&format!("Registry:   {}\n", reference.registry));
    out.push_str(&format!("Namespace:  {}\n", reference.namespace));
    out.push_str(&format!("Image:      {}\n", reference.image));
    if !reference.tag.is_empty() {
        out.push_str(&format!("Tag:        {}\n", reference.tag));
    }
    if let Some(digest) = &reference.digest {
        out.push_str(&format!("Digest:     {digest}\n"));
    }
    out.push_str(&format!(
        "Manifest:   {}\n",
        reference.manifest_url(&reference.api_base_url())
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_short_form() {
        let reference = OciReference::parse("postgres:16").unwrap();
        let text = describe(&reference);

        assert!(text.contains("Registry:   docker.io\n"));
        assert!(text.contains("Namespace:  library\n"));
        assert!(text.contains("Tag:        16\n"));
        assert!(!text.contains("Digest"));
        assert!(text.contains("https://registry-1.docker.io/v2/library/postgres/manifests/16"));
    }

    #[test]
    fn test_invalid_reference() {
        let args = ParseRefArgs {
            reference: "ghcr.io/owner/repo".to_string(),
            config: None,
            json: false,
        };
        let err = run(&args).unwrap_err();
        assert!(format!("{err:#}").contains("OCI reference must include either a tag or digest"));
    }

    #[test]
    fn test_custom_default_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("turnstile.yaml");
        std::fs::write(
            &config,
            "registries:\n  oci:\n    default_registry: ghcr.io\n    default_namespace: acme\n",
        )
        .unwrap();

        let args = ParseRefArgs {
            reference: "weather:1.0".to_string(),
            config: Some(config),
            json: true,
        };
        run(&args).unwrap();
    }
}
