//! Admit command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use turnstile_admission::{AdmissionOutcome, AdmissionPipeline, AdmissionReport};
use turnstile_core::{PublishRequest, ValidationMode};

/// Package validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One package at a time, stopping at the first rejection
    Sequential,
    /// All packages at once
    Concurrent,
}

impl From<ModeArg> for ValidationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sequential => Self::Sequential,
            ModeArg::Concurrent => Self::Concurrent,
        }
    }
}

/// Arguments for the admit command.
#[derive(Args)]
pub struct AdmitArgs {
    /// Path to the publish request (JSON)
    pub request: PathBuf,

    /// Path to the configuration file (YAML)
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured validation mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the admit command.
///
/// # Errors
///
/// Returns an error if the request cannot be read, authentication fails, or
/// any package is rejected.
pub async fn run(args: &AdmitArgs) -> Result<()> {
    info!(request = ?args.request, "Admitting publish request");

    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.pipeline = config.pipeline.with_validation_mode(mode.into());
    }

    let request = read_request(&args.request)?;
    let pipeline =
        AdmissionPipeline::from_config(&config).context("Failed to build admission pipeline")?;

    let request_id = turnstile_admission::new_request_id();
    let started = std::time::Instant::now();
    let report = match pipeline.admit_with_id(request_id, &request).await {
        Ok(report) => report,
        Err(e) => {
            let outcome = AdmissionOutcome::from_error(
                request_id,
                request.auth.method(),
                request.manifest.packages.len(),
                &e,
                started.elapsed(),
            );
            emit(&outcome);
            return Err(e).context("Authentication failed");
        }
    };
    emit(&report.outcome());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_accepted() {
        anyhow::bail!("Publish request rejected");
    }
    Ok(())
}

fn read_request(path: &Path) -> Result<PublishRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse request in {}", path.display()))
}

fn emit(outcome: &AdmissionOutcome) {
    info!(
        request_id = %outcome.request_id,
        status = ?outcome.status,
        method = outcome.method.as_deref().unwrap_or("-"),
        failure_category = outcome.failure_category.map_or("-", |c| c.as_str()),
        packages = outcome.package_count,
        elapsed_ms = outcome.elapsed_ms,
        "admission outcome"
    );
}

fn print_report(report: &AdmissionReport) {
    println!("Turnstile Admission");
    println!("===================");
    println!("Request:   {}", report.request_id);
    println!("Server:    {}", report.server);
    println!(
        "Granted:   {} (via {}, subject {})",
        report.grant.namespace, report.grant.method, report.grant.subject
    );
    println!();

    for verdict in report.verdicts.iter() {
        let mark = if verdict.is_accepted() { "✓" } else { "✗" };
        println!("{mark} {verdict}");
    }
    let skipped = report.package_count - report.verdicts.len();
    if skipped > 0 {
        println!("  ({skipped} package(s) not checked)");
    }

    println!();
    if report.is_accepted() {
        println!("✓ Accepted");
    } else {
        println!("✗ Rejected");
    }
}
