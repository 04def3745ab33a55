//! # Turnstile Registry
//!
//! Package reference grammars and per-registry validators for the Turnstile
//! admission gate.
//!
//! Each declared package is checked by the [`PackageValidator`] for its
//! registry type. Validators apply field rules in a fixed order and only
//! touch the network once every local rule passes:
//!
//! | type   | identifier            | network check                          |
//! |--------|-----------------------|----------------------------------------|
//! | `mcpb` | download URL          | `HEAD` (ranged `GET` fallback)         |
//! | `oci`  | image reference       | anonymous manifest `HEAD`              |
//! | `npm`  | package name          | version document `mcpName`             |
//! | `pypi` | project name          | release description `mcp-name:` marker |
//! | `nuget`| package id            | flat-container version listing         |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnstile_core::{PackageDeclaration, RegistriesConfig, RegistryType};
//! use turnstile_registry::ValidatorSet;
//!
//! # async fn run() -> turnstile_core::Result<()> {
//! let validators = ValidatorSet::from_config(&RegistriesConfig::default())?;
//! let package = PackageDeclaration::new(RegistryType::Oci, "ghcr.io/acme/weather:1.0.0");
//! validators.validate(&package, "io.github.acme/weather").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod mcpb;
mod npm;
mod nuget;
mod oci;
mod oci_validator;
mod probe;
mod pypi;
mod validator;

pub use error::ProbeError;
pub use index::{check_index_fields, IndexCoordinates};
pub use mcpb::McpbValidator;
pub use npm::NpmValidator;
pub use nuget::NuGetValidator;
pub use oci::{
    BearerChallenge, MediaType, OciGrammar, OciReference, TokenResponse, DEFAULT_NAMESPACE,
    DEFAULT_REGISTRY,
};
pub use oci_validator::OciValidator;
pub use probe::{build_http_client, fetch_json, user_agent, HttpProbe, ReachabilityProbe};
pub use pypi::PyPiValidator;
pub use validator::{PackageValidator, ValidatorSet};
