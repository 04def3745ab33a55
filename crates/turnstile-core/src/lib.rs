//! # Turnstile Core
//!
//! Core types for the Turnstile publish-admission gate.
//!
//! A registry entry is admitted in two steps: the submitter proves control of
//! a namespace, then every package the entry declares is validated. This
//! crate holds the data model shared by both steps:
//!
//! - [`Namespace`] and [`ServerName`] - reverse-DNS ownership domains
//! - [`AuthProof`] and [`AuthGrant`] - proof material in, short-lived grant out
//! - [`PackageDeclaration`], [`ServerManifest`], [`PublishRequest`] - request inputs
//! - [`ValidationVerdict`] - per-package accept/reject outcome
//! - [`AdmissionError`] - the error taxonomy every component reports through
//! - [`AdmissionConfig`] - operator configuration for all components
//!
//! ## Example
//!
//! ```rust
//! use turnstile_core::{Namespace, ServerName};
//!
//! let ns = Namespace::parse("io.github.octocat").unwrap();
//! let server = ServerName::parse("io.github.octocat/weather").unwrap();
//! assert!(ns.covers(server.namespace()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod grant;
pub mod namespace;
pub mod package;
pub mod proof;
pub mod verdict;

#[cfg(test)]
mod proptest_tests;

pub use config::{
    AdmissionConfig, AnonymousConfig, AuthConfig, DnsChallengeConfig, GitHubConfig,
    GitHubOidcConfig, HttpChallengeConfig, JwksConfig, OciConfig, OidcProviderConfig,
    PipelineConfig, RegistriesConfig, ValidationMode,
};
pub use error::{AdmissionError, ErrorCategory, Result};
pub use grant::AuthGrant;
pub use namespace::{Namespace, ServerName};
pub use package::{PackageDeclaration, PublishRequest, RegistryType, ServerManifest};
pub use proof::{AuthMethod, AuthProof};
pub use verdict::{ValidationVerdict, VerdictOutcome, Verdicts};
