//! # Turnstile Admission
//!
//! The publish-admission gate: authenticate the submitter, then validate
//! every package the entry declares.
//!
//! ```text
//!   PublishRequest
//!         │
//!         ▼
//!  ┌──────────────┐   unknown method / bad proof / server outside grant
//!  │ AuthRegistry │──────────────────────────────────────────────▶ Err
//!  └──────┬───────┘
//!         │ AuthGrant
//!         ▼
//!  ┌──────────────┐
//!  │ ValidatorSet │  one verdict per package, earliest failure decides
//!  └──────┬───────┘
//!         ▼
//!   AdmissionReport ──▶ outcome() for the caller's telemetry
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use turnstile_admission::AdmissionPipeline;
//! use turnstile_core::{AdmissionConfig, PublishRequest};
//!
//! # async fn run(request: PublishRequest) -> turnstile_core::Result<()> {
//! let pipeline = AdmissionPipeline::from_config(&AdmissionConfig::default())?;
//! let report = pipeline.admit(&request).await?;
//! for verdict in report.verdicts.iter() {
//!     println!("{verdict}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod pipeline;
mod report;
mod state;

pub use pipeline::AdmissionPipeline;
pub use report::{new_request_id, AdmissionOutcome, AdmissionReport, Decision, OutcomeStatus};
pub use state::AdmissionState;
