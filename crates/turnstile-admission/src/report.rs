//! Admission results and their telemetry summary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use turnstile_core::{AdmissionError, AuthGrant, ErrorCategory, ValidationVerdict, Verdicts};
use uuid::{Timestamp, Uuid};

use crate::state::AdmissionState;

/// Generates a new v7 request id.
#[must_use]
pub fn new_request_id() -> Uuid {
    Uuid::new_v7(Timestamp::now(uuid::NoContext))
}

/// Final decision for an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// Every declared package passed.
    Accepted,

    /// The earliest-declared failing package.
    Rejected {
        /// Declaration index of the failing package.
        index: usize,
        /// Category of the failure.
        category: ErrorCategory,
        /// Reason for the failure.
        reason: String,
    },
}

impl Decision {
    /// Derives the decision from a set of verdicts.
    #[must_use]
    pub fn from_verdicts(verdicts: &Verdicts) -> Self {
        match verdicts.first_rejection() {
            None => Self::Accepted,
            Some(v) => Self::Rejected {
                index: v.index,
                category: v.category().unwrap_or(ErrorCategory::Policy),
                reason: v.reason().unwrap_or_default().to_string(),
            },
        }
    }

    /// Returns true if the request was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Result of an admission that got past authentication.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionReport {
    /// Request id.
    pub request_id: Uuid,

    /// Grant issued by the strategy.
    pub grant: AuthGrant,

    /// Server name from the manifest.
    pub server: String,

    /// Per-package verdicts in declaration order. In sequential mode this
    /// stops at the first rejection.
    pub verdicts: Verdicts,

    /// Accept or reject.
    #[serde(flatten)]
    pub decision: Decision,

    /// States the admission passed through.
    pub states: Vec<AdmissionState>,

    /// Number of packages declared.
    pub package_count: usize,

    /// Time spent admitting.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl AdmissionReport {
    /// Returns true if the request was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }

    /// Returns the verdict that decided a rejection.
    #[must_use]
    pub fn rejection(&self) -> Option<&ValidationVerdict> {
        self.verdicts.first_rejection()
    }

    /// Returns the final state.
    #[must_use]
    pub fn final_state(&self) -> AdmissionState {
        self.states
            .last()
            .copied()
            .unwrap_or(AdmissionState::Start)
    }

    /// Summarizes the admission for telemetry.
    #[must_use]
    pub fn outcome(&self) -> AdmissionOutcome {
        let failure_category = match &self.decision {
            Decision::Accepted => None,
            Decision::Rejected { category, .. } => Some(*category),
        };
        AdmissionOutcome {
            request_id: self.request_id,
            timestamp: Utc::now(),
            status: if self.is_accepted() {
                OutcomeStatus::Accepted
            } else {
                OutcomeStatus::Rejected
            },
            method: Some(self.grant.method.clone()),
            namespace: Some(self.grant.namespace.to_string()),
            failure_category,
            package_count: self.package_count,
            elapsed_ms: duration_ms(self.elapsed),
        }
    }
}

/// Accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The entry may be published.
    Accepted,
    /// The entry must not be published.
    Rejected,
}

/// Structured summary of one admission, for the caller to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionOutcome {
    /// Request id.
    pub request_id: Uuid,

    /// When the summary was taken.
    pub timestamp: DateTime<Utc>,

    /// Accepted or rejected.
    pub status: OutcomeStatus,

    /// Strategy used, if authentication reached a strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Granted namespace, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Category of the deciding failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_category: Option<ErrorCategory>,

    /// Number of packages declared.
    pub package_count: usize,

    /// Time spent admitting, in milliseconds.
    pub elapsed_ms: u64,
}

impl AdmissionOutcome {
    /// Summarizes an admission that failed before producing a report.
    #[must_use]
    pub fn from_error(
        request_id: Uuid,
        method: &str,
        package_count: usize,
        error: &AdmissionError,
        elapsed: Duration,
    ) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            status: OutcomeStatus::Rejected,
            method: Some(method.to_string()),
            namespace: None,
            failure_category: Some(error.category()),
            package_count,
            elapsed_ms: duration_ms(elapsed),
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
