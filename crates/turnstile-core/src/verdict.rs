//! Per-package validation verdicts.
//!
//! Validation reports one verdict per package. When several packages fail,
//! the earliest-declared failure decides the admission, regardless of which
//! check finished first.

use std::fmt;

use serde::Serialize;

use crate::error::{AdmissionError, ErrorCategory};
use crate::package::{PackageDeclaration, RegistryType};

/// Outcome of validating one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerdictOutcome {
    /// The package passed every rule.
    Accepted,

    /// The package violated a rule.
    Rejected {
        /// Category of the first violated rule.
        category: ErrorCategory,
        /// Reason for the first violated rule.
        reason: String,
    },
}

/// The verdict for one declared package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    /// Position of the package in the manifest.
    pub index: usize,

    /// Registry type of the package.
    pub registry_type: RegistryType,

    /// Declared identifier.
    pub identifier: String,

    /// Accept or reject.
    #[serde(flatten)]
    pub outcome: VerdictOutcome,
}

impl ValidationVerdict {
    /// Creates an accepting verdict.
    #[must_use]
    pub fn accepted(index: usize, package: &PackageDeclaration) -> Self {
        Self {
            index,
            registry_type: package.registry_type,
            identifier: package.identifier.clone(),
            outcome: VerdictOutcome::Accepted,
        }
    }

    /// Creates a rejecting verdict from the error that rejected the package.
    #[must_use]
    pub fn rejected(index: usize, package: &PackageDeclaration, error: &AdmissionError) -> Self {
        Self {
            index,
            registry_type: package.registry_type,
            identifier: package.identifier.clone(),
            outcome: VerdictOutcome::Rejected {
                category: error.category(),
                reason: error.message().to_string(),
            },
        }
    }

    /// Builds a verdict from a validation result.
    #[must_use]
    pub fn from_result(
        index: usize,
        package: &PackageDeclaration,
        result: &Result<(), AdmissionError>,
    ) -> Self {
        match result {
            Ok(()) => Self::accepted(index, package),
            Err(e) => Self::rejected(index, package, e),
        }
    }

    /// Returns true if the package was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.outcome, VerdictOutcome::Accepted)
    }

    /// Returns the rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            VerdictOutcome::Accepted => None,
            VerdictOutcome::Rejected { reason, .. } => Some(reason),
        }
    }

    /// Returns the rejection category, if any.
    #[must_use]
    pub const fn category(&self) -> Option<ErrorCategory> {
        match &self.outcome {
            VerdictOutcome::Accepted => None,
            VerdictOutcome::Rejected { category, .. } => Some(*category),
        }
    }
}

impl fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            VerdictOutcome::Accepted => write!(
                f,
                "package {} ({} '{}'): accepted",
                self.index, self.registry_type, self.identifier
            ),
            VerdictOutcome::Rejected { reason, .. } => write!(
                f,
                "package {} ({} '{}'): {reason}",
                self.index, self.registry_type, self.identifier
            ),
        }
    }
}

/// An ordered collection of verdicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Verdicts {
    verdicts: Vec<ValidationVerdict>,
}

impl Verdicts {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a verdict.
    pub fn add(&mut self, verdict: ValidationVerdict) {
        self.verdicts.push(verdict);
    }

    /// Returns true if there are no verdicts.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Returns the number of verdicts.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.verdicts.len()
    }

    /// Returns an iterator over the verdicts.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationVerdict> {
        self.verdicts.iter()
    }

    /// Returns the verdicts as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ValidationVerdict] {
        &self.verdicts
    }

    /// Returns true if every verdict accepts.
    #[must_use]
    pub fn all_accepted(&self) -> bool {
        self.verdicts.iter().all(ValidationVerdict::is_accepted)
    }

    /// Returns the rejection with the lowest declaration index.
    #[must_use]
    pub fn first_rejection(&self) -> Option<&ValidationVerdict> {
        self.verdicts
            .iter()
            .filter(|v| !v.is_accepted())
            .min_by_key(|v| v.index)
    }
}

impl IntoIterator for Verdicts {
    type Item = ValidationVerdict;
    type IntoIter = std::vec::IntoIter<ValidationVerdict>;

    fn into_iter(self) -> Self::IntoIter {
        self.verdicts.into_iter()
    }
}

impl FromIterator<ValidationVerdict> for Verdicts {
    fn from_iter<T: IntoIterator<Item = ValidationVerdict>>(iter: T) -> Self {
        let mut verdicts: Vec<_> = iter.into_iter().collect();
        verdicts.sort_by_key(|v| v.index);
        Self { verdicts }
    }
}
