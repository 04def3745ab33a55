//! Admission states.

use std::fmt;

use serde::Serialize;

/// Where an admission is in its lifecycle.
///
/// ```text
/// Start -> Authenticating -> Authenticated -> ValidatingPackages -> Accepted
///                    \                               \
///                     +-> Rejected                    +-> Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    /// Nothing has run yet.
    Start,

    /// Ownership proof is being checked.
    Authenticating,

    /// A grant covering the server was issued.
    Authenticated,

    /// Declared packages are being validated.
    ValidatingPackages,

    /// Every package passed.
    Accepted,

    /// Authentication or a package failed.
    Rejected,
}

impl AdmissionState {
    /// Returns true if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Returns true if `next` may follow this state.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::Authenticating)
                | (Self::Authenticating, Self::Authenticated | Self::Rejected)
                | (Self::Authenticated, Self::ValidatingPackages)
                | (Self::ValidatingPackages, Self::Accepted | Self::Rejected)
        )
    }

    /// Returns a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::ValidatingPackages => "validating_packages",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state of one admission and the path it took.
#[derive(Debug, Clone)]
pub(crate) struct StateTracker {
    request_id: String,
    path: Vec<AdmissionState>,
}

impl StateTracker {
    pub(crate) fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            path: vec![AdmissionState::Start],
        }
    }

    pub(crate) fn current(&self) -> AdmissionState {
        self.path
            .last()
            .copied()
            .unwrap_or(AdmissionState::Start)
    }

    /// Moves to `next`. Invalid transitions are a bug in the pipeline and
    /// are logged and ignored.
    pub(crate) fn advance(&mut self, next: AdmissionState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            tracing::error!(
                request_id = %self.request_id,
                from = %current,
                to = %next,
                "invalid admission state transition"
            );
            return;
        }
        tracing::debug!(request_id = %self.request_id, from = %current, to = %next, "admission state");
        self.path.push(next);
    }

    pub(crate) fn into_path(self) -> Vec<AdmissionState> {
        self.path
    }
}
