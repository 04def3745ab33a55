//! Short-lived authentication grants.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::namespace::{Namespace, ServerName};

/// The result of a successful authentication.
///
/// A grant scopes what one publish request may act on. It is owned by the
/// admission call that produced it and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthGrant {
    /// Namespace (or namespace prefix) the caller proved control of.
    pub namespace: Namespace,

    /// Dispatch key of the strategy that issued the grant.
    pub method: String,

    /// Authenticated subject (login, repository, token subject, domain).
    pub subject: String,

    /// When the grant was issued.
    pub issued_at: DateTime<Utc>,

    /// When the grant stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl AuthGrant {
    /// Issues a grant valid for `ttl` from now.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use turnstile_core::{AuthGrant, Namespace};
    ///
    /// let grant = AuthGrant::issue(
    ///     Namespace::parse("com.example").unwrap(),
    ///     "dns",
    ///     "example.com",
    ///     Duration::from_secs(300),
    /// );
    /// assert!(!grant.is_expired());
    /// ```
    #[must_use]
    pub fn issue(
        namespace: Namespace,
        method: impl Into<String>,
        subject: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let issued_at = Utc::now();
        let ttl = TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::minutes(5));
        Self {
            namespace,
            method: method.into(),
            subject: subject.into(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// Returns true if the grant has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the grant has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the grant covers `namespace`.
    #[must_use]
    pub fn covers(&self, namespace: &Namespace) -> bool {
        self.namespace.covers(namespace)
    }

    /// Returns true if the grant permits publishing `server`.
    #[must_use]
    pub fn permits(&self, server: &ServerName) -> bool {
        self.covers(server.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(ns: &str) -> AuthGrant {
        AuthGrant::issue(
            Namespace::parse(ns).unwrap(),
            "github_at",
            "octocat",
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_issue_sets_window() {
        let g = grant("io.github.octocat");
        assert_eq!(g.expires_at - g.issued_at, TimeDelta::seconds(300));
        assert!(!g.is_expired());
        assert!(g.is_expired_at(g.expires_at));
    }

    #[test]
    fn test_permits_servers_under_namespace() {
        let g = grant("io.github.octocat");
        assert!(g.permits(&ServerName::parse("io.github.octocat/weather").unwrap()));
        assert!(!g.permits(&ServerName::parse("io.github.other/weather").unwrap()));
    }
}
