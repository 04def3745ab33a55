//! Reverse-DNS namespaces and server names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AdmissionError, Result};

/// A dotted, reverse-DNS ownership domain such as `io.github.octocat` or
/// `com.example`.
///
/// Namespaces are case-sensitive. Every label is non-empty and consists of
/// ASCII alphanumerics, `-` or `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Parses a namespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_core::Namespace;
    ///
    /// let ns = Namespace::parse("com.example").unwrap();
    /// assert_eq!(ns.to_domain(), "example.com");
    ///
    /// assert!(Namespace::parse("").is_err());
    /// assert!(Namespace::parse("com..example").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a format error if the namespace is empty or malformed.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(AdmissionError::format("namespace cannot be empty"));
        }

        for label in raw.split('.') {
            if label.is_empty() {
                return Err(AdmissionError::format(format!(
                    "invalid namespace '{raw}': empty label"
                )));
            }
            if let Some(c) = label
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
            {
                return Err(AdmissionError::format(format!(
                    "invalid namespace '{raw}': unexpected character '{c}'"
                )));
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// Returns the namespace string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the dot-separated labels.
    pub fn labels(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.split('.')
    }

    /// Returns true if `other` equals this namespace or is a dotted child of
    /// it. `com.example` covers `com.example.api` but not `com.examples`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.0 == self.0
            || other
                .0
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Returns the DNS domain this namespace names, with labels reversed.
    #[must_use]
    pub fn to_domain(&self) -> String {
        self.labels().rev().collect::<Vec<_>>().join(".")
    }

    /// Appends a label, producing a child namespace.
    ///
    /// # Errors
    ///
    /// Returns a format error if the label is not a valid namespace label.
    pub fn child(&self, label: &str) -> Result<Self> {
        Self::parse(&format!("{}.{label}", self.0))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = AdmissionError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

/// A server name of the form `<namespace>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerName {
    namespace: Namespace,
    name: String,
}

impl ServerName {
    /// Parses a server name.
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_core::ServerName;
    ///
    /// let server = ServerName::parse("io.github.octocat/weather").unwrap();
    /// assert_eq!(server.namespace().as_str(), "io.github.octocat");
    /// assert_eq!(server.name(), "weather");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a format error unless the input has exactly one `/` separating
    /// a valid namespace from a non-empty name.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || {
            AdmissionError::format(format!(
                "invalid server name '{raw}': expected '<namespace>/<name>'"
            ))
        };

        let (ns, name) = raw.split_once('/').ok_or_else(invalid)?;
        if name.is_empty() || name.contains('/') || name.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let namespace = Namespace::parse(ns).map_err(|_| invalid())?;

        Ok(Self {
            namespace,
            name: name.to_string(),
        })
    }

    /// Returns the namespace part.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the name part.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
