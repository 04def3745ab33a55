//! OCI image reference grammar and Distribution API types.
//!
//! References are parsed into registry, namespace, image, tag and digest
//! components. Short forms expand against the grammar defaults, so
//! `postgres:16` becomes `docker.io/library/postgres:16`.

use std::fmt;

use serde::{Deserialize, Serialize};
use turnstile_core::{AdmissionError, OciConfig, Result};

/// Registry used when a reference names none.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Namespace used when a reference names none.
pub const DEFAULT_NAMESPACE: &str = "library";

/// Manifest media types accepted when checking an image.
pub struct MediaType;

impl MediaType {
    /// OCI image manifest.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// Docker image manifest, schema 2.
    pub const DOCKER_MANIFEST: &'static str =
        "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker manifest list.
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Value for the `Accept` header of manifest requests.
    #[must_use]
    pub fn manifest_accept() -> String {
        [
            Self::OCI_INDEX,
            Self::OCI_MANIFEST,
            Self::DOCKER_MANIFEST_LIST,
            Self::DOCKER_MANIFEST,
        ]
        .join(", ")
    }
}

/// Defaults applied to short-form references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciGrammar {
    /// Registry used when a reference names none.
    pub default_registry: String,

    /// Namespace used when a reference names none.
    pub default_namespace: String,
}

impl Default for OciGrammar {
    fn default() -> Self {
        Self {
            default_registry: DEFAULT_REGISTRY.to_string(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl From<&OciConfig> for OciGrammar {
    fn from(config: &OciConfig) -> Self {
        Self {
            default_registry: config.default_registry.clone(),
            default_namespace: config.default_namespace.clone(),
        }
    }
}

impl OciGrammar {
    /// Parses a reference against these defaults.
    ///
    /// # Errors
    ///
    /// Returns a format error if the reference is empty, has a malformed
    /// digest, has an empty path segment, or has neither tag nor digest.
    pub fn parse(&self, raw: &str) -> Result<OciReference> {
        if raw.is_empty() {
            return Err(AdmissionError::format("OCI reference cannot be empty"));
        }

        let (main, digest) = match raw.split_once('@') {
            Some((main, digest)) => {
                validate_digest(digest)?;
                (main, Some(digest.to_string()))
            }
            None => (raw, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (path, tag) = match main.rfind(':') {
            Some(idx) if idx > 0 && !main[idx..].contains('/') => {
                (&main[..idx], Some(&main[idx + 1..]))
            }
            _ => (main, None),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AdmissionError::format(format!(
                "invalid OCI reference format: {raw}"
            )));
        }

        let (registry, namespace, image) = match segments.as_slice() {
            [image] => (
                self.default_registry.clone(),
                self.default_namespace.clone(),
                (*image).to_string(),
            ),
            [first, image] if first.contains('.') || first.contains(':') => (
                (*first).to_string(),
                self.default_namespace.clone(),
                (*image).to_string(),
            ),
            [namespace, image] => (
                self.default_registry.clone(),
                (*namespace).to_string(),
                (*image).to_string(),
            ),
            [registry, middle @ .., image] => (
                (*registry).to_string(),
                middle.join("/"),
                (*image).to_string(),
            ),
            [] => {
                return Err(AdmissionError::format(format!(
                    "invalid OCI reference format: {raw}"
                )))
            }
        };

        let tag = tag.filter(|t| !t.is_empty()).map(ToString::to_string);
        let tag = match (tag, &digest) {
            (Some(tag), _) => tag,
            (None, Some(_)) => "latest".to_string(),
            (None, None) => {
                return Err(AdmissionError::format(format!(
                    "OCI reference must include either a tag or digest: {raw}"
                )))
            }
        };

        Ok(OciReference {
            registry,
            namespace,
            image,
            tag,
            digest,
        })
    }
}

fn validate_digest(digest: &str) -> Result<()> {
    let Some(hex) = digest.strip_prefix("sha256:") else {
        return Err(AdmissionError::format(
            "invalid digest format: must start with 'sha256:'",
        ));
    };
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AdmissionError::format(
            "invalid digest format: must be sha256 followed by 64 hex characters",
        ));
    }
    Ok(())
}

/// A parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OciReference {
    /// Registry host, optionally with port (e.g. `ghcr.io`).
    pub registry: String,

    /// Repository namespace; may contain `/` for nested namespaces.
    pub namespace: String,

    /// Image name.
    pub image: String,

    /// Tag. `latest` when only a digest was given.
    pub tag: String,

    /// Content digest (`sha256:<hex>`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl OciReference {
    /// Parses a reference with the default grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_registry::OciReference;
    ///
    /// let r = OciReference::parse("postgres:16").unwrap();
    /// assert_eq!(r.to_string(), "docker.io/library/postgres:16");
    ///
    /// let r = OciReference::parse("ghcr.io/org/team/repo:v2.0.0").unwrap();
    /// assert_eq!(r.namespace, "org/team");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a format error if the reference is malformed.
    pub fn parse(raw: &str) -> Result<Self> {
        OciGrammar::default().parse(raw)
    }

    /// Returns the registry's web origin.
    #[must_use]
    pub fn base_url(&self) -> String {
        match self.registry.as_str() {
            "docker.io" | "registry.docker.io" | "index.docker.io" => {
                "https://docker.io".to_string()
            }
            "ghcr.io" => "https://ghcr.io".to_string(),
            host => format!("https://{host}"),
        }
    }

    /// Returns the Distribution API origin.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        if self.is_docker_hub() {
            "https://registry-1.docker.io".to_string()
        } else {
            self.base_url()
        }
    }

    /// Returns true if the registry is Docker Hub under any of its aliases.
    #[must_use]
    pub fn is_docker_hub(&self) -> bool {
        matches!(
            self.registry.as_str(),
            "docker.io" | "registry.docker.io" | "index.docker.io"
        )
    }

    /// Returns the repository path, `namespace/image`.
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.image)
    }

    /// Returns the digest when present, otherwise the tag.
    #[must_use]
    pub fn manifest_reference(&self) -> &str {
        self.digest.as_deref().unwrap_or(&self.tag)
    }

    /// Returns the manifest URL under `api_base`.
    #[must_use]
    pub fn manifest_url(&self, api_base: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            api_base.trim_end_matches('/'),
            self.repository(),
            self.manifest_reference()
        )
    }
}

impl fmt::Display for OciReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.registry, self.namespace, self.image)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// A `WWW-Authenticate: Bearer ...` challenge from a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint.
    pub realm: String,

    /// Service the token is issued for.
    pub service: Option<String>,

    /// Requested scope.
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parses a challenge header value. Returns `None` for non-Bearer
    /// challenges or when no realm is given.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }

    /// Returns the token URL with service and scope as query parameters.
    #[must_use]
    pub fn token_url(&self) -> Option<url::Url> {
        let mut url = url::Url::parse(&self.realm).ok()?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &self.service {
                query.append_pair("service", service);
            }
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
        }
        Some(url)
    }
}

/// Splits `k="v",k2="v,2"` into pairs, honoring quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = params.trim();
    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();
        let after = after.trim_start();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };
        pairs.push((key, value.to_string()));
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }
    pairs
}

/// Response from a registry token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token (Docker Hub).
    #[serde(default)]
    pub token: Option<String>,

    /// Bearer token (OAuth-style registries).
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    /// Returns whichever token field is populated.
    #[must_use]
    pub fn into_token(self) -> Option<String> {
        self.token
            .or(self.access_token)
            .filter(|t| !t.is_empty())
    }
}
