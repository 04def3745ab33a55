//! Operator configuration for the admission gate.
//!
//! Every section has working defaults, so an empty YAML document is a valid
//! configuration. Timeouts are stored as plain integers for readable config
//! files and exposed as [`Duration`] through accessors.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdmissionError, Result};

/// Issuer of GitHub Actions OIDC tokens.
pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Authentication strategies.
    pub auth: AuthConfig,

    /// Package validators.
    pub registries: RegistriesConfig,

    /// Pipeline behavior.
    pub pipeline: PipelineConfig,
}

impl AdmissionConfig {
    /// Parses a configuration from YAML.
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_core::AdmissionConfig;
    ///
    /// let config = AdmissionConfig::from_yaml_str("auth:\n  grant_ttl_secs: 60\n").unwrap();
    /// assert_eq!(config.auth.grant_ttl_secs, 60);
    /// assert!(config.auth.anonymous.enabled);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the YAML is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AdmissionError::config(format!("invalid configuration: {e}")))
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            AdmissionError::config(format!(
                "failed to read configuration {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Sets the auth section.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the registries section.
    #[must_use]
    pub fn with_registries(mut self, registries: RegistriesConfig) -> Self {
        self.registries = registries;
        self
    }

    /// Sets the pipeline section.
    #[must_use]
    pub const fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Validity window of issued grants, in seconds.
    pub grant_ttl_secs: u64,

    /// GitHub access-token strategy.
    pub github: GitHubConfig,

    /// GitHub Actions OIDC strategy.
    pub github_oidc: GitHubOidcConfig,

    /// Operator-defined OIDC providers.
    pub oidc_providers: Vec<OidcProviderConfig>,

    /// DNS challenge strategy.
    pub dns: DnsChallengeConfig,

    /// HTTP challenge strategy.
    pub http: HttpChallengeConfig,

    /// Anonymous strategy.
    pub anonymous: AnonymousConfig,

    /// Key-set cache.
    pub jwks: JwksConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            grant_ttl_secs: 300,
            github: GitHubConfig::default(),
            github_oidc: GitHubOidcConfig::default(),
            oidc_providers: Vec::new(),
            dns: DnsChallengeConfig::default(),
            http: HttpChallengeConfig::default(),
            anonymous: AnonymousConfig::default(),
            jwks: JwksConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Returns the grant validity window.
    #[must_use]
    pub const fn grant_ttl(&self) -> Duration {
        Duration::from_secs(self.grant_ttl_secs)
    }

    /// Adds an OIDC provider.
    #[must_use]
    pub fn with_oidc_provider(mut self, provider: OidcProviderConfig) -> Self {
        self.oidc_providers.push(provider);
        self
    }

    /// Looks up an OIDC provider by name.
    #[must_use]
    pub fn oidc_provider(&self, name: &str) -> Option<&OidcProviderConfig> {
        self.oidc_providers.iter().find(|p| p.name == name)
    }
}

/// GitHub access-token strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Whether the strategy is registered.
    pub enabled: bool,

    /// GitHub REST API origin.
    pub api_base_url: String,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base_url: "https://api.github.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl GitHubConfig {
    /// Sets the API origin.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// GitHub Actions OIDC strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubOidcConfig {
    /// Whether the strategy is registered.
    pub enabled: bool,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Key set URL.
    pub jwks_url: String,

    /// Expected `aud` claim.
    pub audience: String,
}

impl Default for GitHubOidcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            issuer: GITHUB_ACTIONS_ISSUER.to_string(),
            jwks_url: format!("{GITHUB_ACTIONS_ISSUER}/.well-known/jwks"),
            audience: "turnstile".to_string(),
        }
    }
}

/// A configured OIDC provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcProviderConfig {
    /// Provider name referenced by proofs.
    pub name: String,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Key set URL.
    pub jwks_url: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// Claim whose value names the granted namespace.
    #[serde(default = "default_namespace_claim")]
    pub namespace_claim: String,

    /// Prefix joined in front of the claim value with a `.`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_prefix: Option<String>,
}

fn default_namespace_claim() -> String {
    "sub".to_string()
}

impl OidcProviderConfig {
    /// Creates a provider that maps the `sub` claim to the namespace.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        issuer: impl Into<String>,
        jwks_url: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            issuer: issuer.into(),
            jwks_url: jwks_url.into(),
            audience: audience.into(),
            namespace_claim: default_namespace_claim(),
            namespace_prefix: None,
        }
    }

    /// Sets the namespace claim.
    #[must_use]
    pub fn with_namespace_claim(mut self, claim: impl Into<String>) -> Self {
        self.namespace_claim = claim.into();
        self
    }

    /// Sets the namespace prefix.
    #[must_use]
    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = Some(prefix.into());
        self
    }
}

/// DNS challenge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsChallengeConfig {
    /// Whether the strategy is registered.
    pub enabled: bool,

    /// Label prepended to the claimed domain for the TXT lookup.
    pub record_prefix: String,

    /// Prefix of the expected TXT value; the token follows it.
    pub value_prefix: String,

    /// Per-attempt timeout, in milliseconds.
    pub timeout_ms: u64,

    /// Retries after a transient failure.
    pub retries: u32,

    /// Delay between retries, in milliseconds.
    pub retry_backoff_ms: u64,

    /// Nameserver address (e.g. `8.8.8.8:53`). System resolver when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
}

impl Default for DnsChallengeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            record_prefix: "_registry-auth".to_string(),
            value_prefix: "registry-verification=".to_string(),
            timeout_ms: 5_000,
            retries: 2,
            retry_backoff_ms: 200,
            nameserver: None,
        }
    }
}

impl DnsChallengeConfig {
    /// Returns the per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the retry backoff.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Returns the record name queried for `domain`.
    #[must_use]
    pub fn record_name(&self, domain: &str) -> String {
        format!("{}.{domain}", self.record_prefix)
    }

    /// Returns the TXT value expected for `token`.
    #[must_use]
    pub fn expected_value(&self, token: &str) -> String {
        format!("{}{token}", self.value_prefix)
    }
}

/// HTTP challenge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpChallengeConfig {
    /// Whether the strategy is registered.
    pub enabled: bool,

    /// Path fetched on the claimed domain.
    pub well_known_path: String,

    /// Prefix of the expected body line; the token follows it.
    pub value_prefix: String,

    /// Request timeout, in seconds.
    pub timeout_secs: u64,

    /// Maximum redirects followed.
    pub max_redirects: usize,
}

impl Default for HttpChallengeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            well_known_path: "/.well-known/registry-auth".to_string(),
            value_prefix: "registry-verification=".to_string(),
            timeout_secs: 10,
            max_redirects: 3,
        }
    }
}

impl HttpChallengeConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the URL fetched for `domain`.
    #[must_use]
    pub fn challenge_url(&self, domain: &str) -> String {
        let path = self.well_known_path.trim_start_matches('/');
        format!("https://{domain}/{path}")
    }

    /// Returns the body line expected for `token`.
    #[must_use]
    pub fn expected_value(&self, token: &str) -> String {
        format!("{}{token}", self.value_prefix)
    }
}

/// Anonymous strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymousConfig {
    /// Whether the strategy is registered.
    pub enabled: bool,

    /// The only namespace anonymous publishing may use.
    pub namespace_prefix: String,
}

impl Default for AnonymousConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace_prefix: "io.modelcontextprotocol.anonymous".to_string(),
        }
    }
}

/// Key-set cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwksConfig {
    /// Age after which a cached key set is refreshed, in seconds.
    pub refresh_interval_secs: u64,

    /// Minimum age before an unknown key id forces a refresh, in seconds.
    pub min_refresh_interval_secs: u64,

    /// Key-set fetch timeout, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 3_600,
            min_refresh_interval_secs: 60,
            fetch_timeout_secs: 10,
        }
    }
}

impl JwksConfig {
    /// Returns the refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Returns the minimum forced-refresh interval.
    #[must_use]
    pub const fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    /// Returns the fetch timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Package validator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistriesConfig {
    /// Timeout for each reachability probe or index lookup, in seconds.
    pub probe_timeout_secs: u64,

    /// OCI grammar defaults and allowed hosts.
    pub oci: OciConfig,

    /// npm registry origin.
    pub npm_base_url: String,

    /// PyPI origin.
    pub pypi_base_url: String,

    /// NuGet API origin.
    pub nuget_base_url: String,
}

impl Default for RegistriesConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            oci: OciConfig::default(),
            npm_base_url: "https://registry.npmjs.org".to_string(),
            pypi_base_url: "https://pypi.org".to_string(),
            nuget_base_url: "https://api.nuget.org".to_string(),
        }
    }
}

impl RegistriesConfig {
    /// Returns the probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Sets the probe timeout.
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_secs = timeout.as_secs();
        self
    }
}

/// OCI grammar defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OciConfig {
    /// Registry used when a reference names none.
    pub default_registry: String,

    /// Namespace used when a reference names none.
    pub default_namespace: String,

    /// Registries images may be published from.
    pub allowed_registries: Vec<String>,
}

impl Default for OciConfig {
    fn default() -> Self {
        Self {
            default_registry: "docker.io".to_string(),
            default_namespace: "library".to_string(),
            allowed_registries: vec!["docker.io".to_string(), "ghcr.io".to_string()],
        }
    }
}

/// How package declarations are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// One at a time, stopping at the first rejection.
    #[default]
    Sequential,
    /// All at once, reporting the earliest-declared rejection.
    Concurrent,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Package evaluation mode.
    pub validation_mode: ValidationMode,

    /// Deadline for a whole admission, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl PipelineConfig {
    /// Returns the admission deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Sets the validation mode.
    #[must_use]
    pub const fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    /// Sets the admission deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AdmissionConfig::default();
        assert_eq!(config.auth.grant_ttl(), Duration::from_secs(300));
        assert_eq!(config.auth.github.api_base_url, "https://api.github.com");
        assert_eq!(config.auth.github_oidc.issuer, GITHUB_ACTIONS_ISSUER);
        assert_eq!(config.registries.oci.default_registry, "docker.io");
        assert_eq!(config.pipeline.validation_mode, ValidationMode::Sequential);
        assert!(config.pipeline.deadline().is_none());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = AdmissionConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, AdmissionConfig::default());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r"
auth:
  anonymous:
    enabled: false
  oidc_providers:
    - name: corp
      issuer: https://id.corp.example
      jwks_url: https://id.corp.example/jwks
      audience: registry
      namespace_prefix: com.corp
pipeline:
  validation_mode: concurrent
  deadline_ms: 30000
";
        let config = AdmissionConfig::from_yaml_str(yaml).unwrap();
        assert!(!config.auth.anonymous.enabled);
        let corp = config.auth.oidc_provider("corp").unwrap();
        assert_eq!(corp.namespace_claim, "sub");
        assert_eq!(corp.namespace_prefix.as_deref(), Some("com.corp"));
        assert_eq!(config.pipeline.validation_mode, ValidationMode::Concurrent);
        assert_eq!(config.pipeline.deadline(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_sub_second_deadline() {
        let pipeline = PipelineConfig::default().with_deadline(Duration::from_millis(250));
        assert_eq!(pipeline.deadline(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = AdmissionConfig::from_yaml_str("auth: [").unwrap_err();
        assert!(matches!(err, AdmissionError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "registries:\n  probe_timeout_secs: 3").unwrap();
        let config = AdmissionConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.registries.probe_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = AdmissionConfig::from_yaml_file("/nonexistent/turnstile.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read configuration"));
    }

    #[test]
    fn test_challenge_templates() {
        let dns = DnsChallengeConfig::default();
        assert_eq!(dns.record_name("example.com"), "_registry-auth.example.com");
        assert_eq!(dns.expected_value("abc"), "registry-verification=abc");

        let http = HttpChallengeConfig::default();
        assert_eq!(
            http.challenge_url("example.com"),
            "https://example.com/.well-known/registry-auth"
        );
    }
}
