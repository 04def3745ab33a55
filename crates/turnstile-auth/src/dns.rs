//! DNS TXT challenge strategy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use turnstile_core::{
    AdmissionError, AuthGrant, AuthMethod, AuthProof, DnsChallengeConfig, Namespace, Result,
};

use crate::error::AuthError;
use crate::strategy::{unexpected_proof, AuthStrategy};

/// TXT record lookups.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Returns the TXT values published at `name`, each with its character
    /// strings concatenated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoRecords`] when the name has no TXT records and
    /// [`AuthError::DnsLookup`] for failures that may clear on retry.
    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, AuthError>;
}

/// Resolver backed by hickory.
pub struct HickoryTxtResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryTxtResolver {
    /// Creates a resolver using the system configuration, or the configured
    /// nameserver when one is set. Retries are left to the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the nameserver address does
    /// not parse.
    pub fn from_config(config: &DnsChallengeConfig) -> std::result::Result<Self, AuthError> {
        let resolver_config = match &config.nameserver {
            Some(addr) => {
                let addr: SocketAddr = addr.parse().map_err(|e| AuthError::InvalidConfig {
                    reason: format!("invalid DNS nameserver '{addr}': {e}"),
                })?;
                let mut resolver_config = ResolverConfig::new();
                resolver_config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
                resolver_config
            }
            None => ResolverConfig::default(),
        };

        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout();
        opts.attempts = 1;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

impl std::fmt::Debug for HickoryTxtResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryTxtResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, AuthError> {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.txt_data()
                        .iter()
                        .map(|part| String::from_utf8_lossy(part))
                        .collect::<String>()
                })
                .collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                Err(AuthError::NoRecords {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(AuthError::DnsLookup {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Proves control of `com.example` through a TXT record at
/// `_registry-auth.example.com` holding `registry-verification=<token>`.
pub struct DnsStrategy {
    resolver: Arc<dyn TxtResolver>,
    config: DnsChallengeConfig,
    grant_ttl: Duration,
}

impl std::fmt::Debug for DnsStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsStrategy")
            .field("config", &self.config)
            .field("grant_ttl", &self.grant_ttl)
            .finish_non_exhaustive()
    }
}

impl DnsStrategy {
    /// Creates the strategy over the given resolver.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn TxtResolver>,
        config: DnsChallengeConfig,
        grant_ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            config,
            grant_ttl,
        }
    }

    /// Looks up `name`, retrying transient failures with linear backoff.
    async fn lookup_with_retry(&self, name: &str) -> std::result::Result<Vec<String>, AuthError> {
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(self.config.timeout(), self.resolver.lookup_txt(name))
                .await
                .unwrap_or_else(|_| {
                    Err(AuthError::DnsLookup {
                        name: name.to_string(),
                        reason: "timed out".to_string(),
                    })
                });

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    tracing::warn!(name, attempt, error = %e, "retrying DNS lookup");
                    tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl AuthStrategy for DnsStrategy {
    fn method(&self) -> &str {
        AuthMethod::Dns.as_str()
    }

    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        let AuthProof::Dns { token } = proof else {
            return Err(unexpected_proof(self.method(), proof).into());
        };
        if token.trim().is_empty() {
            return Err(AdmissionError::format("DNS verification token cannot be empty"));
        }

        let domain = namespace.to_domain();
        let name = self.config.record_name(&domain);
        let expected = self.config.expected_value(token.trim());

        let verified = match self.lookup_with_retry(&name).await {
            Ok(records) => records.iter().any(|r| r.trim() == expected),
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "DNS lookup failed");
                false
            }
        };
        if !verified {
            return Err(AdmissionError::proof(format!(
                "DNS verification failed for '{domain}'"
            )));
        }

        Ok(AuthGrant::issue(
            namespace.clone(),
            self.method(),
            domain,
            self.grant_ttl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use turnstile_core::ErrorCategory;

    enum Behavior {
        Records(Vec<String>),
        NxDomain,
        FailThenRecords(u32, Vec<String>),
        Hang,
    }

    struct FakeResolver {
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl FakeResolver {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TxtResolver for FakeResolver {
        async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<String>, AuthError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Records(records) => Ok(records.clone()),
                Behavior::NxDomain => Err(AuthError::NoRecords {
                    name: name.to_string(),
                }),
                Behavior::FailThenRecords(failures, records) => {
                    if call < *failures {
                        Err(AuthError::DnsLookup {
                            name: name.to_string(),
                            reason: "SERVFAIL".to_string(),
                        })
                    } else {
                        Ok(records.clone())
                    }
                }
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn strategy(resolver: Arc<FakeResolver>) -> DnsStrategy {
        DnsStrategy::new(
            resolver,
            DnsChallengeConfig::default(),
            Duration::from_secs(300),
        )
    }

    fn proof(token: &str) -> AuthProof {
        AuthProof::Dns {
            token: token.to_string(),
        }
    }

    fn ns() -> Namespace {
        Namespace::parse("com.example").unwrap()
    }

    #[tokio::test]
    async fn test_matching_record() {
        let resolver = FakeResolver::new(Behavior::Records(vec![
            "v=spf1 -all".to_string(),
            "registry-verification=abc123".to_string(),
        ]));

        let grant = strategy(resolver).authenticate(&ns(), &proof("abc123")).await.unwrap();
        assert_eq!(grant.namespace.as_str(), "com.example");
        assert_eq!(grant.subject, "example.com");
    }

    #[tokio::test]
    async fn test_wrong_token() {
        let resolver = FakeResolver::new(Behavior::Records(vec![
            "registry-verification=other".to_string(),
        ]));

        let err = strategy(resolver)
            .authenticate(&ns(), &proof("abc123"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "DNS verification failed for 'example.com'");
    }

    #[tokio::test]
    async fn test_nxdomain_is_proof_error_without_retry() {
        let resolver = FakeResolver::new(Behavior::NxDomain);

        let err = strategy(Arc::clone(&resolver))
            .authenticate(&ns(), &proof("abc123"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried() {
        let resolver = FakeResolver::new(Behavior::FailThenRecords(
            2,
            vec!["registry-verification=abc123".to_string()],
        ));

        strategy(Arc::clone(&resolver))
            .authenticate(&ns(), &proof("abc123"))
            .await
            .unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let resolver = FakeResolver::new(Behavior::FailThenRecords(
            10,
            vec!["registry-verification=abc123".to_string()],
        ));

        let err = strategy(Arc::clone(&resolver))
            .authenticate(&ns(), &proof("abc123"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_resolver_times_out() {
        let resolver = FakeResolver::new(Behavior::Hang);

        let err = strategy(resolver)
            .authenticate(&ns(), &proof("abc123"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
    }

    #[tokio::test]
    async fn test_empty_token() {
        let resolver = FakeResolver::new(Behavior::Records(vec![]));

        let err = strategy(resolver).authenticate(&ns(), &proof("  ")).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_invalid_nameserver() {
        let config = DnsChallengeConfig {
            nameserver: Some("not-an-address".to_string()),
            ..DnsChallengeConfig::default()
        };
        assert!(matches!(
            HickoryTxtResolver::from_config(&config),
            Err(AuthError::InvalidConfig { .. })
        ));
    }
}
