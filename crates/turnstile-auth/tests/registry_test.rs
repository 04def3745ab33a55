//! Dispatch and scoping through the public registry API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use turnstile_auth::{AnonymousStrategy, AuthError, AuthRegistry, DnsStrategy, TxtResolver};
use turnstile_core::{AnonymousConfig, AuthProof, DnsChallengeConfig, ErrorCategory, Namespace};

const TTL: Duration = Duration::from_secs(300);

struct StaticTxt(Vec<String>);

#[async_trait]
impl TxtResolver for StaticTxt {
    async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, AuthError> {
        Ok(self.0.clone())
    }
}

fn registry() -> AuthRegistry {
    let anonymous = AnonymousStrategy::new(&AnonymousConfig::default(), TTL).unwrap();
    let dns = DnsStrategy::new(
        Arc::new(StaticTxt(vec!["registry-verification=s3cret".to_string()])),
        DnsChallengeConfig::default(),
        TTL,
    );
    AuthRegistry::new()
        .with_strategy(Arc::new(anonymous))
        .with_strategy(Arc::new(dns))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

#[tokio::test]
async fn test_dns_grant_is_scoped_to_requested_namespace() {
    let ns = Namespace::parse("com.example.tools").unwrap();
    let grant = registry()
        .authenticate(
            &ns,
            &AuthProof::Dns {
                token: "s3cret".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(grant.namespace, ns);
    assert_eq!(grant.method, "dns");
    assert!(!grant.is_expired());
}

#[tokio::test]
async fn test_unregistered_method_is_config_error() {
    let err = registry()
        .authenticate(
            &Namespace::parse("com.example").unwrap(),
            &AuthProof::Http {
                token: "s3cret".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Config);
    assert!(!err.is_client_error());
}

fn namespace_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9][a-z0-9-]{0,8}", 1..5).prop_map(|labels| labels.join("."))
}

proptest! {
    #[test]
    fn anonymous_never_grants_outside_prefix(raw in namespace_strategy()) {
        let prefix = Namespace::parse(&AnonymousConfig::default().namespace_prefix).unwrap();
        let requested = Namespace::parse(&raw).unwrap();

        let result = block_on(registry().authenticate(&requested, &AuthProof::None));
        match result {
            Ok(grant) => {
                prop_assert_eq!(&grant.namespace, &prefix);
                prop_assert!(prefix.covers(&requested));
            }
            Err(err) => prop_assert_eq!(err.category(), ErrorCategory::Proof),
        }
    }

    #[test]
    fn anonymous_grants_every_child_of_prefix(label in "[a-z][a-z0-9]{0,10}") {
        let prefix = Namespace::parse(&AnonymousConfig::default().namespace_prefix).unwrap();
        let requested = prefix.child(&label).unwrap();

        let grant = block_on(registry().authenticate(&requested, &AuthProof::None)).unwrap();
        prop_assert_eq!(grant.namespace, prefix);
    }
}
