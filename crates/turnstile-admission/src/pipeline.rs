//! The admission pipeline.

use std::future::Future;
use std::time::Instant;

use futures::future::join_all;
use turnstile_auth::AuthRegistry;
use turnstile_core::{
    AdmissionConfig, AdmissionError, Namespace, PackageDeclaration, PipelineConfig,
    PublishRequest, Result, ServerName, ValidationMode, ValidationVerdict, Verdicts,
};
use turnstile_registry::ValidatorSet;
use uuid::Uuid;

use crate::report::{new_request_id, AdmissionReport, Decision};
use crate::state::{AdmissionState, StateTracker};

/// Authenticates a publish request, then validates every declared package.
///
/// The pipeline holds only read-only configuration and the strategies'
/// shared key-set cache, so one instance can serve concurrent requests.
#[derive(Debug)]
pub struct AdmissionPipeline {
    auth: AuthRegistry,
    validators: ValidatorSet,
    config: PipelineConfig,
}

impl AdmissionPipeline {
    /// Creates a pipeline from its parts.
    #[must_use]
    pub const fn new(auth: AuthRegistry, validators: ValidatorSet, config: PipelineConfig) -> Self {
        Self {
            auth,
            validators,
            config,
        }
    }

    /// Builds the standard strategies and validators from configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error if any component cannot be built.
    pub fn from_config(config: &AdmissionConfig) -> Result<Self> {
        let auth = AuthRegistry::from_config(&config.auth)?;
        let validators = ValidatorSet::from_config(&config.registries)?;
        Ok(Self::new(auth, validators, config.pipeline))
    }

    /// Returns the strategy registry.
    #[must_use]
    pub const fn auth(&self) -> &AuthRegistry {
        &self.auth
    }

    /// Returns the validator set.
    #[must_use]
    pub const fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// Admits `request` under a fresh request id.
    ///
    /// # Errors
    ///
    /// See [`admit_with_id`](Self::admit_with_id).
    pub async fn admit(&self, request: &PublishRequest) -> Result<AdmissionReport> {
        self.admit_with_id(new_request_id(), request).await
    }

    /// Admits `request`.
    ///
    /// Package failures are reported as verdicts in the returned report.
    /// When the configured deadline elapses during validation, the packages
    /// still being checked are rejected as unreachable. Dropping the returned
    /// future cancels any in-flight network checks.
    ///
    /// # Errors
    ///
    /// Returns an error when authentication fails or runs past the deadline,
    /// or when the grant does not cover the manifest's server name.
    pub async fn admit_with_id(
        &self,
        request_id: Uuid,
        request: &PublishRequest,
    ) -> Result<AdmissionReport> {
        let started = Instant::now();
        let deadline = self.config.deadline().map(|d| tokio::time::Instant::now() + d);
        let id = request_id.to_string();
        let mut tracker = StateTracker::new(&id);

        tracing::info!(
            request_id = %id,
            namespace = %request.namespace,
            server = %request.manifest.name,
            method = request.auth.method(),
            packages = request.manifest.packages.len(),
            "admission started"
        );

        tracker.advance(AdmissionState::Authenticating);
        let (grant, server) = match within(deadline, self.authenticate(request)).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                tracker.advance(AdmissionState::Rejected);
                tracing::info!(
                    request_id = %id,
                    category = e.category().as_str(),
                    error = %e,
                    "admission rejected during authentication"
                );
                return Err(e);
            }
        };
        tracker.advance(AdmissionState::Authenticated);

        tracker.advance(AdmissionState::ValidatingPackages);
        let server_name = server.to_string();
        let packages = &request.manifest.packages;
        let verdicts = match self.config.validation_mode {
            ValidationMode::Sequential => {
                self.validate_sequential(packages, &server_name, deadline)
                    .await
            }
            ValidationMode::Concurrent => {
                self.validate_concurrent(packages, &server_name, deadline)
                    .await
            }
        };

        let decision = Decision::from_verdicts(&verdicts);
        tracker.advance(if decision.is_accepted() {
            AdmissionState::Accepted
        } else {
            AdmissionState::Rejected
        });

        match &decision {
            Decision::Accepted => tracing::info!(
                request_id = %id,
                server = %server_name,
                method = %grant.method,
                "admission accepted"
            ),
            Decision::Rejected {
                index,
                category,
                reason,
            } => tracing::info!(
                request_id = %id,
                server = %server_name,
                package = index,
                category = category.as_str(),
                reason = %reason,
                "admission rejected"
            ),
        }

        Ok(AdmissionReport {
            request_id,
            grant,
            server: server_name,
            verdicts,
            decision,
            states: tracker.into_path(),
            package_count: packages.len(),
            elapsed: started.elapsed(),
        })
    }

    /// Runs the strategy and checks the grant against the manifest.
    async fn authenticate(
        &self,
        request: &PublishRequest,
    ) -> Result<(turnstile_core::AuthGrant, ServerName)> {
        let namespace = Namespace::parse(&request.namespace)?;
        let server = ServerName::parse(&request.manifest.name)?;
        let grant = self.auth.authenticate(&namespace, &request.auth).await?;

        if !grant.permits(&server) {
            return Err(AdmissionError::proof(format!(
                "grant for '{}' does not cover server '{server}'",
                grant.namespace
            )));
        }
        if grant.is_expired() {
            return Err(AdmissionError::proof(format!(
                "grant for '{}' has expired",
                grant.namespace
            )));
        }

        Ok((grant, server))
    }

    async fn check(
        &self,
        index: usize,
        package: &PackageDeclaration,
        server_name: &str,
        deadline: Option<tokio::time::Instant>,
    ) -> ValidationVerdict {
        let result = within(deadline, self.validators.validate(package, server_name)).await;
        let verdict = ValidationVerdict::from_result(index, package, &result);
        tracing::debug!(verdict = %verdict, "package validated");
        verdict
    }

    /// Validates in declaration order, stopping after the first rejection.
    async fn validate_sequential(
        &self,
        packages: &[PackageDeclaration],
        server_name: &str,
        deadline: Option<tokio::time::Instant>,
    ) -> Verdicts {
        let mut verdicts = Verdicts::new();
        for (index, package) in packages.iter().enumerate() {
            let verdict = self.check(index, package, server_name, deadline).await;
            let rejected = !verdict.is_accepted();
            verdicts.add(verdict);
            if rejected {
                break;
            }
        }
        verdicts
    }

    /// Validates every package at once. Verdicts come back in declaration
    /// order whatever order the checks finish in.
    async fn validate_concurrent(
        &self,
        packages: &[PackageDeclaration],
        server_name: &str,
        deadline: Option<tokio::time::Instant>,
    ) -> Verdicts {
        let checks = packages
            .iter()
            .enumerate()
            .map(|(index, package)| self.check(index, package, server_name, deadline));
        join_all(checks).await.into_iter().collect()
    }
}

/// Runs `stage` until `deadline`, if there is one.
async fn within<T>(
    deadline: Option<tokio::time::Instant>,
    stage: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(at) = deadline else {
        return stage.await;
    };
    tokio::time::timeout_at(at, stage).await.unwrap_or_else(|_| {
        tracing::warn!("admission deadline exceeded");
        Err(AdmissionError::unreachable("admission deadline exceeded"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use turnstile_auth::AnonymousStrategy;
    use turnstile_core::{
        AnonymousConfig, AuthProof, ErrorCategory, RegistryType, ServerManifest,
    };
    use turnstile_registry::PackageValidator;

    const ANON: &str = "io.modelcontextprotocol.anonymous";

    /// Fails packages whose identifier starts with `bad`, after sleeping for
    /// the number of milliseconds after the last `-`.
    struct ScriptedValidator;

    #[async_trait]
    impl PackageValidator for ScriptedValidator {
        fn registry_type(&self) -> RegistryType {
            RegistryType::Npm
        }

        async fn validate(&self, package: &PackageDeclaration, _server: &str) -> Result<()> {
            let delay = package
                .identifier
                .rsplit('-')
                .next()
                .and_then(|ms| ms.parse::<u64>().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if package.identifier.starts_with("bad") {
                Err(AdmissionError::policy(format!("{} rejected", package.identifier)))
            } else {
                Ok(())
            }
        }
    }

    fn pipeline(config: PipelineConfig) -> AdmissionPipeline {
        let anonymous =
            AnonymousStrategy::new(&AnonymousConfig::default(), Duration::from_secs(300)).unwrap();
        AdmissionPipeline::new(
            AuthRegistry::new().with_strategy(Arc::new(anonymous)),
            ValidatorSet::new().with_validator(ScriptedValidator),
            config,
        )
    }

    fn request(namespace: &str, server: &str, packages: &[&str]) -> PublishRequest {
        let manifest = packages.iter().fold(ServerManifest::new(server), |m, id| {
            m.with_package(PackageDeclaration::new(RegistryType::Npm, *id))
        });
        PublishRequest {
            namespace: namespace.to_string(),
            auth: AuthProof::None,
            manifest,
        }
    }

    fn anon_request(packages: &[&str]) -> PublishRequest {
        request(ANON, &format!("{ANON}/demo"), packages)
    }

    #[tokio::test]
    async fn test_accepts_when_every_package_passes() {
        let report = pipeline(PipelineConfig::default())
            .admit(&anon_request(&["good-0", "good-0"]))
            .await
            .unwrap();

        assert!(report.is_accepted());
        assert_eq!(report.verdicts.len(), 2);
        assert_eq!(report.final_state(), AdmissionState::Accepted);
        assert_eq!(
            report.states,
            vec![
                AdmissionState::Start,
                AdmissionState::Authenticating,
                AdmissionState::Authenticated,
                AdmissionState::ValidatingPackages,
                AdmissionState::Accepted,
            ]
        );
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_rejection() {
        let report = pipeline(PipelineConfig::default())
            .admit(&anon_request(&["good-0", "bad1-0", "bad2-0"]))
            .await
            .unwrap();

        assert!(!report.is_accepted());
        assert_eq!(report.verdicts.len(), 2);
        assert_eq!(report.rejection().unwrap().reason(), Some("bad1-0 rejected"));
        assert_eq!(report.package_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reports_earliest_declared_failure() {
        let config = PipelineConfig::default().with_validation_mode(ValidationMode::Concurrent);
        let report = pipeline(config)
            .admit(&anon_request(&["good-0", "bad-slow-500", "bad-fast-1"]))
            .await
            .unwrap();

        assert_eq!(report.verdicts.len(), 3);
        assert_eq!(
            report.decision,
            Decision::Rejected {
                index: 1,
                category: ErrorCategory::Policy,
                reason: "bad-slow-500 rejected".to_string(),
            }
        );
        let indexes: Vec<_> = report.verdicts.iter().map(|v| v.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_auth_failure_is_error() {
        let err = pipeline(PipelineConfig::default())
            .admit(&request("io.github.octocat", "io.github.octocat/weather", &["good-0"]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
    }

    #[tokio::test]
    async fn test_server_outside_grant() {
        let err = pipeline(PipelineConfig::default())
            .admit(&request(ANON, "io.github.octocat/weather", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert_eq!(
            err.to_string(),
            format!("grant for '{ANON}' does not cover server 'io.github.octocat/weather'")
        );
    }

    #[tokio::test]
    async fn test_malformed_namespace() {
        let err = pipeline(PipelineConfig::default())
            .admit(&request("bad..ns", &format!("{ANON}/demo"), &[]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[tokio::test]
    async fn test_unsupported_registry_type_is_verdict() {
        let mut req = anon_request(&[]);
        req.manifest
            .packages
            .push(PackageDeclaration::new(RegistryType::Pypi, "weather"));

        let report = pipeline(PipelineConfig::default()).admit(&req).await.unwrap();
        assert_eq!(
            report.rejection().unwrap().reason(),
            Some("unsupported registry type 'pypi'")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_rejects_package_in_flight() {
        let config = PipelineConfig::default().with_deadline(Duration::from_millis(100));
        let report = pipeline(config)
            .admit(&anon_request(&["good-0", "good-10000", "good-0"]))
            .await
            .unwrap();

        assert!(!report.is_accepted());
        assert_eq!(report.verdicts.len(), 2);
        let rejection = report.rejection().unwrap();
        assert_eq!(rejection.index, 1);
        assert_eq!(rejection.category(), Some(ErrorCategory::Unreachable));
        assert_eq!(rejection.reason(), Some("admission deadline exceeded"));
        assert_eq!(report.final_state(), AdmissionState::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_concurrent_keeps_finished_verdicts() {
        let config = PipelineConfig::default()
            .with_validation_mode(ValidationMode::Concurrent)
            .with_deadline(Duration::from_millis(100));
        let report = pipeline(config)
            .admit(&anon_request(&["good-10", "good-10000", "bad-20"]))
            .await
            .unwrap();

        assert_eq!(report.verdicts.len(), 3);
        assert!(report.verdicts.as_slice()[0].is_accepted());
        assert_eq!(
            report.verdicts.as_slice()[1].category(),
            Some(ErrorCategory::Unreachable)
        );
        assert_eq!(
            report.verdicts.as_slice()[2].category(),
            Some(ErrorCategory::Policy)
        );
        assert_eq!(report.rejection().unwrap().index, 1);
    }

    struct SlowStrategy;

    #[async_trait]
    impl turnstile_auth::AuthStrategy for SlowStrategy {
        fn method(&self) -> &str {
            "none"
        }

        async fn authenticate(
            &self,
            namespace: &Namespace,
            _proof: &AuthProof,
        ) -> Result<turnstile_core::AuthGrant> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(turnstile_core::AuthGrant::issue(
                namespace.clone(),
                "none",
                "anonymous",
                Duration::from_secs(300),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_authentication_is_error() {
        let pipeline = AdmissionPipeline::new(
            AuthRegistry::new().with_strategy(Arc::new(SlowStrategy)),
            ValidatorSet::new().with_validator(ScriptedValidator),
            PipelineConfig::default().with_deadline(Duration::from_millis(100)),
        );
        let err = pipeline.admit(&anon_request(&["good-0"])).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unreachable);
        assert_eq!(err.to_string(), "admission deadline exceeded");
    }

    #[tokio::test]
    async fn test_empty_manifest_is_accepted() {
        let report = pipeline(PipelineConfig::default())
            .admit(&anon_request(&[]))
            .await
            .unwrap();
        assert!(report.is_accepted());
        assert!(report.verdicts.is_empty());
    }
}
