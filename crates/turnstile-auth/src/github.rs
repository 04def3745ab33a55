//! GitHub access-token strategy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use turnstile_core::{
    AdmissionError, AuthGrant, AuthMethod, AuthProof, GitHubConfig, Namespace, Result,
};

use crate::error::AuthError;
use crate::strategy::{unexpected_proof, AuthStrategy};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const ORGS_PER_PAGE: u32 = 100;
const MAX_ORG_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubOrg {
    login: String,
}

/// Exchanges a GitHub access token for the caller's login and organizations.
///
/// The token grants `io.github.<login>` and `io.github.<org>` for each
/// organization the token can list.
#[derive(Debug, Clone)]
pub struct GitHubTokenStrategy {
    http: reqwest::Client,
    api_base_url: String,
    grant_ttl: Duration,
}

impl GitHubTokenStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &GitHubConfig, grant_ttl: Duration) -> Self {
        Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            grant_ttl,
        }
    }

    async fn send(
        &self,
        url: &str,
        token: &SecretString,
    ) -> std::result::Result<reqwest::Response, AdmissionError> {
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| upstream(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(url = %url, status = response.status().as_u16(), "GitHub rejected token");
                Err(AdmissionError::proof("invalid GitHub access token"))
            }
            status if !status.is_success() => {
                Err(upstream(format!("HTTP status {}", status.as_u16())).into())
            }
            _ => Ok(response),
        }
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> std::result::Result<T, AdmissionError> {
        Ok(response
            .json::<T>()
            .await
            .map_err(|e| upstream(e.to_string()))?)
    }

    /// Pages through `/user/orgs` until an organization owns `namespace`.
    async fn org_owns(
        &self,
        namespace: &Namespace,
        token: &SecretString,
    ) -> std::result::Result<bool, AdmissionError> {
        let mut next = Some(format!(
            "{}/user/orgs?per_page={ORGS_PER_PAGE}",
            self.api_base_url
        ));
        let mut pages = 0;

        while let Some(url) = next.take() {
            let response = self.send(&url, token).await?;
            next = next_link(response.headers());
            let orgs: Vec<GitHubOrg> = Self::decode(response).await?;
            if orgs.iter().any(|org| owns_namespace(namespace, &org.login)) {
                return Ok(true);
            }

            pages += 1;
            if pages >= MAX_ORG_PAGES && next.is_some() {
                tracing::warn!(pages, "stopped listing GitHub organizations");
                break;
            }
        }
        Ok(false)
    }
}

/// Returns true if `login` owns `namespace` as `io.github.<login>`. GitHub
/// logins are case-insensitive.
pub(crate) fn owns_namespace(namespace: &Namespace, login: &str) -> bool {
    namespace
        .as_str()
        .eq_ignore_ascii_case(&format!("io.github.{login}"))
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LINK)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|entry| {
            let (target, params) = entry.split_once(';')?;
            params
                .split(';')
                .any(|p| p.trim() == r#"rel="next""#)
                .then(|| {
                    target
                        .trim()
                        .trim_start_matches('<')
                        .trim_end_matches('>')
                        .to_string()
                })
        })
}

fn upstream(reason: String) -> AuthError {
    AuthError::Upstream {
        service: "GitHub".to_string(),
        reason,
    }
}

#[async_trait]
impl AuthStrategy for GitHubTokenStrategy {
    fn method(&self) -> &str {
        AuthMethod::GithubAt.as_str()
    }

    async fn authenticate(&self, namespace: &Namespace, proof: &AuthProof) -> Result<AuthGrant> {
        let AuthProof::GithubAt { token } = proof else {
            return Err(unexpected_proof(self.method(), proof).into());
        };

        let user_url = format!("{}/user", self.api_base_url);
        let user: GitHubUser = Self::decode(self.send(&user_url, token).await?).await?;

        if !owns_namespace(namespace, &user.login) && !self.org_owns(namespace, token).await? {
            tracing::debug!(
                login = %user.login,
                namespace = %namespace,
                "GitHub identity does not match namespace"
            );
            return Err(AdmissionError::proof(format!(
                "GitHub identity is not permitted to publish under '{namespace}'"
            )));
        }

        Ok(AuthGrant::issue(
            namespace.clone(),
            self.method(),
            user.login,
            self.grant_ttl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use turnstile_core::ErrorCategory;

    fn strategy(server: &MockServer) -> GitHubTokenStrategy {
        let config = GitHubConfig::default().with_api_base_url(server.base_url());
        GitHubTokenStrategy::new(reqwest::Client::new(), &config, Duration::from_secs(300))
    }

    fn proof() -> AuthProof {
        AuthProof::GithubAt {
            token: SecretString::from("ghp_test"),
        }
    }

    fn mock_identity(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/user")
                .header("authorization", "Bearer ghp_test");
            then.status(200).json_body(serde_json::json!({"login": "octocat"}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/user/orgs")
                .query_param("per_page", "100");
            then.status(200)
                .json_body(serde_json::json!([{"login": "github"}]));
        });
    }

    #[tokio::test]
    async fn test_user_namespace() {
        let server = MockServer::start();
        mock_identity(&server);

        let grant = strategy(&server)
            .authenticate(&Namespace::parse("io.github.octocat").unwrap(), &proof())
            .await
            .unwrap();
        assert_eq!(grant.subject, "octocat");
        assert_eq!(grant.method, "github_at");
    }

    #[tokio::test]
    async fn test_org_namespace() {
        let server = MockServer::start();
        mock_identity(&server);

        let grant = strategy(&server)
            .authenticate(&Namespace::parse("io.github.github").unwrap(), &proof())
            .await
            .unwrap();
        assert_eq!(grant.namespace.as_str(), "io.github.github");
    }

    #[tokio::test]
    async fn test_foreign_namespace() {
        let server = MockServer::start();
        mock_identity(&server);

        let err = strategy(&server)
            .authenticate(&Namespace::parse("io.github.someone").unwrap(), &proof())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert_eq!(
            err.to_string(),
            "GitHub identity is not permitted to publish under 'io.github.someone'"
        );
    }

    #[tokio::test]
    async fn test_revoked_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(401);
        });

        let err = strategy(&server)
            .authenticate(&Namespace::parse("io.github.octocat").unwrap(), &proof())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid GitHub access token");
    }

    #[tokio::test]
    async fn test_api_outage_is_unreachable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(502);
        });

        let err = strategy(&server)
            .authenticate(&Namespace::parse("io.github.octocat").unwrap(), &proof())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unreachable);
    }

    #[tokio::test]
    async fn test_login_match_skips_org_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(serde_json::json!({"login": "octocat"}));
        });
        let orgs = server.mock(|when, then| {
            when.method(GET).path("/user/orgs");
            then.status(403);
        });

        let grant = strategy(&server)
            .authenticate(&Namespace::parse("io.github.octocat").unwrap(), &proof())
            .await
            .unwrap();
        assert_eq!(grant.subject, "octocat");
        orgs.assert_hits(0);
    }

    #[tokio::test]
    async fn test_org_on_later_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(serde_json::json!({"login": "octocat"}));
        });
        let next = format!(r#"<{}>; rel="next""#, server.url("/user/orgs/page2"));
        let first = server.mock(|when, then| {
            when.method(GET).path("/user/orgs");
            then.status(200)
                .header("link", &next)
                .json_body(serde_json::json!([{"login": "github"}]));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/user/orgs/page2");
            then.status(200).json_body(serde_json::json!([{"login": "acme"}]));
        });

        let grant = strategy(&server)
            .authenticate(&Namespace::parse("io.github.acme").unwrap(), &proof())
            .await
            .unwrap();
        assert_eq!(grant.namespace.as_str(), "io.github.acme");
        first.assert();
        second.assert();
    }

    #[test]
    fn test_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            r#"<https://api.github.com/user/orgs?page=2>; rel="next", <https://api.github.com/user/orgs?page=5>; rel="last""#
                .parse()
                .unwrap(),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/user/orgs?page=2")
        );
        assert_eq!(next_link(&HeaderMap::new()), None);
    }

    #[test]
    fn test_owner_match_ignores_case() {
        let ns = Namespace::parse("io.github.OctoCat").unwrap();
        assert!(owns_namespace(&ns, "octocat"));
        assert!(!owns_namespace(&ns, "octocats"));
    }
}
