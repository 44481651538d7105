use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde_json::{Map, Value};
use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;
use tracing::{debug, error, info};
use url::Url;

use super::pagination::next_link;
use super::traits::{RepositorySource, SourceFactory};
use crate::config::types::{SourceConfig, DEFAULT_BASE_URL};
use crate::config::loader::parse_duration;
use crate::transforms::flatten::RawRecord;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
pub const REPOSITORY_TYPENAME: &str = "REPOSITORY";

#[derive(Debug, Clone)]
pub struct GitHubClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for GitHubClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "sourcesense".to_string(),
        }
    }
}

impl GitHubClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SourceConfig) -> SourceSenseResult<Self> {
        let timeout = parse_duration(&config.request_timeout)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self::new()
            .base_url(&config.base_url)
            .timeout(timeout)
            .user_agent(&config.user_agent))
    }

    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent<T: Into<String>>(mut self, agent: T) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn build(self) -> SourceSenseResult<GitHubClient> {
        let base_url = Url::parse(&self.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "source base url '{}' cannot be used as a base",
                self.base_url
            )));
        }
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()?;
        Ok(GitHubClient {
            client,
            base_url,
            headers: None,
        })
    }
}

/// REST client for the GitHub API.
///
/// The only state is the authentication headers, set once by [`GitHubClient::load`].
pub struct GitHubClient {
    client: ReqwestClient,
    base_url: Url,
    headers: Option<HeaderMap>,
}

impl GitHubClient {
    /// Install the bearer token from `credentials`.
    ///
    /// Accepts the token either at the top level (`{"token": ..}`) or nested
    /// under a `credentials` key, the two shapes triggering systems send.
    pub fn load(&mut self, credentials: &Map<String, Value>) -> SourceSenseResult<()> {
        let token = credentials
            .get("token")
            .or_else(|| credentials.get("credentials").and_then(|c| c.get("token")))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration("personal access token is required in credentials".to_string())
            })?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::Configuration("token contains invalid header characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        self.headers = Some(headers);
        info!(base_url = %self.base_url, "github client loaded with authentication headers");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.headers.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> SourceSenseResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Configuration(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: &Url) -> SourceSenseResult<Response> {
        let headers = self
            .headers
            .clone()
            .ok_or_else(|| Error::Authentication("client used before credentials were loaded".to_string()))?;
        debug!(url = %url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await?;
        Ok(resp)
    }

    /// Follow `rel="next"` links from `url` until the last page.
    ///
    /// Stops at the first non-success page; accumulated pages are dropped.
    pub async fn get_paginated_results(&self, url: Url) -> SourceSenseResult<Vec<RawRecord>> {
        let mut all_results = Vec::new();
        let mut next = Some(url);
        let mut pages = 0usize;
        let mut visited = HashSet::new();

        while let Some(url) = next {
            if !visited.insert(url.clone()) {
                error!(url = %url, pages, "pagination links back to a page already fetched");
                return Err(Error::Upstream {
                    status: StatusCode::LOOP_DETECTED.as_u16(),
                    url: url.to_string(),
                });
            }
            let resp = self.get(&url).await?;
            let status = resp.status();
            if !status.is_success() {
                error!(url = %url, status = status.as_u16(), pages, "page request failed");
                return Err(match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(
                        format!("{url} rejected the credentials with status {}", status.as_u16()),
                    ),
                    _ => Error::Upstream {
                        status: status.as_u16(),
                        url: url.to_string(),
                    },
                });
            }

            next = next_link(resp.headers(), &url);
            let page: Vec<RawRecord> = resp.json().await?;
            pages += 1;
            debug!(url = %url, items = page.len(), "page fetched");
            all_results.extend(page);
        }

        Ok(all_results)
    }

    /// All repositories of a user or organization.
    pub async fn get_repositories(&self, owner: &str) -> SourceSenseResult<Vec<RawRecord>> {
        let url = self.endpoint(&["users", owner, "repos"])?;
        let repos = self.get_paginated_results(url).await?;
        info!(owner, count = repos.len(), "fetched repositories");
        Ok(repos)
    }

    /// Fail with an authentication error unless the token is accepted.
    pub async fn test_auth(&self) -> SourceSenseResult<()> {
        if self.endpoint_ok(&["user"]).await? {
            Ok(())
        } else {
            Err(Error::Authentication(
                "the provided personal access token is invalid or expired".to_string(),
            ))
        }
    }

    async fn endpoint_ok(&self, segments: &[&str]) -> SourceSenseResult<bool> {
        let url = self.endpoint(segments)?;
        let resp = self.get(&url).await?;
        Ok(resp.status() == StatusCode::OK)
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    fn name(&self) -> &str { "github" }

    fn produces(&self) -> &str { REPOSITORY_TYPENAME }

    async fn fetch_all(&self, scope: &str) -> SourceSenseResult<Vec<RawRecord>> {
        self.get_repositories(scope).await
    }

    async fn test_authentication(&self) -> SourceSenseResult<bool> {
        self.endpoint_ok(&["user"]).await
    }

    async fn check_scope_exists(&self, scope: &str) -> SourceSenseResult<bool> {
        self.endpoint_ok(&["users", scope]).await
    }
}

/// Builds a freshly loaded [`GitHubClient`] per run.
#[derive(Debug, Clone, Default)]
pub struct GitHubSourceFactory {
    builder: GitHubClientBuilder,
}

impl GitHubSourceFactory {
    pub fn new(builder: GitHubClientBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl SourceFactory for GitHubSourceFactory {
    async fn connect(
        &self,
        credentials: &Map<String, Value>,
    ) -> SourceSenseResult<Box<dyn RepositorySource>> {
        let mut client = self.builder.clone().build()?;
        client.load(credentials)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn load_accepts_flat_and_nested_tokens() {
        let mut client = GitHubClientBuilder::new().build().unwrap();
        client.load(&creds(json!({"token": "ghp_flat"}))).unwrap();
        assert!(client.is_loaded());

        let mut client = GitHubClientBuilder::new().build().unwrap();
        client.load(&creds(json!({"credentials": {"token": "ghp_nested"}}))).unwrap();
        assert!(client.is_loaded());
    }

    #[test]
    fn load_without_token_is_a_configuration_error() {
        let mut client = GitHubClientBuilder::new().build().unwrap();
        let err = client.load(&creds(json!({"username": "octocat"}))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = client.load(&creds(json!({"token": ""}))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!client.is_loaded());
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_segments() {
        let client = GitHubClientBuilder::new()
            .base_url("https://github.example.com/api/v3/")
            .build()
            .unwrap();
        let url = client.endpoint(&["users", "octo cat", "repos"]).unwrap();
        assert_eq!(url.as_str(), "https://github.example.com/api/v3/users/octo%20cat/repos");
    }

    #[tokio::test]
    async fn unloaded_client_fails_with_authentication_error() {
        let client = GitHubClientBuilder::new().build().unwrap();
        let err = client.fetch_all("octocat").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn builder_rejects_non_base_urls() {
        let err = GitHubClientBuilder::new().base_url("mailto:ops@example.com").build();
        assert!(matches!(err, Err(Error::Configuration(_))));
    }
}
