//! GitHub REST API client used by the polling exporters.
//!
//! Only the handful of endpoints the pollers need are modelled. The
//! trait seam lets the pollers be tested against a stub without any
//! network; the REST implementation is exercised against a mock server.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;

// ============================================================================
// Response types
// ============================================================================

/// A named pool of self-hosted runners in an organization.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerGroup {
    pub id: Option<i64>,
    pub name: Option<String>,
}

/// A registered self-hosted runner.
#[derive(Debug, Clone, Deserialize)]
pub struct Runner {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub os: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub busy: bool,
}

/// Actions billing summary for an org or user.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsBilling {
    #[serde(default)]
    pub total_minutes_used: f64,
    #[serde(default)]
    pub included_minutes: f64,
    #[serde(default)]
    pub total_paid_minutes_used: f64,
    #[serde(default)]
    pub minutes_used_breakdown: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RunnerGroupsPage {
    #[serde(default)]
    runner_groups: Vec<RunnerGroup>,
}

#[derive(Debug, Deserialize)]
struct RunnersPage {
    #[serde(default)]
    runners: Vec<Runner>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error produced by GitHub REST API calls.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected response from GitHub API: {status}")]
    UnexpectedStatus { status: u16 },
}

/// Error produced when a poller is started without the configuration it
/// needs. Not fatal to the process: the wirer logs it and the poller
/// stays disabled.
#[derive(Debug, thiserror::Error)]
#[error("github {0} not configured")]
pub struct MissingConfig(pub &'static str);

// ============================================================================
// Client trait and REST implementation
// ============================================================================

/// The subset of the GitHub REST API the pollers consume.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// All runner groups of an organization.
    async fn organisation_runner_groups(&self, org: &str) -> Result<Vec<RunnerGroup>, GitHubError>;

    /// All runners registered in one runner group.
    async fn group_runners(&self, org: &str, group_id: i64) -> Result<Vec<Runner>, GitHubError>;

    /// All runners registered at the enterprise level. Requires a token
    /// with the enterprise runner scope.
    async fn enterprise_runners(&self, enterprise: &str) -> Result<Vec<Runner>, GitHubError>;

    /// Actions billing summary for an organization.
    async fn actions_billing_org(&self, org: &str) -> Result<ActionsBilling, GitHubError>;

    /// Actions billing summary for a user.
    async fn actions_billing_user(&self, user: &str) -> Result<ActionsBilling, GitHubError>;
}

/// [`GitHubClient`] over the public REST API.
pub struct RestGitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestGitHubClient {
    /// Create a client for the public GitHub API.
    pub fn new(token: impl Into<String>) -> Result<Self, GitHubError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create a client against a different API root (GitHub Enterprise
    /// Server, or a mock server in tests).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("actions-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        page: Option<usize>,
    ) -> Result<T, GitHubError> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json");

        if let Some(page) = page {
            request = request.query(&[("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(GitHubError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// Fetch every page of a paginated collection. A page shorter than
    /// the page size marks the end of the collection.
    async fn get_all_pages<T, P>(
        &self,
        path: &str,
        items: impl Fn(P) -> Vec<T>,
    ) -> Result<Vec<T>, GitHubError>
    where
        P: serde::de::DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let body: P = self.get_json(path, Some(page)).await?;
            let mut chunk = items(body);
            let last_page = chunk.len() < PAGE_SIZE;
            all.append(&mut chunk);
            if last_page {
                return Ok(all);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl GitHubClient for RestGitHubClient {
    async fn organisation_runner_groups(&self, org: &str) -> Result<Vec<RunnerGroup>, GitHubError> {
        self.get_all_pages(
            &format!("/orgs/{}/actions/runner-groups", org),
            |page: RunnerGroupsPage| page.runner_groups,
        )
        .await
    }

    async fn group_runners(&self, org: &str, group_id: i64) -> Result<Vec<Runner>, GitHubError> {
        self.get_all_pages(
            &format!("/orgs/{}/actions/runner-groups/{}/runners", org, group_id),
            |page: RunnersPage| page.runners,
        )
        .await
    }

    async fn enterprise_runners(&self, enterprise: &str) -> Result<Vec<Runner>, GitHubError> {
        self.get_all_pages(
            &format!("/enterprises/{}/actions/runners", enterprise),
            |page: RunnersPage| page.runners,
        )
        .await
    }

    async fn actions_billing_org(&self, org: &str) -> Result<ActionsBilling, GitHubError> {
        self.get_json(&format!("/orgs/{}/settings/billing/actions", org), None)
            .await
    }

    async fn actions_billing_user(&self, user: &str) -> Result<ActionsBilling, GitHubError> {
        self.get_json(&format!("/users/{}/settings/billing/actions", user), None)
            .await
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
