//! GitHub REST client used by the update scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub url: String,
    pub changed_files: Vec<String>,
}

#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn list_repositories(&self, owner: &str) -> Result<Vec<Repository>, GithubError>;

    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, GithubError>;

    /// Latest `count` commits on `branch`, newest first, with changed file names.
    async fn recent_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        count: usize,
    ) -> Result<Vec<Commit>, GithubError>;
}

#[derive(Error, Debug)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

impl GithubError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GithubError::Http(_) => true,
            GithubError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl GithubClientConfig {
    /// Build from the `[github]` section; the token comes from `GITHUB_TOKEN` if set.
    pub fn from_config(config: &crate::config::GithubConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

// --- wire types -------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RepoDetail {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitSummary {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    sha: String,
    html_url: String,
    commit: CommitBody,
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

impl From<CommitDetail> for Commit {
    fn from(detail: CommitDetail) -> Self {
        Commit {
            sha: detail.sha,
            message: detail.commit.message,
            author: detail
                .commit
                .author
                .map(|a| a.name)
                .unwrap_or_else(|| "unknown".to_string()),
            url: detail.html_url,
            changed_files: detail.files.into_iter().map(|f| f.filename).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    config: GithubClientConfig,
}

impl GithubClient {
    pub fn new(config: GithubClientConfig) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("folio-server"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        let url = format!("{}{}", self.config.api_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiMessage>(&body)
                .map(|m| m.message)
                .unwrap_or(body);
            tracing::warn!(
                status = status.as_u16(),
                path = %path,
                message = %message,
                "GitHub API error"
            );
            return Err(GithubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match RetryIf::spawn(
            retry_strategy,
            || self.get_once(path, query),
            GithubError::is_retryable,
        )
        .await
        {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() => Err(GithubError::RetryExhausted {
                attempts: self.config.max_retries,
            }),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CodeHost for GithubClient {
    async fn list_repositories(&self, owner: &str) -> Result<Vec<Repository>, GithubError> {
        let repos: Vec<Repository> = self
            .get(
                &format!("/users/{}/repos", owner),
                &[
                    ("sort", "pushed".to_string()),
                    ("per_page", "100".to_string()),
                ],
            )
            .await?;
        tracing::debug!(owner = %owner, count = repos.len(), "Listed repositories");
        Ok(repos)
    }

    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, GithubError> {
        let detail: RepoDetail = self
            .get(&format!("/repos/{}/{}", owner, repo), &[])
            .await?;
        Ok(detail.default_branch)
    }

    async fn recent_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        count: usize,
    ) -> Result<Vec<Commit>, GithubError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let summaries: Vec<CommitSummary> = self
            .get(
                &format!("/repos/{}/{}/commits", owner, repo),
                &[
                    ("sha", branch.to_string()),
                    ("per_page", count.to_string()),
                ],
            )
            .await?;

        let mut commits = Vec::with_capacity(count.min(summaries.len()));
        for summary in summaries.into_iter().take(count) {
            let detail: CommitDetail = self
                .get(
                    &format!("/repos/{}/{}/commits/{}", owner, repo, summary.sha),
                    &[],
                )
                .await?;
            commits.push(detail.into());
        }
        Ok(commits)
    }
}
