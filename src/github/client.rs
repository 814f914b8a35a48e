//! GitHub commits API client.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::RateLimitStore;
use crate::storage::rate_limit::{AUTHENTICATED_LIMIT, UNAUTHENTICATED_LIMIT};

const API_BASE: &str = "https://api.github.com";

const HTTP_TIMEOUT_SECS: u64 = 20;

const TOKEN_HINT: &str = "Create a personal access token at https://github.com/settings/tokens \
(no scopes needed) and run `wgb token set` to raise the limit to 5000 requests/hour.";

/// Errors talking to GitHub.
#[derive(Error, Debug)]
pub enum GithubError {
    #[error("GitHub rate limit reached: {detail}. {TOKEN_HINT}")]
    RateLimited { detail: String },

    #[error("GitHub API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected GitHub response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitBody,
}

#[derive(Debug, Deserialize)]
struct ApiCommitBody {
    message: String,
    author: Option<ApiAuthor>,
}

#[derive(Debug, Deserialize)]
struct ApiAuthor {
    name: String,
    date: DateTime<Utc>,
}

/// The fields of a commit the miner cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub date: DateTime<Utc>,
}

impl From<ApiCommit> for CommitRecord {
    fn from(c: ApiCommit) -> Self {
        let (author_name, date) = match c.commit.author {
            Some(a) => (a.name, a.date),
            None => (String::new(), DateTime::<Utc>::UNIX_EPOCH),
        };
        Self {
            sha: c.sha,
            message: c.commit.message,
            author_name,
            date,
        }
    }
}

/// Paging parameters for one history fetch.
#[derive(Debug, Clone, Copy)]
pub struct CommitQuery {
    pub since: DateTime<Utc>,
    pub per_page: u32,
    pub max_pages: u32,
}

/// Commits gathered by one run.
#[derive(Debug, Default)]
pub struct CommitHistory {
    pub commits: Vec<CommitRecord>,
    pub pages: u32,
    /// Set when paging stopped on a rate limit after at least one page.
    pub stopped_early: Option<GithubError>,
}

/// Whether another page may exist after one that returned `page_len` items.
pub fn has_next_page(page_len: usize, per_page: u32) -> bool {
    page_len > 0 && page_len >= per_page as usize
}

/// Paginated reader of a repository's commit list.
pub struct GithubClient {
    http: Client,
    base_url: String,
    repo: String,
    token: Option<String>,
    rate: RateLimitStore,
}

impl GithubClient {
    pub fn new(
        repo: impl Into<String>,
        token: Option<String>,
        rate: RateLimitStore,
    ) -> Result<Self, GithubError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("winget-batch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            repo: repo.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            rate,
        })
    }

    /// Point at another API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Hourly request budget for the current credentials.
    pub fn hourly_limit(&self) -> u32 {
        if self.is_authenticated() {
            AUTHENTICATED_LIMIT
        } else {
            UNAUTHENTICATED_LIMIT
        }
    }

    fn check_budget(&self) -> Result<(), GithubError> {
        let state = self.rate.get();
        let limit = self.hourly_limit();
        if state.remaining(limit) == 0 {
            return Err(GithubError::RateLimited {
                detail: format!(
                    "{}/{} requests used this hour, window resets at {}",
                    state.request_count,
                    limit,
                    state.resets_at().to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            });
        }
        Ok(())
    }

    async fn fetch_page(&self, query: &CommitQuery, page: u32) -> Result<Vec<CommitRecord>, GithubError> {
        self.check_budget()?;

        let url = format!("{}/repos/{}/commits", self.base_url, self.repo);
        let since = query.since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .query(&[
                ("since", since),
                ("per_page", query.per_page.to_string()),
                ("page", page.to_string()),
            ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let counted = self.rate.record_request();
        debug!(page, used = counted.request_count, "fetched commit page");

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::FORBIDDEN
            || status == StatusCode::TOO_MANY_REQUESTS
            || (!status.is_success() && body.to_ascii_lowercase().contains("rate limit"))
        {
            return Err(GithubError::RateLimited {
                detail: format!("GitHub answered {status}"),
            });
        }
        if !status.is_success() {
            return Err(GithubError::Status { status, body });
        }

        let commits: Vec<ApiCommit> = serde_json::from_str(&body)?;
        Ok(commits.into_iter().map(CommitRecord::from).collect())
    }

    /// Fetch commits newer than `query.since`, newest first.
    ///
    /// Paging ends on a short or empty page or after `max_pages`. A rate limit
    /// hit on the first page is an error; later it ends paging and is reported
    /// through [`CommitHistory::stopped_early`].
    pub async fn fetch_commits<F>(
        &self,
        query: &CommitQuery,
        mut on_page: F,
    ) -> Result<CommitHistory, GithubError>
    where
        F: FnMut(u32, usize),
    {
        let mut history = CommitHistory::default();
        for page in 1..=query.max_pages.max(1) {
            let batch = match self.fetch_page(query, page).await {
                Ok(batch) => batch,
                Err(e @ GithubError::RateLimited { .. }) if page > 1 => {
                    warn!("stopping commit paging: {e}");
                    history.stopped_early = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            let len = batch.len();
            history.commits.extend(batch);
            history.pages = page;
            on_page(page, history.commits.len());
            if !has_next_page(len, query.per_page) {
                break;
            }
        }
        Ok(history)
    }
}
