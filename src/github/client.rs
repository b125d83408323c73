use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::github::types::{
    IssueComment, Page, PullDetail, PullFile, PullSummary, Quota, Review, ReviewComment,
    SearchResults,
};
use crate::throttle::QuotaProbe;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("pr-harvest/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for repository search and pull request listings.
pub const PULL_PAGE_SIZE: usize = 30;
pub const SEARCH_PAGE_SIZE: usize = 30;

/// Closed set of outcomes for a single API call. The retry layer selects its
/// policy from the variant alone, so it can be exercised without any HTTP
/// transport in play.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The platform reported the request quota as exhausted (HTTP 429, or
    /// 403 carrying `x-ratelimit-remaining: 0`).
    #[error("rate limit exhausted")]
    RateLimited,

    /// 403 without the explicit quota signal. GitHub answers this way when
    /// its abuse-detection heuristics trip.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Transport-level failure (timeout, connection reset, truncated body).
    #[error("network error: {message}")]
    Network { message: String },

    /// Any other non-success response.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Authenticated GitHub REST client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    pub fn new(token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("GITHUB_TOKEN contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: API_ROOT.to_string(),
        })
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search repositories above a star threshold, most-starred first.
    pub async fn search_repositories(
        &self,
        min_stars: u64,
        page: u32,
    ) -> Result<SearchResults, ApiError> {
        debug!(min_stars, page, "searching repositories");
        let request = self
            .http
            .get(format!("{}/search/repositories", self.base_url))
            .query(&[
                ("q", format!("stars:>{min_stars}")),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("per_page", SEARCH_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
        self.get_json(request).await
    }

    /// List closed pull requests, most recently updated first.
    pub async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Page<PullSummary>, ApiError> {
        debug!(owner, repo, page, "listing closed pull requests");
        let request = self
            .http
            .get(format!("{}/repos/{owner}/{repo}/pulls", self.base_url))
            .query(&[
                ("state", "closed".to_string()),
                ("sort", "updated".to_string()),
                ("direction", "desc".to_string()),
                ("per_page", PULL_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
        self.get_page(request, PULL_PAGE_SIZE).await
    }

    /// Fetch a single pull request with its size counters.
    pub async fn get_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullDetail, ApiError> {
        let request = self
            .http
            .get(format!("{}/repos/{owner}/{repo}/pulls/{number}", self.base_url));
        self.get_json(request).await
    }

    /// Issue-style comments on a pull request, capped at one page.
    pub async fn issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cap: usize,
    ) -> Result<Page<IssueComment>, ApiError> {
        let request = self
            .http
            .get(format!(
                "{}/repos/{owner}/{repo}/issues/{number}/comments",
                self.base_url
            ))
            .query(&[("per_page", cap.to_string())]);
        self.get_page(request, cap).await
    }

    /// Inline review comments on a pull request, capped at one page.
    pub async fn review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cap: usize,
    ) -> Result<Page<ReviewComment>, ApiError> {
        let request = self
            .http
            .get(format!(
                "{}/repos/{owner}/{repo}/pulls/{number}/comments",
                self.base_url
            ))
            .query(&[("per_page", cap.to_string())]);
        self.get_page(request, cap).await
    }

    /// Formal reviews on a pull request, capped at one page.
    pub async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cap: usize,
    ) -> Result<Page<Review>, ApiError> {
        let request = self
            .http
            .get(format!(
                "{}/repos/{owner}/{repo}/pulls/{number}/reviews",
                self.base_url
            ))
            .query(&[("per_page", cap.to_string())]);
        self.get_page(request, cap).await
    }

    /// Files touched by a pull request, capped at one page.
    pub async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        cap: usize,
    ) -> Result<Page<PullFile>, ApiError> {
        let request = self
            .http
            .get(format!(
                "{}/repos/{owner}/{repo}/pulls/{number}/files",
                self.base_url
            ))
            .query(&[("per_page", cap.to_string())]);
        self.get_page(request, cap).await
    }

    /// Current core quota. `/rate_limit` itself does not consume quota.
    pub async fn rate_limit(&self) -> Result<Quota, ApiError> {
        #[derive(Deserialize)]
        struct RateLimitResponse {
            resources: RateLimitResources,
        }

        #[derive(Deserialize)]
        struct RateLimitResources {
            core: CoreRate,
        }

        #[derive(Deserialize)]
        struct CoreRate {
            remaining: u64,
            reset: i64,
        }

        let request = self.http.get(format!("{}/rate_limit", self.base_url));
        let response: RateLimitResponse = self.get_json(request).await?;
        let core = response.resources.core;
        Ok(Quota {
            remaining: core.remaining,
            reset: DateTime::from_timestamp(core.reset, 0).unwrap_or_else(Utc::now),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        response.json().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        per_page: usize,
    ) -> Result<Page<T>, ApiError> {
        let response = self.execute(request).await?;
        let total_hint = last_page_hint(response.headers(), per_page as u64);
        let items = response.json().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;
        Ok(Page { items, total_hint })
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let remaining = ratelimit_remaining(response.headers());
        let message = error_message(response).await;
        Err(classify_failure(status, remaining, message))
    }
}

#[async_trait]
impl QuotaProbe for GithubClient {
    async fn quota(&self) -> Result<Quota, ApiError> {
        self.rate_limit().await
    }
}

/// Map a non-success response onto the closed outcome set.
fn classify_failure(status: StatusCode, remaining: Option<u64>, message: String) -> ApiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ApiError::RateLimited;
    }
    if status == StatusCode::FORBIDDEN {
        // A 403 with zero remaining quota is the hard limit; anything else
        // under 403 is treated as abuse detection.
        if remaining == Some(0) {
            return ApiError::RateLimited;
        }
        return ApiError::Forbidden { message };
    }
    ApiError::Api {
        status: status.as_u16(),
        message,
    }
}

fn ratelimit_remaining(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("x-ratelimit-remaining")?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Extract GitHub's JSON error message, falling back to the raw body.
async fn error_message(response: reqwest::Response) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.message,
        Err(_) => body,
    }
}

/// Approximate listing total: the `rel="last"` page number from the `Link`
/// header times the page size. Absent when the result fits in one page.
fn last_page_hint(headers: &HeaderMap, per_page: u64) -> Option<u64> {
    let link = headers.get("link")?.to_str().ok()?;
    for part in link.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"last\"") {
            continue;
        }
        // Extract URL between < and >
        let start = part.find('<')? + 1;
        let end = part.find('>')?;
        let url = part.get(start..end)?;
        let query = url.split_once('?')?.1;
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("page=") {
                return value.parse::<u64>().ok().map(|last| last * per_page);
            }
        }
    }
    None
}
