use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of a paginated listing, plus the approximate total the platform
/// hints at through the `Link` header. The hint is best-effort: list
/// endpoints report no exact totals, so callers treat it as a threshold /
/// clipping value, never as an authoritative count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_hint: Option<u64>,
}

/// Response of the repository search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    pub total_count: u64,
    pub items: Vec<SearchRepo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRepo {
    pub full_name: String, // "owner/repo" format
}

/// Pull request as it appears in the list endpoint. The list payload omits
/// size information (changed files, additions, deletions); those require a
/// follow-up fetch of the full pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Full pull request, fetched per-number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullDetail {
    pub number: u64,
    pub user: Option<User>,
    pub body: Option<String>,
    pub changed_files: Option<u64>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

/// Issue-style comment on a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub user: Option<User>,
}

/// Inline review comment attached to the diff.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub user: Option<User>,
}

/// Formal review (approve / request changes / comment).
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub user: Option<User>,
}

/// One file touched by a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullFile {
    pub filename: String,
}

/// Remaining request allowance in the current rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    pub remaining: u64,
    pub reset: DateTime<Utc>,
}
