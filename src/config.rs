use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::evaluate::filters::FilterPolicy;
use crate::evaluate::ScanLimits;
use crate::throttle::RetryPolicy;

/// Runtime configuration, loaded from environment variables (a `.env` file
/// is honored by the entry point). Every knob except the token has a
/// default, so `GITHUB_TOKEN=... pr-harvest` is a complete invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// GitHub API token. Mandatory; absence is fatal at startup.
    pub github_token: String,

    /// Number of repositories taken from discovery.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Scan ceiling on closed pull requests examined per repository.
    #[serde(default = "default_max_prs_scanned")]
    pub max_prs_scanned: usize,

    /// Size of the worker pool. Kept low by default: all workers share one
    /// request quota.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Base backoff in seconds for abuse-detection (403) responses.
    #[serde(default = "default_abuse_backoff_base")]
    pub abuse_backoff_base: f64,

    #[serde(default = "default_abuse_max_retries")]
    pub abuse_max_retries: u32,

    /// Base backoff in seconds for transient network failures.
    #[serde(default = "default_network_backoff_base")]
    pub network_backoff_base: f64,

    #[serde(default = "default_network_max_retries")]
    pub network_max_retries: u32,

    /// Seconds added past the reported reset time before resuming.
    #[serde(default = "default_rate_safety_window")]
    pub rate_safety_window: u64,

    /// Remaining-quota threshold at which workers pause for the reset.
    #[serde(default = "default_rate_min_remaining")]
    pub rate_min_remaining: u64,

    /// Fixed pacing delay in seconds between requests, independent of quota.
    #[serde(default = "default_request_delay")]
    pub request_delay: f64,

    /// Star threshold for the discovery query.
    #[serde(default = "default_min_stars")]
    pub min_stars: u64,

    /// Minimum approximate closed-PR count for a repository to qualify.
    #[serde(default = "default_min_closed_prs")]
    pub min_closed_prs: u64,

    /// Reject pull requests without any formal review.
    #[serde(default)]
    pub require_review: bool,

    /// Reject pull requests whose changed files are all documentation.
    #[serde(default)]
    pub skip_docs_only: bool,

    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_top_n() -> usize {
    250
}

fn default_max_prs_scanned() -> usize {
    50
}

fn default_max_workers() -> usize {
    2
}

fn default_abuse_backoff_base() -> f64 {
    10.0
}

fn default_abuse_max_retries() -> u32 {
    2
}

fn default_network_backoff_base() -> f64 {
    2.0
}

fn default_network_max_retries() -> u32 {
    2
}

fn default_rate_safety_window() -> u64 {
    5
}

fn default_rate_min_remaining() -> u64 {
    200
}

fn default_request_delay() -> f64 {
    0.5
}

fn default_min_stars() -> u64 {
    1000
}

fn default_min_closed_prs() -> u64 {
    100
}

fn default_output_path() -> PathBuf {
    PathBuf::from("pr_metrics.csv")
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            request_delay: Duration::from_secs_f64(self.request_delay.max(0.0)),
            abuse_backoff_base: Duration::from_secs_f64(self.abuse_backoff_base.max(0.0)),
            abuse_max_retries: self.abuse_max_retries,
            network_backoff_base: Duration::from_secs_f64(self.network_backoff_base.max(0.0)),
            network_max_retries: self.network_max_retries,
        }
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            require_review: self.require_review,
            skip_docs_only: self.skip_docs_only,
        }
    }

    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            max_prs_scanned: self.max_prs_scanned,
            min_closed_prs: self.min_closed_prs,
        }
    }

    pub fn safety_window(&self) -> Duration {
        Duration::from_secs(self.rate_safety_window)
    }
}
