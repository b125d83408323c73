use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::github::{ApiError, Quota};

/// Source of the current rate-limit quota. Implemented by the REST client;
/// a stub implementation lets the governor be tested without any transport.
#[async_trait]
pub trait QuotaProbe: Send + Sync {
    async fn quota(&self) -> Result<Quota, ApiError>;
}

/// Gates outbound calls on the remaining request quota, shared across all
/// workers. The probe-and-possibly-sleep sequence runs under a single mutex
/// so that concurrent workers never stack redundant waits.
pub struct RateGovernor {
    probe: Arc<dyn QuotaProbe>,
    gate: Mutex<()>,
    min_remaining: u64,
    safety_window: Duration,
}

impl RateGovernor {
    pub fn new(probe: Arc<dyn QuotaProbe>, min_remaining: u64, safety_window: Duration) -> Self {
        Self {
            probe,
            gate: Mutex::new(()),
            min_remaining,
            safety_window,
        }
    }

    /// Normal pre-call check: block until the quota resets when the
    /// remaining allowance is at or below the configured threshold.
    pub async fn pace(&self) {
        self.wait_if_depleted(self.min_remaining).await;
    }

    /// Hard mode, used after the platform already raised an explicit
    /// rate-limit error: the sentinel threshold guarantees the blocking
    /// branch is taken whatever the probe reports.
    pub async fn wait_for_reset(&self) {
        self.wait_if_depleted(u64::MAX).await;
    }

    async fn wait_if_depleted(&self, threshold: u64) {
        let _gate = self.gate.lock().await;

        let quota = match self.probe.quota().await {
            Ok(quota) => quota,
            Err(e) => {
                // A failed probe must not strand the caller.
                debug!(error = %e, "quota probe failed; proceeding without wait");
                return;
            }
        };

        if quota.remaining > threshold {
            return;
        }

        let wait = wait_duration(quota.reset, Utc::now(), self.safety_window);
        if wait.is_zero() {
            return;
        }
        warn!(
            remaining = quota.remaining,
            wait_secs = wait.as_secs_f64(),
            "quota low; waiting for rate limit reset"
        );
        sleep(wait).await;
    }
}

/// Time to sleep until the quota window resets: reset minus now plus the
/// safety window, clamped at zero.
fn wait_duration(reset: DateTime<Utc>, now: DateTime<Utc>, safety_window: Duration) -> Duration {
    let safety = chrono::Duration::from_std(safety_window).unwrap_or_else(|_| chrono::Duration::zero());
    ((reset - now) + safety).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct FixedQuota {
        remaining: u64,
        reset: DateTime<Utc>,
    }

    #[async_trait]
    impl QuotaProbe for FixedQuota {
        async fn quota(&self) -> Result<Quota, ApiError> {
            Ok(Quota {
                remaining: self.remaining,
                reset: self.reset,
            })
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl QuotaProbe for FailingProbe {
        async fn quota(&self) -> Result<Quota, ApiError> {
            Err(ApiError::Network {
                message: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_wait_duration_adds_safety_window() {
        let now = Utc::now();
        let reset = now + chrono::Duration::seconds(10);
        assert_eq!(
            wait_duration(reset, now, Duration::from_secs(5)),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_wait_duration_clamps_past_reset() {
        let now = Utc::now();
        let reset = now - chrono::Duration::seconds(30);
        assert_eq!(
            wait_duration(reset, now, Duration::from_secs(5)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_wait_duration_recent_reset_keeps_safety_remainder() {
        let now = Utc::now();
        let reset = now - chrono::Duration::seconds(2);
        assert_eq!(
            wait_duration(reset, now, Duration::from_secs(5)),
            Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn test_blocks_until_reset_plus_safety_when_depleted() {
        let probe = FixedQuota {
            remaining: 0,
            reset: Utc::now() + chrono::Duration::milliseconds(300),
        };
        let governor = RateGovernor::new(Arc::new(probe), 200, Duration::from_millis(200));

        let started = Instant::now();
        governor.pace().await;
        assert!(
            started.elapsed() >= Duration::from_millis(400),
            "expected to sleep past reset + safety, slept {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_passes_through_with_quota_available() {
        let probe = FixedQuota {
            remaining: 4800,
            reset: Utc::now() + chrono::Duration::seconds(3600),
        };
        let governor = RateGovernor::new(Arc::new(probe), 200, Duration::from_secs(5));

        let started = Instant::now();
        governor.pace().await;
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_sentinel_blocks_even_with_quota_available() {
        let probe = FixedQuota {
            remaining: 4800,
            reset: Utc::now() + chrono::Duration::milliseconds(400),
        };
        let governor = RateGovernor::new(Arc::new(probe), 200, Duration::ZERO);

        let started = Instant::now();
        governor.wait_for_reset().await;
        assert!(
            started.elapsed() >= Duration::from_millis(300),
            "sentinel mode must wait for reset, slept {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_block() {
        let governor = RateGovernor::new(Arc::new(FailingProbe), 200, Duration::from_secs(5));

        let started = Instant::now();
        governor.wait_for_reset().await;
        assert!(started.elapsed() < Duration::from_millis(200));
    }
}
