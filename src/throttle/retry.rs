use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::github::ApiError;
use crate::throttle::RateGovernor;

/// Retry tiers for a single outbound call. The two bounded tiers grow at
/// different rates: abuse-detection responses back off aggressively (×3),
/// transient network faults gently (×2).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed pacing delay applied before every attempt, independent of quota.
    pub request_delay: Duration,
    pub abuse_backoff_base: Duration,
    pub abuse_max_retries: u32,
    pub network_backoff_base: Duration,
    pub network_max_retries: u32,
}

/// Run one API operation under the governor with tiered retry/backoff.
///
/// Outcome handling:
/// - `RateLimited`: wait for a full quota reset, then retry indefinitely —
///   these attempts never count against a retry budget.
/// - `Forbidden`: exponential backoff bounded by `abuse_max_retries`, then
///   give up with `None`.
/// - `Network`: exponential backoff bounded by `network_max_retries`, then
///   give up with `None`.
/// - `Api`: give up immediately with `None`.
///
/// `None` means "skip this call"; the wrapper never propagates an error.
pub async fn resilient_call<T, F, Fut>(
    governor: &RateGovernor,
    policy: &RetryPolicy,
    mut operation: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut abuse_attempts: u32 = 0;
    let mut network_attempts: u32 = 0;

    loop {
        governor.pace().await;
        if !policy.request_delay.is_zero() {
            sleep(policy.request_delay).await;
        }

        match operation().await {
            Ok(value) => return Some(value),
            Err(ApiError::RateLimited) => {
                warn!("rate limit exhausted; waiting for reset");
                governor.wait_for_reset().await;
            }
            Err(ApiError::Forbidden { message }) => {
                if abuse_attempts >= policy.abuse_max_retries {
                    warn!(%message, attempts = abuse_attempts + 1, "forbidden; giving up");
                    return None;
                }
                let delay = backoff_delay(policy.abuse_backoff_base, 3, abuse_attempts);
                warn!(%message, delay_secs = delay.as_secs_f64(), "forbidden; backing off");
                sleep(delay).await;
                abuse_attempts += 1;
            }
            Err(ApiError::Network { message }) => {
                if network_attempts >= policy.network_max_retries {
                    warn!(%message, attempts = network_attempts + 1, "network error; giving up");
                    return None;
                }
                let delay = backoff_delay(policy.network_backoff_base, 2, network_attempts);
                debug!(%message, delay_secs = delay.as_secs_f64(), "network error; backing off");
                sleep(delay).await;
                network_attempts += 1;
            }
            Err(ApiError::Api { status, message }) => {
                debug!(status, %message, "api error; skipping call");
                return None;
            }
        }
    }
}

fn backoff_delay(base: Duration, growth: u32, attempt: u32) -> Duration {
    base.saturating_mul(growth.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::github::Quota;
    use crate::throttle::QuotaProbe;

    struct PlentyOfQuota;

    #[async_trait]
    impl QuotaProbe for PlentyOfQuota {
        async fn quota(&self) -> Result<Quota, ApiError> {
            Ok(Quota {
                remaining: 5000,
                // A reset in the past keeps even sentinel waits instant.
                reset: Utc::now() - chrono::Duration::seconds(60),
            })
        }
    }

    fn test_governor() -> RateGovernor {
        RateGovernor::new(Arc::new(PlentyOfQuota), 200, Duration::ZERO)
    }

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            request_delay: Duration::ZERO,
            abuse_backoff_base: Duration::from_millis(1),
            abuse_max_retries: 2,
            network_backoff_base: Duration::from_millis(1),
            network_max_retries: 2,
        }
    }

    #[test]
    fn test_backoff_delay_growth() {
        let base = Duration::from_secs(10);
        assert_eq!(backoff_delay(base, 3, 0), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3, 1), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, 3, 2), Duration::from_secs(90));
        assert_eq!(backoff_delay(Duration::from_secs(2), 2, 2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let governor = test_governor();
        let result = resilient_call(&governor, &test_policy(), || async { Ok(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_forbidden_gives_up_after_ceiling() {
        let governor = test_governor();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Option<u32> = resilient_call(&governor, &test_policy(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Forbidden {
                    message: "slow down".to_string(),
                })
            }
        })
        .await;

        assert_eq!(result, None);
        // Ceiling of 2 retries means exactly 3 attempts in total.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_network_errors_recover_within_ceiling() {
        let governor = test_governor();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = resilient_call(&governor, &test_policy(), || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ApiError::Network {
                        message: "timed out".to_string(),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Some(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_network_errors_exhaust_ceiling() {
        let governor = test_governor();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Option<u32> = resilient_call(&governor, &test_policy(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Network {
                    message: "connection reset".to_string(),
                })
            }
        })
        .await;

        assert_eq!(result, None);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_api_error_skips_without_retry() {
        let governor = test_governor();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Option<u32> = resilient_call(&governor, &test_policy(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Api {
                    status: 404,
                    message: "Not Found".to_string(),
                })
            }
        })
        .await;

        assert_eq!(result, None);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_retries_outside_any_budget() {
        let governor = test_governor();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        // Three rate-limit hits exceed both bounded ceilings, yet the call
        // still completes because the limit tier retries indefinitely.
        let result = resilient_call(&governor, &test_policy(), || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(ApiError::RateLimited)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Some("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
