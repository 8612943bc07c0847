// Utility helpers

use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::{
    constants::{RETRY_BASE_DELAY_MS, RETRY_MAX_ATTEMPTS},
    error::Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`; grows linearly.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `operation` until it succeeds or the policy's attempts run out.
///
/// The last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(label: &str, policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                tracing::warn!(
                    "{} failed, retrying... ({}/{}): {}",
                    label,
                    attempt,
                    attempts,
                    err
                );
                sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// `0x1234...abcd` form of a hash for notifications.
pub fn short_hash(hash: &str) -> String {
    if hash.len() <= 10 {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..6], &hash[hash.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy_is_five_linear_steps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(1), Duration::from_secs(3));
        assert_eq!(policy.delay_after(4), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff("flaky", RetryPolicy::default(), || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(AppError::ExternalAPI(format!("attempt {n}")))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_with_backoff("down", RetryPolicy::default(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::ExternalAPI("503".into()))
        })
        .await;
        assert!(matches!(result, Err(AppError::ExternalAPI(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn short_hash_keeps_prefix_and_suffix() {
        let hash = "0x9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        assert_eq!(short_hash(hash), "0x9f86...0a08");
        assert_eq!(short_hash("0x12"), "0x12");
    }
}
