//! Bounded exponential backoff
//!
//! The reconciliation engine uses this to recover from expected
//! conditional-create races: the losing path re-reads the record and
//! applies its fields as an update, retrying a few times before giving
//! up and surfacing the last error to the caller.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry an async operation with exponential backoff.
///
/// The delay starts at `initial_delay` and doubles after every failed
/// attempt. The final attempt's error is returned unchanged, so callers
/// see the real cause rather than a generic retries-exhausted error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    debug_assert!(max_attempts > 0);
    let mut delay = initial_delay;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed: {e}, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, String> = retry_with_backoff(
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            },
            3,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<&str, String> = retry_with_backoff(
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("transient {n}"))
                    } else {
                        Ok("done")
                    }
                }
            },
            3,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), String> = retry_with_backoff(
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {n}")) }
            },
            3,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_doubles() {
        let start = tokio::time::Instant::now();
        let _: Result<(), &str> = retry_with_backoff(
            || async { Err("nope") },
            3,
            Duration::from_millis(100),
        )
        .await;
        // 100ms after the first failure, 200ms after the second
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
