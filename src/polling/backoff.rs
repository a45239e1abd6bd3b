//! Retry policy for the fetch stage
//!
//! Retries a fallible operation forever with a fixed delay between attempts.
//! The only way out, apart from success, is the cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Delay used when none is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Fixed-delay, unbounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Time to wait after a failed attempt before the next one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy retrying forever with the given delay.
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Executes `operation` until it succeeds or `cancel` fires.
    ///
    /// # Arguments
    /// * `cancel` - Aborts an in-flight attempt as well as the wait between attempts.
    /// * `operation` - Called with the 1-based attempt number. Called again on every failure.
    /// * `on_retry` - Called with `(attempt, error, delay)` after each failed attempt
    ///   that will be retried. Not called for failures observed after cancellation.
    ///
    /// # Returns
    /// The first successful value, or [`Cancelled`]. There is no attempt limit.
    ///
    /// # Example
    /// ```rust,ignore
    /// let policy = RetryPolicy::fixed(Duration::from_secs(10));
    /// let updates = policy
    ///     .execute(&cancel, |_| client.get_updates(&request, &cancel), |attempt, err, delay| {
    ///         tracing::warn!("attempt {attempt} failed: {err}, retrying in {delay:?}");
    ///     })
    ///     .await?;
    /// ```
    pub async fn execute<F, Fut, T, E, L>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut on_retry: L,
    ) -> Result<T, Cancelled>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        L: FnMut(u32, &E, Duration),
    {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            attempt = attempt.saturating_add(1);

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Cancelled),
                result = operation(attempt) => result,
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            target: "botpoll::polling::backoff",
                            attempts = attempt,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    // Transports usually fail with their own error once the token fires.
                    if cancel.is_cancelled() {
                        return Err(Cancelled);
                    }

                    on_retry(attempt, &err, self.delay);

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(Cancelled),
                        () = sleep(self.delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let mut retries = 0;

        let result = policy
            .execute(
                &cancel,
                |_| {
                    let c = counter.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, anyhow::Error>(42)
                    }
                },
                |_, _, _| retries += 1,
            )
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_forever_with_fixed_delay() {
        // Well past anything a bounded policy would tolerate.
        const FAILURES: u32 = 50;

        let policy = RetryPolicy::fixed(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let mut delays = Vec::new();
        let started = Instant::now();

        let result = policy
            .execute(
                &cancel,
                |_| {
                    let c = counter.clone();
                    async move {
                        let count = c.fetch_add(1, Ordering::SeqCst);
                        if count < FAILURES {
                            anyhow::bail!("Simulated failure");
                        }
                        Ok::<_, anyhow::Error>(7)
                    }
                },
                |_, _, delay| delays.push(delay),
            )
            .await
            .unwrap();

        assert_eq!(result, 7);
        assert_eq!(counter.load(Ordering::SeqCst), FAILURES + 1);
        assert_eq!(delays.len(), FAILURES as usize);
        assert!(delays.iter().all(|d| *d == Duration::from_secs(10)));
        assert!(started.elapsed() >= Duration::from_secs(10 * u64::from(FAILURES)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_numbers_are_passed_through() {
        let policy = RetryPolicy::fixed(Duration::from_millis(5));
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();

        let result = policy
            .execute(
                &cancel,
                |attempt| async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} failed"))
                    } else {
                        Ok(attempt)
                    }
                },
                |attempt, err, _| seen.push((attempt, err.clone())),
            )
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(
            seen,
            vec![
                (1, "attempt 1 failed".to_string()),
                (2, "attempt 2 failed".to_string())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(
                &cancel,
                |_| {
                    let c = counter.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, anyhow::Error>(())
                    }
                },
                |_, _, _| {},
            )
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff_sleep() {
        let policy = RetryPolicy::fixed(Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<(), Cancelled> = policy
            .execute(
                &cancel,
                |_| {
                    let c = counter.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        anyhow::bail!("Always fails")
                    }
                },
                |_, _, _| {},
            )
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_inflight_attempt() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result: Result<(), Cancelled> = policy
            .execute(
                &cancel,
                |_| std::future::pending::<Result<(), anyhow::Error>>(),
                |_, _, _| {},
            )
            .await;

        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_cancel_is_not_retried() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let mut retries = 0;

        let token = cancel.clone();
        let result: Result<(), Cancelled> = policy
            .execute(
                &cancel,
                |_| {
                    let token = token.clone();
                    async move {
                        token.cancel();
                        anyhow::bail!("transport aborted")
                    }
                },
                |_, _, _| retries += 1,
            )
            .await;

        assert_eq!(result, Err(Cancelled));
        assert_eq!(retries, 0);
    }
}
