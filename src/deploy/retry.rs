//! Fixed-delay retry around external command execution.
//!
//! Every apply and wait command passes through [`run_with_retry`]; it is the
//! only point of resilience in the deployment flow. The policy is
//! deliberately flat: a fixed delay between attempts, no backoff, no jitter,
//! and no per-error differentiation beyond the notice printed between
//! attempts.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

use crate::subprocess::ProcessError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Maximum invocations of the operation. A limit of zero still runs the
    /// operation once.
    pub attempts: u32,
    /// Delay separating consecutive attempts.
    pub delay: Duration,
}

impl RetrySettings {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Invoke `operation` until it succeeds or the attempt limit is reached,
/// sleeping the configured delay between attempts. Returns the last failure
/// unchanged when all attempts fail.
pub async fn run_with_retry<F, Fut, T>(settings: &RetrySettings, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = settings.attempts.max(1);

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!("Attempt {}/{} failed: {:#}", attempt, attempts, err);
                if attempt == attempts {
                    return Err(err);
                }
                announce_retry(&err, settings.delay);
                tokio::time::sleep(settings.delay).await;
            }
        }
    }

    unreachable!("retry loop returns on final attempt")
}

fn announce_retry(err: &anyhow::Error, delay: Duration) {
    let exit_code = err
        .downcast_ref::<ProcessError>()
        .and_then(ProcessError::exit_code);

    match exit_code {
        Some(code) => println!("Exit status {}.  Retrying in {}s.", code, delay.as_secs()),
        None => println!("Retrying in {}s.", delay.as_secs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn immediate(attempts: u32) -> RetrySettings {
        RetrySettings::new(attempts).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_returns_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = run_with_retry(&immediate(3), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_final_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = run_with_retry(&immediate(3), || {
            let counter = Arc::clone(&counter);
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(anyhow!(ProcessError::ExitCode(1)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = run_with_retry(&immediate(4), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!(ProcessError::ExitCode(2)))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProcessError>().and_then(ProcessError::exit_code),
            Some(2)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = run_with_retry(&immediate(0), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("boom"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
