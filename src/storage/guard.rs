//! Timeout and retry wrapper around repository calls
//!
//! Every repository call made by the auth and authorization layers goes
//! through here. Reads may be retried on an outage, writes never are.

use std::future::Future;

use crate::config::RepositoryPolicy;
use crate::error::{GalleryError, Result};
use crate::security_logger::{log_security_event, SecurityEvent};

async fn attempt<T, Fut>(policy: RepositoryPolicy, operation: &str, call: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(policy.timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Repository call '{}' timed out after {:?}", operation, policy.timeout);
            Err(GalleryError::Timeout)
        }
    }
}

/// Run an idempotent read, retrying on `RepositoryUnavailable`
pub async fn read<T, F, Fut>(policy: RepositoryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries_left = policy.read_retries;
    loop {
        match attempt(policy, operation, call()).await {
            Err(e) if e.is_retryable() && retries_left > 0 => {
                retries_left -= 1;
                log::debug!("Retrying '{}' after: {} ({} left)", operation, e, retries_left);
            }
            Err(e) => {
                report(operation, &e).await;
                return Err(e);
            }
            ok => return ok,
        }
    }
}

/// Run a write exactly once
pub async fn write<T, Fut>(policy: RepositoryPolicy, operation: &str, call: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let result = attempt(policy, operation, call).await;
    if let Err(ref e) = result {
        report(operation, e).await;
    }
    result
}

async fn report(operation: &str, error: &GalleryError) {
    if matches!(error, GalleryError::RepositoryUnavailable(_) | GalleryError::Timeout) {
        log_security_event(SecurityEvent::RepositoryFailure {
            operation: operation.to_string(),
            error: error.to_string(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(read_retries: u32) -> RepositoryPolicy {
        RepositoryPolicy {
            timeout: Duration::from_millis(50),
            read_retries,
        }
    }

    #[tokio::test]
    async fn test_read_retries_outage_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = read(policy(2), "flaky", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GalleryError::RepositoryUnavailable("down".to_string()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = read(policy(1), "down", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GalleryError::RepositoryUnavailable("down".to_string()))
        })
        .await;

        assert!(matches!(result, Err(GalleryError::RepositoryUnavailable(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = read(policy(3), "conflict", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GalleryError::ConflictError("taken".to_string()))
        })
        .await;

        assert!(matches!(result, Err(GalleryError::ConflictError(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let result: Result<()> = write(policy(0), "slow", async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(GalleryError::Timeout));
    }
}
