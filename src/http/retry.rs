use std::{future::Future, time::Duration};

use tokio::time::sleep;

use super::client::RequestError;

/// Exponential backoff settings for transient request failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
    pub max_retries: u32, // Extra attempts after the first. 0 disables retrying.
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
            max_retries: 0,
        }
    }
}

/// Calls `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `policy.max_retries` extra attempts are used up. The error of
/// the last attempt is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_retries.saturating_add(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= attempts || !should_retry(&err) {
            return Err(err);
        }

        log::warn!(
            "attempt {}/{} failed, retrying in {:?}",
            attempt,
            attempts,
            backoff
        );
        sleep(backoff).await;
        backoff = backoff
            .saturating_mul(policy.multiplier)
            .min(policy.max_backoff);
        attempt += 1;
    }
}

/// Transport failures and server-side (5xx) errors are worth another try.
/// Throttling and client errors are not.
pub fn is_transient(error: &RequestError) -> bool {
    match error {
        RequestError::Transport(_) => true,
        RequestError::HttpError(_, status, _) => *status >= 500,
        _ => false,
    }
}
