//! Retry loop: run a closure until success or policy says stop.

use std::time::Duration;

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Emitted before each backoff sleep so the caller can surface
/// "retrying, attempt k/n" without the loop knowing about snapshots.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    /// Attempt about to run (2-based: the first retry is attempt 2).
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    /// Text of the error that triggered the retry.
    pub error: String,
}

/// Runs a closure until it succeeds or the retry policy says to stop.
/// On a retryable failure, notifies the caller, sleeps for the backoff
/// duration, then tries again. Blocking; call from a blocking context.
pub fn run_with_retry<T, F, N>(
    policy: &RetryPolicy,
    mut f: F,
    mut notify: N,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Result<T, FetchError>,
    N: FnMut(RetryNotice),
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(delay) => {
                        notify(RetryNotice {
                            attempt: attempt + 1,
                            max_attempts: policy.max_attempts,
                            delay,
                            error: e.to_string(),
                        });
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
