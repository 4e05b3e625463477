//! Retry and backoff policy for fetch phases.
//!
//! Encapsulates error classification (timeouts, throttling, connection
//! failures) and exponential backoff decisions so the fetcher and driver
//! share one consistent policy: network-transient failures are retried up to
//! a fixed cap, everything else propagates immediately.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryNotice};
