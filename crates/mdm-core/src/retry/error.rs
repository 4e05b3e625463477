//! Fetch error type for retry classification.

use std::fmt;

/// Error from one attempt to fetch an elementary stream (curl failure, HTTP
/// error, short body, or local write failure). Kept structured so the policy
/// can classify it before it is surfaced as a job failure.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Transfer ended with fewer bytes than the server announced
    /// (e.g. connection closed early). Retryable.
    Partial { expected: u64, received: u64 },
    /// Local file write failed (disk full, permissions). Not retried.
    Storage(std::io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::Partial { expected, received } => {
                write!(
                    f,
                    "partial transfer: expected {} bytes, got {}",
                    expected, received
                )
            }
            FetchError::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Storage(e) => Some(e),
            FetchError::Http(_) | FetchError::Partial { .. } => None,
        }
    }
}
