//! Job-level error taxonomy.
//!
//! Four fatality classes drive the driver's behavior: extraction and storage
//! failures are fatal immediately, network failures surface only after the
//! fetcher's retry budget is spent, merge failures only after the fallback
//! chain is exhausted. Whatever surfaces here becomes the failed snapshot's
//! message, with progress preserved at its last value.

use thiserror::Error;

use crate::extract::ExtractError;
use crate::merge::MergeError;
use crate::retry::FetchError;

#[derive(Debug, Error)]
pub enum JobError {
    /// Source has no usable formats or the extractor rejected it. Not retried.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// A fetch phase failed; transient failures were already retried.
    #[error("download failed: {0}")]
    Network(#[from] FetchError),

    /// The muxer failed after all strategy/container fallbacks.
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Final move/rename into storage failed. Fatal, not retried.
    #[error("storage failed: {0}")]
    Storage(String),

    /// Task plumbing failure (join error etc.); should not happen in practice.
    #[error("internal: {0}")]
    Internal(String),
}
