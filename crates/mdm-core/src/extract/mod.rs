//! Source extraction: resolve a page URL into fetchable stream descriptors.

mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ytdlp::YtdlpExtractor;

/// One fetchable elementary stream offered by a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Source-assigned identifier, referenced by format selectors.
    pub id: String,
    /// Container/extension of the stream as served (e.g. "mp4", "webm").
    pub container: String,
    /// Video codec, `None` for audio-only streams.
    pub vcodec: Option<String>,
    /// Audio codec, `None` for video-only streams.
    pub acodec: Option<String>,
    pub bitrate_kbps: Option<f64>,
    /// Direct URL the fetcher downloads from.
    pub fetch_url: String,
    pub approx_size_bytes: Option<u64>,
}

impl StreamDescriptor {
    pub fn has_video(&self) -> bool {
        self.vcodec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.is_some()
    }
}

/// Everything known about a source URL after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub streams: Vec<StreamDescriptor>,
}

impl MediaInfo {
    /// Look up a stream by id.
    pub fn stream(&self, id: &str) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extractor tool failed: {0}")]
    Tool(String),
    #[error("no fetchable streams for {0}")]
    NoFormats(String),
    #[error("unknown format id: {0}")]
    UnknownFormat(String),
    #[error("malformed extractor output: {0}")]
    Malformed(String),
}

/// Turns a page URL into stream descriptors. Object-safe so the driver can
/// take a test double.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<MediaInfo, ExtractError>;
}
