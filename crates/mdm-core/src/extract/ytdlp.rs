//! Extractor backed by the yt-dlp command line tool.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{ExtractError, MediaInfo, SourceExtractor, StreamDescriptor};

/// Shells out to `yt-dlp -J` and maps its JSON dump onto [`MediaInfo`].
pub struct YtdlpExtractor {
    bin: String,
}

impl YtdlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl SourceExtractor for YtdlpExtractor {
    async fn extract(&self, url: &str) -> Result<MediaInfo, ExtractError> {
        debug!(url, bin = %self.bin, "extracting formats");
        let output = Command::new(&self.bin)
            .arg("-J")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(url)
            .output()
            .await
            .map_err(|e| ExtractError::Tool(format!("failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Tool(
                stderr.lines().last().unwrap_or("unknown failure").to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let info = parse_info(&text)?;
        if info.streams.is_empty() {
            return Err(ExtractError::NoFormats(url.to_string()));
        }
        Ok(info)
    }
}

#[derive(Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_id: String,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    tbr: Option<f64>,
    url: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
}

/// Normalizes yt-dlp's "none" codec placeholder to an absent codec.
fn codec(raw: Option<String>) -> Option<String> {
    raw.filter(|c| !c.is_empty() && c != "none")
}

/// Parses a yt-dlp `-J` dump. Split out from the process plumbing so it can
/// be unit tested against captured output.
pub fn parse_info(json: &str) -> Result<MediaInfo, ExtractError> {
    let raw: RawInfo =
        serde_json::from_str(json).map_err(|e| ExtractError::Malformed(e.to_string()))?;

    let streams = raw
        .formats
        .into_iter()
        .filter_map(|f| {
            // Formats without a direct URL (e.g. storyboards) are unusable.
            let fetch_url = f.url?;
            Some(StreamDescriptor {
                id: f.format_id,
                container: f.ext.unwrap_or_else(|| "mp4".to_string()),
                vcodec: codec(f.vcodec),
                acodec: codec(f.acodec),
                bitrate_kbps: f.tbr,
                fetch_url,
                approx_size_bytes: f.filesize.or(f.filesize_approx),
            })
        })
        .collect();

    Ok(MediaInfo {
        title: raw.title,
        duration_seconds: raw.duration,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "title": "Example Clip",
        "duration": 123.4,
        "formats": [
            {
                "format_id": "137",
                "ext": "mp4",
                "vcodec": "avc1.640028",
                "acodec": "none",
                "tbr": 4400.0,
                "url": "https://cdn.example/v.mp4",
                "filesize": 1000000
            },
            {
                "format_id": "140",
                "ext": "m4a",
                "vcodec": "none",
                "acodec": "mp4a.40.2",
                "tbr": 129.5,
                "url": "https://cdn.example/a.m4a",
                "filesize_approx": 200000
            },
            {
                "format_id": "sb0",
                "ext": "mhtml",
                "vcodec": "none",
                "acodec": "none"
            }
        ]
    }"#;

    #[test]
    fn parses_title_duration_and_streams() {
        let info = parse_info(SAMPLE).unwrap();
        assert_eq!(info.title.as_deref(), Some("Example Clip"));
        assert_eq!(info.duration_seconds, Some(123.4));
        // The storyboard has no URL and is dropped.
        assert_eq!(info.streams.len(), 2);
    }

    #[test]
    fn none_codecs_become_absent() {
        let info = parse_info(SAMPLE).unwrap();
        let video = info.stream("137").unwrap();
        assert!(video.has_video());
        assert!(!video.has_audio());
        let audio = info.stream("140").unwrap();
        assert!(!audio.has_video());
        assert!(audio.has_audio());
        assert_eq!(audio.approx_size_bytes, Some(200000));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            parse_info("{not json"),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_stream_lookup() {
        let info = parse_info(SAMPLE).unwrap();
        assert!(info.stream("999").is_none());
    }
}
