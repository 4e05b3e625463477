//! Stream probing via ffprobe. Best-effort: probe failures never fail the
//! job, they only degrade strategy selection and progress precision.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

/// What ffprobe could tell us about a file.
#[derive(Debug, Clone, Default)]
pub struct ProbeSummary {
    pub container: Option<String>,
    pub duration_secs: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Runs ffprobe on `path`. Any failure returns an empty summary.
pub async fn probe(ffprobe_bin: &str, path: &Path) -> ProbeSummary {
    let output = Command::new(ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            parse_probe_json(&text).unwrap_or_default()
        }
        Ok(out) => {
            debug!(path = %path.display(), code = ?out.status.code(), "ffprobe failed");
            ProbeSummary::default()
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not run ffprobe");
            ProbeSummary::default()
        }
    }
}

#[derive(Deserialize)]
struct RawProbe {
    format: Option<RawFormat>,
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct RawStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse ffprobe's JSON output into a summary.
pub fn parse_probe_json(json: &str) -> Option<ProbeSummary> {
    let raw: RawProbe = serde_json::from_str(json).ok()?;
    let mut summary = ProbeSummary::default();

    if let Some(fmt) = raw.format {
        summary.container = fmt.format_name;
        summary.duration_secs = fmt.duration.and_then(|d| d.parse().ok());
    }
    for stream in raw.streams {
        match stream.codec_type.as_deref() {
            Some("video") if summary.vcodec.is_none() => {
                summary.vcodec = stream.codec_name;
                summary.width = stream.width;
                summary.height = stream.height;
            }
            Some("audio") if summary.acodec.is_none() => {
                summary.acodec = stream.codec_name;
            }
            _ => {}
        }
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "212.480000"
        },
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"codec_type": "audio", "codec_name": "aac"}
        ]
    }"#;

    #[test]
    fn parses_duration_and_codecs() {
        let s = parse_probe_json(SAMPLE).unwrap();
        assert_eq!(s.duration_secs, Some(212.48));
        assert_eq!(s.vcodec.as_deref(), Some("h264"));
        assert_eq!(s.acodec.as_deref(), Some("aac"));
        assert_eq!(s.width, Some(1920));
        assert_eq!(s.height, Some(1080));
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_probe_json("nope").is_none());
    }

    #[test]
    fn missing_fields_are_absent() {
        let s = parse_probe_json(r#"{"streams": []}"#).unwrap();
        assert!(s.duration_secs.is_none());
        assert!(s.vcodec.is_none());
    }
}
