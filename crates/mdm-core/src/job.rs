//! Job data model: request, live snapshot, terminal result.
//!
//! The snapshot is the single record observers see; it is owned by the driver
//! while the job runs and mirrored into the store/publisher on every change.
//! Field names serialize in camelCase for the live-feed gateway.

use serde::Serialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::phase::PhaseKind;

/// Job identifier (uuid v4 string).
pub type JobId = String;

/// Separator in a format selector that denotes a two-stream merge job.
pub const SELECTOR_SEPARATOR: char = '+';

/// A submission: which source, which stream(s), and optional naming hints.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Source page/video URL handed to the extractor.
    pub url: String,
    /// Single stream id ("18") or two ids joined with `+` ("299+140").
    pub format_selector: String,
    /// Preferred display title; falls back to the extractor's title.
    pub title: Option<String>,
    /// Extension hint for progressive downloads with no better information.
    pub ext_hint: Option<String>,
}

/// Whether a request needs one download or two downloads plus a mux step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Progressive,
    Merge,
}

impl JobKind {
    /// Classifies a format selector: an internal `+` means merge.
    pub fn classify(selector: &str) -> JobKind {
        match split_selector(selector) {
            Some(_) => JobKind::Merge,
            None => JobKind::Progressive,
        }
    }
}

/// Splits a merge selector into (video id, audio id). Returns `None` for a
/// progressive selector or when either side is empty.
pub fn split_selector(selector: &str) -> Option<(&str, &str)> {
    let (v, a) = selector.split_once(SELECTOR_SEPARATOR)?;
    if v.is_empty() || a.is_empty() {
        return None;
    }
    Some((v, a))
}

/// Closed set of job states; each variant carries only what that state needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Started,
    Downloading { phase: PhaseKind },
    Merging,
    Finalizing,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Started => "started",
            JobStatus::Downloading { .. } => "downloading",
            JobStatus::Merging => "merging",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    /// True for `finished` and `failed`; no mutation happens after these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
    pub size_bytes: u64,
}

/// Live view of one job, kept current in the store for any reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: JobKind,
    #[serde(flatten)]
    pub status: JobStatus,
    /// Global progress in [0,1]; non-decreasing for the job's lifetime.
    pub progress01: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_bps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl JobSnapshot {
    /// Fresh snapshot for a just-submitted job.
    pub fn queued(id: JobId, kind: JobKind) -> Self {
        let now = unix_now();
        JobSnapshot {
            id,
            kind,
            status: JobStatus::Queued,
            progress01: 0.0,
            message: "queued".to_string(),
            downloaded_bytes: None,
            total_bytes: None,
            speed_bps: None,
            eta_seconds: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// MIME type for a container/file extension (lowercased match).
pub fn mime_for_ext(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "opus" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Seconds since the unix epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_classification() {
        assert_eq!(JobKind::classify("299+140"), JobKind::Merge);
        assert_eq!(JobKind::classify("18"), JobKind::Progressive);
        // A dangling separator is not a valid merge selector.
        assert_eq!(JobKind::classify("299+"), JobKind::Progressive);
        assert_eq!(JobKind::classify("+140"), JobKind::Progressive);
    }

    #[test]
    fn selector_split() {
        assert_eq!(split_selector("299+140"), Some(("299", "140")));
        assert_eq!(split_selector("18"), None);
    }

    #[test]
    fn status_terminality() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Merging.is_terminal());
        assert!(!JobStatus::Downloading {
            phase: PhaseKind::Video
        }
        .is_terminal());
    }

    #[test]
    fn snapshot_serializes_flat_state() {
        let mut snap = JobSnapshot::queued("j1".into(), JobKind::Merge);
        snap.status = JobStatus::Downloading {
            phase: PhaseKind::Video,
        };
        let v: serde_json::Value = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["state"], "downloading");
        assert_eq!(v["phase"], "video");
        assert_eq!(v["kind"], "merge");
        assert!(v.get("result").is_none());
    }

    #[test]
    fn mime_map_matches_known_containers() {
        assert_eq!(mime_for_ext("mp4"), "video/mp4");
        assert_eq!(mime_for_ext("MKV"), "video/x-matroska");
        assert_eq!(mime_for_ext("weird"), "application/octet-stream");
    }
}
