//! Snapshot reporter: the single writer of a running job's state.
//!
//! Every mutation goes through here so the monotonic-progress rule and the
//! store/publisher mirroring cannot be bypassed by a forgetful call site.

use std::sync::Arc;

use crate::job::{unix_now, JobId, JobKind, JobResult, JobSnapshot, JobStatus};
use crate::phase::PhaseKind;
use crate::publish::ProgressPublisher;
use crate::store::JobStore;

/// Per-download metrics attached to a progress update.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferMetrics {
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub speed_bps: Option<f64>,
    pub eta_seconds: Option<u64>,
}

pub struct Reporter {
    store: Arc<JobStore>,
    publisher: Arc<ProgressPublisher>,
    snapshot: JobSnapshot,
    /// Highest global progress reported so far; updates never go below it.
    high_water: f64,
}

impl Reporter {
    pub fn new(store: Arc<JobStore>, publisher: Arc<ProgressPublisher>, id: JobId, kind: JobKind) -> Self {
        let snapshot = store
            .get(&id)
            .unwrap_or_else(|| JobSnapshot::queued(id, kind));
        let high_water = snapshot.progress01;
        Self {
            store,
            publisher,
            snapshot,
            high_water,
        }
    }

    fn commit(&mut self) {
        self.snapshot.updated_at = unix_now();
        self.store.upsert(self.snapshot.clone());
        self.publisher.publish(&self.snapshot);
    }

    fn clamp(&mut self, p01: f64) -> f64 {
        let p = p01.clamp(0.0, 1.0).max(self.high_water);
        self.high_water = p;
        p
    }

    /// Move to a non-progress state (started, merging, finalizing).
    pub fn transition(&mut self, status: JobStatus, message: impl Into<String>) {
        self.snapshot.status = status;
        self.snapshot.message = message.into();
        self.commit();
    }

    /// Progress within a download phase, in global [0,1] terms.
    pub fn downloading(&mut self, phase: PhaseKind, p01: f64, metrics: TransferMetrics) {
        self.snapshot.status = JobStatus::Downloading { phase };
        self.snapshot.progress01 = self.clamp(p01);
        self.snapshot.message = format!("downloading {}", phase.as_str());
        self.snapshot.downloaded_bytes = metrics.downloaded_bytes;
        self.snapshot.total_bytes = metrics.total_bytes;
        self.snapshot.speed_bps = metrics.speed_bps;
        self.snapshot.eta_seconds = metrics.eta_seconds;
        self.commit();
    }

    /// Progress within the mux phase, in global [0,1] terms.
    pub fn merging_progress(&mut self, p01: f64) {
        self.snapshot.status = JobStatus::Merging;
        self.snapshot.progress01 = self.clamp(p01);
        self.snapshot.message = "merging".to_string();
        self.commit();
    }

    /// Update the message without touching state or progress.
    pub fn note(&mut self, message: impl Into<String>) {
        self.snapshot.message = message.into();
        self.commit();
    }

    pub fn finish(&mut self, result: JobResult) {
        self.snapshot.status = JobStatus::Finished;
        self.snapshot.progress01 = 1.0;
        self.high_water = 1.0;
        self.snapshot.message = "done".to_string();
        self.snapshot.result = Some(result);
        self.commit();
    }

    /// Terminal failure; progress stays where it was.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.snapshot.status = JobStatus::Failed;
        self.snapshot.message = error.clone();
        self.snapshot.error = Some(error);
        self.commit();
    }

    pub fn progress(&self) -> f64 {
        self.snapshot.progress01
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> (Arc<JobStore>, Reporter) {
        let store = Arc::new(JobStore::new());
        let publisher = Arc::new(ProgressPublisher::new());
        let r = Reporter::new(store.clone(), publisher, "j1".to_string(), JobKind::Merge);
        (store, r)
    }

    #[test]
    fn progress_never_regresses() {
        let (store, mut r) = reporter();
        r.downloading(PhaseKind::Video, 0.5, TransferMetrics::default());
        r.downloading(PhaseKind::Video, 0.3, TransferMetrics::default());
        assert_eq!(store.get("j1").unwrap().progress01, 0.5);
    }

    #[test]
    fn transitions_keep_progress() {
        let (store, mut r) = reporter();
        r.downloading(PhaseKind::Audio, 0.85, TransferMetrics::default());
        r.transition(JobStatus::Merging, "merging");
        let snap = store.get("j1").unwrap();
        assert_eq!(snap.status, JobStatus::Merging);
        assert_eq!(snap.progress01, 0.85);
    }

    #[test]
    fn finish_pins_progress_to_one() {
        let (store, mut r) = reporter();
        r.downloading(PhaseKind::Progressive, 0.4, TransferMetrics::default());
        r.finish(JobResult {
            path: "/tmp/x.mp4".into(),
            file_name: "x.mp4".to_string(),
            mime: "video/mp4".to_string(),
            size_bytes: 10,
        });
        let snap = store.get("j1").unwrap();
        assert_eq!(snap.status, JobStatus::Finished);
        assert_eq!(snap.progress01, 1.0);
        assert!(snap.result.is_some());
    }

    #[test]
    fn fail_records_error_and_keeps_progress() {
        let (store, mut r) = reporter();
        r.downloading(PhaseKind::Video, 0.25, TransferMetrics::default());
        r.fail("download failed: HTTP 404");
        let snap = store.get("j1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("download failed: HTTP 404"));
        assert_eq!(snap.progress01, 0.25);
    }
}
