//! Job driver: orchestrates one job from submission to a terminal state.
//!
//! A submitted job runs on its own task and walks a fixed state machine:
//! queued, started, downloading (per phase), merging (merge jobs only),
//! finalizing, then finished or failed. Per-phase progress is mapped into
//! the global [0,1] range and mirrored into the store and publisher on
//! every change.

mod reporter;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::JobError;
use crate::extract::{ExtractError, SourceExtractor, StreamDescriptor};
use crate::fetch::{self, FetchEvent};
use crate::job::{
    mime_for_ext, split_selector, JobId, JobKind, JobRequest, JobResult, JobSnapshot, JobStatus,
};
use crate::merge::{MergeRequest, StreamMerger};
use crate::names::{sanitize_title, short_uid};
use crate::phase::{PhaseKind, PhaseSpan, MERGE_AUDIO, MERGE_MUX, MERGE_VIDEO, PROGRESSIVE};
use crate::publish::ProgressPublisher;
use crate::retry::RetryPolicy;
use crate::storage::LocalStorage;
use crate::store::JobStore;

pub use reporter::{Reporter, TransferMetrics};

/// Capacity of the per-phase event channels between workers and the driver.
const EVENT_BUFFER: usize = 64;

/// Owns the collaborators a job needs and runs jobs against them.
pub struct JobDriver {
    store: Arc<JobStore>,
    publisher: Arc<ProgressPublisher>,
    extractor: Arc<dyn SourceExtractor>,
    merger: Arc<dyn StreamMerger>,
    storage: LocalStorage,
    retry: RetryPolicy,
}

impl JobDriver {
    pub fn new(
        store: Arc<JobStore>,
        publisher: Arc<ProgressPublisher>,
        extractor: Arc<dyn SourceExtractor>,
        merger: Arc<dyn StreamMerger>,
        storage: LocalStorage,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            publisher,
            extractor,
            merger,
            storage,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<ProgressPublisher> {
        &self.publisher
    }

    /// Accept a job, record it as queued, and spawn its execution.
    pub fn submit(self: &Arc<Self>, request: JobRequest) -> JobId {
        let id: JobId = Uuid::new_v4().to_string();
        let kind = JobKind::classify(&request.format_selector);
        let snapshot = JobSnapshot::queued(id.clone(), kind);
        self.store.upsert(snapshot.clone());
        self.publisher.publish(&snapshot);
        info!(job = %id, kind = ?kind, url = %request.url, "job submitted");

        let driver = Arc::clone(self);
        let job_id = id.clone();
        tokio::spawn(async move {
            driver.execute(job_id, request).await;
        });
        id
    }

    /// Run a job to a terminal state. Every exit path lands in exactly one
    /// of finished/failed, and the job's topic is retired afterwards.
    pub async fn execute(&self, id: JobId, request: JobRequest) {
        let kind = JobKind::classify(&request.format_selector);
        let mut reporter = Reporter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.publisher),
            id.clone(),
            kind,
        );

        match self.run(&mut reporter, kind, &request).await {
            Ok(result) => {
                info!(job = %id, file = %result.file_name, "job finished");
                reporter.finish(result);
            }
            Err(e) => {
                error!(job = %id, error = %e, "job failed");
                reporter.fail(e.to_string());
            }
        }
        self.publisher.retire(&id);
    }

    async fn run(
        &self,
        reporter: &mut Reporter,
        kind: JobKind,
        request: &JobRequest,
    ) -> Result<JobResult, JobError> {
        reporter.transition(JobStatus::Started, "resolving source");
        let info = self.extractor.extract(&request.url).await?;

        let title = request
            .title
            .clone()
            .or_else(|| info.title.clone())
            .unwrap_or_else(|| "download".to_string());
        let safe = sanitize_title(&title);
        let uid = short_uid();

        match kind {
            JobKind::Merge => {
                let (video_id, audio_id) = split_selector(&request.format_selector)
                    .ok_or_else(|| {
                        JobError::Internal(format!(
                            "merge job with progressive selector {}",
                            request.format_selector
                        ))
                    })?;
                let video = lookup(&info, video_id)?.clone();
                let audio = lookup(&info, audio_id)?.clone();

                let video_name = format!("{}-{}-v.{}", safe, uid, video.container);
                let audio_name = format!("{}-{}-a.{}", safe, uid, audio.container);
                let video_path = self
                    .fetch_phase(reporter, PhaseKind::Video, MERGE_VIDEO, &video, &video_name)
                    .await?;
                let audio_path = self
                    .fetch_phase(reporter, PhaseKind::Audio, MERGE_AUDIO, &audio, &audio_name)
                    .await?;

                reporter.transition(JobStatus::Merging, "merging");
                let out_base = self.storage.scratch_path(&format!("{}-{}-merged", safe, uid));
                let outcome = self
                    .merge_phase(reporter, video_path, audio_path, out_base)
                    .await?;

                reporter.transition(JobStatus::Finalizing, "finalizing");
                let final_name = format!("{}.{}", safe, outcome.container.ext());
                self.finalize(&outcome.path, &final_name, outcome.container.mime())
            }
            JobKind::Progressive => {
                let stream = lookup(&info, &request.format_selector)?.clone();
                let ext = if !stream.container.is_empty() {
                    stream.container.clone()
                } else {
                    request.ext_hint.clone().unwrap_or_else(|| "mp4".to_string())
                };
                let scratch_name = format!("{}-{}.{}", safe, uid, ext);
                let path = self
                    .fetch_phase(
                        reporter,
                        PhaseKind::Progressive,
                        PROGRESSIVE,
                        &stream,
                        &scratch_name,
                    )
                    .await?;

                reporter.transition(JobStatus::Finalizing, "finalizing");
                let final_name = format!("{}.{}", safe, ext);
                self.finalize(&path, &final_name, mime_for_ext(&ext))
            }
        }
    }

    /// Download one stream on a blocking thread, relaying its events into
    /// reporter updates scaled to the phase's span.
    async fn fetch_phase(
        &self,
        reporter: &mut Reporter,
        phase: PhaseKind,
        span: PhaseSpan,
        stream: &StreamDescriptor,
        scratch_name: &str,
    ) -> Result<std::path::PathBuf, JobError> {
        reporter.downloading(phase, span.base, TransferMetrics::default());

        let dest = self.storage.scratch_path(scratch_name);
        let (tx, mut rx) = mpsc::channel::<FetchEvent>(EVENT_BUFFER);
        let policy = self.retry;
        let desc = stream.clone();
        let dest_for_worker = dest.clone();
        let worker = tokio::task::spawn_blocking(move || {
            fetch::fetch_stream(&desc, &dest_for_worker, &policy, &tx)
        });

        while let Some(event) = rx.recv().await {
            match event {
                FetchEvent::Progress {
                    downloaded_bytes,
                    total_bytes,
                    speed_bps,
                    eta_seconds,
                    fraction,
                } => {
                    let p01 = fraction.map(|f| span.global(f)).unwrap_or(span.base);
                    reporter.downloading(
                        phase,
                        p01,
                        TransferMetrics {
                            downloaded_bytes: Some(downloaded_bytes),
                            total_bytes,
                            speed_bps: Some(speed_bps),
                            eta_seconds,
                        },
                    );
                }
                FetchEvent::Retrying {
                    attempt,
                    max_attempts,
                    ..
                } => {
                    reporter.note(format!("retrying, attempt {}/{}", attempt, max_attempts));
                }
            }
        }

        let path = worker
            .await
            .map_err(|e| JobError::Internal(format!("fetch worker panicked: {}", e)))??;
        Ok(path)
    }

    /// Run the mux while relaying its progress into the merge span.
    async fn merge_phase(
        &self,
        reporter: &mut Reporter,
        video_path: std::path::PathBuf,
        audio_path: std::path::PathBuf,
        output_base: std::path::PathBuf,
    ) -> Result<crate::merge::MergeOutcome, JobError> {
        let (tx, mut rx) = mpsc::channel::<crate::merge::MergeProgress>(EVENT_BUFFER);
        let req = MergeRequest {
            video_path,
            audio_path,
            output_base,
        };

        let merger = Arc::clone(&self.merger);
        let (outcome, ()) = tokio::join!(merger.merge(req, tx), async {
            while let Some(p) = rx.recv().await {
                // Without a known duration, hold at the phase floor.
                let local = p.fraction.unwrap_or(0.0);
                reporter.merging_progress(MERGE_MUX.global(local));
            }
        });
        Ok(outcome?)
    }

    /// Promote the artifact into final storage and build the job result.
    fn finalize(
        &self,
        scratch_path: &std::path::Path,
        final_name: &str,
        mime: &str,
    ) -> Result<JobResult, JobError> {
        let dest = self
            .storage
            .move_into_storage(scratch_path, final_name)
            .map_err(|e| JobError::Storage(format!("{:#}", e)))?;
        let size_bytes = std::fs::metadata(&dest)
            .map(|m| m.len())
            .map_err(|e| JobError::Storage(format!("stat {}: {}", dest.display(), e)))?;
        Ok(JobResult {
            path: dest,
            file_name: final_name.to_string(),
            mime: mime.to_string(),
            size_bytes,
        })
    }
}

fn lookup<'a>(
    info: &'a crate::extract::MediaInfo,
    id: &str,
) -> Result<&'a StreamDescriptor, ExtractError> {
    info.stream(id)
        .ok_or_else(|| ExtractError::UnknownFormat(id.to_string()))
}
