//! Merging separate video and audio streams into one file with ffmpeg.
//!
//! Strategy selection routes fragile codec/container pairs to a tolerant
//! invocation, a watchdog kills wedged processes, and a fallback chain tries
//! progressively safer configurations before giving up.

pub mod probe;
mod run;
mod strategy;
mod watchdog;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::MergeConfig;

pub use probe::{probe, ProbeSummary};
pub use run::parse_time_line;
pub use strategy::{choose, command_args, Container, MergeStrategy};
pub use watchdog::{Verdict, Watchdog};

/// Progress from an in-flight mux.
#[derive(Debug, Clone, Copy)]
pub struct MergeProgress {
    /// Fraction in [0,1] when the media duration is known, else `None`.
    pub fraction: Option<f64>,
    pub elapsed_media_secs: f64,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("ffmpeg exited with status {code:?}: {tail}")]
    NonZeroExit { code: Option<i32>, tail: String },
    #[error("mux stalled for {stalled_for:.0}s and was killed")]
    Stalled { stalled_for: f64 },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs for one merge. `output_base` has no extension; the merger appends
/// one matching the container it settles on.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_base: PathBuf,
}

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub container: Container,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

/// Merges a video and an audio stream into one output file. Object-safe so
/// the driver can take a test double.
#[async_trait]
pub trait StreamMerger: Send + Sync {
    async fn merge(
        &self,
        req: MergeRequest,
        progress: mpsc::Sender<MergeProgress>,
    ) -> Result<MergeOutcome, MergeError>;
}

/// ffmpeg-backed merger with probing, strategy fallback, and stall handling.
pub struct FfmpegMerger {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    cfg: MergeConfig,
}

impl FfmpegMerger {
    pub fn new(
        ffmpeg_bin: impl Into<String>,
        ffprobe_bin: impl Into<String>,
        cfg: MergeConfig,
    ) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
            cfg,
        }
    }

    fn budget_for(&self, strategy: MergeStrategy) -> Duration {
        let secs = match strategy {
            MergeStrategy::Simple => self.cfg.simple_watchdog_secs,
            MergeStrategy::Advanced => self.cfg.advanced_watchdog_secs,
        };
        Duration::from_secs(secs)
    }
}

#[async_trait]
impl StreamMerger for FfmpegMerger {
    async fn merge(
        &self,
        req: MergeRequest,
        progress: mpsc::Sender<MergeProgress>,
    ) -> Result<MergeOutcome, MergeError> {
        let video_probe = probe::probe(&self.ffprobe_bin, &req.video_path).await;
        let audio_probe = probe::probe(&self.ffprobe_bin, &req.audio_path).await;
        let duration = video_probe.duration_secs.or(audio_probe.duration_secs);

        let video_ext = req
            .video_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mkv");
        let requested = Container::for_video_ext(video_ext);
        let (first, container) = strategy::choose(
            video_probe.vcodec.as_deref(),
            audio_probe.acodec.as_deref(),
            requested,
        );

        // Chosen configuration, then the other strategy in the same
        // container, then the most tolerant pairing as a last resort.
        let mut attempts = vec![(first, container), (first.other(), container)];
        if container != Container::Mkv {
            attempts.push((MergeStrategy::Simple, Container::Mkv));
        }

        let mut last_err = None;
        for (strat, cont) in attempts {
            let out_path = req.output_base.with_extension(cont.ext());
            // A failed attempt may leave a truncated output behind.
            if tokio::fs::try_exists(&out_path).await.unwrap_or(false) {
                let _ = tokio::fs::remove_file(&out_path).await;
            }

            info!(
                strategy = strat.as_str(),
                container = cont.ext(),
                out = %out_path.display(),
                "mux attempt"
            );
            let args = strategy::command_args(strat, cont, &req.video_path, &req.audio_path, &out_path);
            match run::run_mux(
                &self.ffmpeg_bin,
                args,
                &out_path,
                duration,
                self.budget_for(strat),
                &self.cfg,
                &progress,
            )
            .await
            {
                Ok(()) => {
                    return Ok(MergeOutcome {
                        path: out_path,
                        container: cont,
                        vcodec: video_probe.vcodec,
                        acodec: audio_probe.acodec,
                    });
                }
                Err(e) => {
                    warn!(
                        strategy = strat.as_str(),
                        container = cont.ext(),
                        error = %e,
                        "mux attempt failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            MergeError::Io(std::io::Error::other("no mux attempt was made"))
        }))
    }
}
