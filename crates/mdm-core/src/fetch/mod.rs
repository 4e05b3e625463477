//! Blocking stream fetcher.
//!
//! Downloads one elementary stream (video, audio, or progressive) to a
//! scratch file with curl, retrying transient failures per the retry policy
//! and reporting throttled progress events over a channel. Runs on a
//! blocking thread; the driver bridges the events back into the async world.

mod http;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::extract::StreamDescriptor;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};

pub use http::download;

/// Minimum interval between progress events for one transfer.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(300);

/// Event emitted while a stream transfer is in flight.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Progress {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        speed_bps: f64,
        eta_seconds: Option<u64>,
        /// Fraction of this transfer in [0,1], when total size is known.
        fraction: Option<f64>,
    },
    /// A transient failure occurred and the transfer will restart.
    Retrying {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
}

/// Rate-limits progress events and derives speed/ETA from byte counts.
struct ProgressGauge {
    started: Instant,
    last_emit: Option<Instant>,
}

impl ProgressGauge {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_emit: None,
        }
    }

    fn restart(&mut self) {
        self.started = Instant::now();
        self.last_emit = None;
    }

    /// Returns an event when enough time has passed since the last one.
    fn sample(&mut self, downloaded: u64, total: Option<u64>) -> Option<FetchEvent> {
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < PROGRESS_INTERVAL {
                return None;
            }
        }
        self.last_emit = Some(now);
        Some(self.event(downloaded, total))
    }

    fn event(&self, downloaded: u64, total: Option<u64>) -> FetchEvent {
        let elapsed = self.started.elapsed().as_secs_f64().max(0.001);
        let speed_bps = downloaded as f64 / elapsed;
        let fraction = total
            .filter(|t| *t > 0)
            .map(|t| (downloaded as f64 / t as f64).clamp(0.0, 1.0));
        let eta_seconds = total.filter(|t| *t > downloaded).and_then(|t| {
            if speed_bps > 1.0 {
                Some(((t - downloaded) as f64 / speed_bps) as u64)
            } else {
                None
            }
        });
        FetchEvent::Progress {
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed_bps,
            eta_seconds,
            fraction,
        }
    }
}

/// Fetches one stream to `dest`, retrying per `policy`. Each retry truncates
/// the partial file and restarts from scratch. Returns the destination path.
///
/// Events are sent best-effort with `try_send`; a slow consumer loses
/// intermediate samples, never the final one.
pub fn fetch_stream(
    desc: &StreamDescriptor,
    dest: &Path,
    policy: &RetryPolicy,
    events: &mpsc::Sender<FetchEvent>,
) -> Result<PathBuf, FetchError> {
    let mut gauge = ProgressGauge::new();
    debug!(stream = %desc.id, url = %desc.fetch_url, dest = %dest.display(), "fetching stream");

    let size_hint = desc.approx_size_bytes;
    let written = run_with_retry(
        policy,
        |attempt| {
            if attempt > 1 {
                gauge.restart();
            }
            http::download(&desc.fetch_url, dest, size_hint, |downloaded, total| {
                if let Some(ev) = gauge.sample(downloaded, total.or(size_hint)) {
                    let _ = events.try_send(ev);
                }
            })
        },
        |notice| {
            warn!(
                stream = %desc.id,
                attempt = notice.attempt,
                max_attempts = notice.max_attempts,
                delay_ms = notice.delay.as_millis() as u64,
                error = %notice.error,
                "transfer failed, retrying"
            );
            let _ = events.try_send(FetchEvent::Retrying {
                attempt: notice.attempt,
                max_attempts: notice.max_attempts,
                delay: notice.delay,
            });
        },
    )?;

    // Final sample is never throttled so the phase always reaches 1.0.
    let mut done = gauge.event(written, Some(written));
    if let FetchEvent::Progress { fraction, .. } = &mut done {
        *fraction = Some(1.0);
    }
    let _ = events.try_send(done);
    Ok(dest.to_path_buf())
}
