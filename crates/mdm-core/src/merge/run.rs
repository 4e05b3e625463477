//! Runs one ffmpeg mux attempt under watchdog supervision.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{MergeError, MergeProgress};
use crate::config::MergeConfig;

/// Lines of stderr kept for error reporting.
const TAIL_LINES: usize = 20;

/// Extracts the elapsed media time from an ffmpeg progress line.
///
/// ffmpeg writes lines like
/// `frame= 1234 fps=30 ... time=00:01:23.45 bitrate= ...` while muxing.
pub fn parse_time_line(line: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"time=(\d{2,}):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap()
    });
    let caps = re.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn fraction_of(elapsed_media: f64, duration: Option<f64>) -> Option<f64> {
    duration
        .filter(|d| *d > 0.0)
        .map(|d| (elapsed_media / d).clamp(0.0, 1.0))
}

/// Spawns ffmpeg with `args` and supervises it until completion.
///
/// Progress is derived from `time=` stderr lines against the known media
/// duration; the watchdog tracks output file growth and stderr liveness and
/// kills a wedged process. Progress sends are best-effort.
pub async fn run_mux(
    ffmpeg_bin: &str,
    args: Vec<OsString>,
    output_path: &Path,
    duration: Option<f64>,
    budget: Duration,
    cfg: &MergeConfig,
    progress: &mpsc::Sender<MergeProgress>,
) -> Result<(), MergeError> {
    debug!(bin = ffmpeg_bin, out = %output_path.display(), "starting mux");
    let mut child = Command::new(ffmpeg_bin)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("ffmpeg stderr not captured"))?;
    let mut lines = BufReader::new(stderr).lines();

    let start = Instant::now();
    let mut dog = super::watchdog::Watchdog::new(
        budget,
        Duration::from_secs(cfg.stall_floor_secs),
        Duration::from_secs(cfg.telemetry_idle_secs),
        start,
    );
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.poll_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

    let _ = progress.try_send(MergeProgress {
        fraction: Some(0.0).filter(|_| duration.is_some()),
        elapsed_media_secs: 0.0,
    });

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(text) => {
                        let now = Instant::now();
                        dog.record_telemetry(now);
                        if let Some(elapsed) = parse_time_line(&text) {
                            let _ = progress.try_send(MergeProgress {
                                fraction: fraction_of(elapsed, duration),
                                elapsed_media_secs: elapsed,
                            });
                        }
                        if tail.len() == TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(text);
                    }
                    // stderr closed: ffmpeg is finishing up.
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                if let Ok(meta) = tokio::fs::metadata(output_path).await {
                    dog.record_output_size(meta.len(), now);
                }
                match dog.check(now) {
                    super::watchdog::Verdict::Healthy => {}
                    super::watchdog::Verdict::StallWarning(n) => {
                        warn!(out = %output_path.display(), strikes = n, "mux appears stalled");
                    }
                    super::watchdog::Verdict::Abort { stalled_for } => {
                        warn!(out = %output_path.display(), stalled_for, "killing stalled mux");
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return Err(MergeError::Stalled { stalled_for });
                    }
                }
            }
        }
    }

    // Give the process the remaining budget to exit after closing stderr.
    let status = match tokio::time::timeout(budget, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(MergeError::Stalled {
                stalled_for: budget.as_secs_f64(),
            });
        }
    };

    if !status.success() {
        let tail_text: Vec<String> = tail.into_iter().collect();
        return Err(MergeError::NonZeroExit {
            code: status.code(),
            tail: tail_text.join("\n"),
        });
    }

    let _ = progress.try_send(MergeProgress {
        fraction: Some(1.0),
        elapsed_media_secs: duration.unwrap_or(0.0),
    });
    Ok(())
}
