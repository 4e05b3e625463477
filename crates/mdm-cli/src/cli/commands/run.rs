//! `mdm run <url> --format <sel>` – run one job to completion, printing
//! progress until it reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use mdm_core::config::MdmConfig;
use mdm_core::driver::JobDriver;
use mdm_core::extract::YtdlpExtractor;
use mdm_core::job::{JobRequest, JobStatus};
use mdm_core::merge::FfmpegMerger;
use mdm_core::publish::ProgressPublisher;
use mdm_core::retry::RetryPolicy;
use mdm_core::storage::LocalStorage;
use mdm_core::store::JobStore;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run_job(
    cfg: &MdmConfig,
    url: String,
    format: String,
    title: Option<String>,
    ext: Option<String>,
) -> Result<()> {
    let store = Arc::new(JobStore::new());
    let publisher = Arc::new(ProgressPublisher::new());
    let extractor = Arc::new(YtdlpExtractor::new(cfg.ytdlp_bin.clone()));
    let merger = Arc::new(FfmpegMerger::new(
        cfg.ffmpeg_bin.clone(),
        cfg.ffprobe_bin.clone(),
        cfg.merge_config(),
    ));
    let storage = LocalStorage::from_config(cfg)?;
    let retry = RetryPolicy::from_config(&cfg.retry_config());

    let driver = Arc::new(JobDriver::new(
        store.clone(),
        publisher,
        extractor,
        merger,
        storage,
        retry,
    ));

    let id = driver.submit(JobRequest {
        url,
        format_selector: format,
        title,
        ext_hint: ext,
    });
    println!("job {id}");

    // The store always holds the latest snapshot; polling it avoids racing
    // the spawned job for a subscription.
    let mut last_line = String::new();
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let Some(snap) = store.get(&id) else { continue };

        let mut line = format!(
            "{:>11}  {:5.1}%  {}",
            snap.status.as_str(),
            snap.progress01 * 100.0,
            snap.message
        );
        if let Some(speed) = snap.speed_bps {
            line.push_str(&format!("  {:.1} MiB/s", speed / (1024.0 * 1024.0)));
        }
        if line != last_line {
            println!("{line}");
            last_line = line;
        }

        if snap.status.is_terminal() {
            match snap.status {
                JobStatus::Finished => {
                    let result = snap
                        .result
                        .ok_or_else(|| anyhow::anyhow!("finished job has no result"))?;
                    println!(
                        "saved {} ({} bytes, {})",
                        result.path.display(),
                        result.size_bytes,
                        result.mime
                    );
                    return Ok(());
                }
                _ => {
                    bail!(
                        "job failed: {}",
                        snap.error.unwrap_or_else(|| "unknown error".to_string())
                    );
                }
            }
        }
    }
}
