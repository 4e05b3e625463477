//! `mdm formats <url>` – list the streams a source offers.

use anyhow::Result;

use mdm_core::config::MdmConfig;
use mdm_core::extract::{SourceExtractor, YtdlpExtractor};

pub async fn run_formats(cfg: &MdmConfig, url: &str) -> Result<()> {
    let extractor = YtdlpExtractor::new(cfg.ytdlp_bin.clone());
    let info = extractor.extract(url).await?;

    if let Some(title) = &info.title {
        println!("{title}");
    }
    if let Some(duration) = info.duration_seconds {
        println!("duration: {duration:.0}s");
    }

    println!("{:>8}  {:6}  {:12}  {:12}  {:>10}  {:>12}", "id", "ext", "vcodec", "acodec", "kbps", "size");
    for s in &info.streams {
        println!(
            "{:>8}  {:6}  {:12}  {:12}  {:>10}  {:>12}",
            s.id,
            s.container,
            s.vcodec.as_deref().unwrap_or("-"),
            s.acodec.as_deref().unwrap_or("-"),
            s.bitrate_kbps
                .map(|b| format!("{b:.0}"))
                .unwrap_or_else(|| "-".to_string()),
            s.approx_size_bytes
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}
