use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of fetch attempts per stream (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2.0,
            max_delay_secs: 30,
        }
    }
}

/// Mux watchdog parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Stall budget in seconds for the simple (plain stream-copy) strategy.
    pub simple_watchdog_secs: u64,
    /// Stall budget in seconds for the advanced (mapped/regenerated) strategy.
    pub advanced_watchdog_secs: u64,
    /// Lower bound the shrinking stall window never drops below.
    pub stall_floor_secs: u64,
    /// A stall also requires this many seconds without muxer telemetry.
    pub telemetry_idle_secs: u64,
    /// How often the supervisor polls output growth, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            simple_watchdog_secs: 120,
            advanced_watchdog_secs: 60,
            stall_floor_secs: 30,
            telemetry_idle_secs: 10,
            poll_interval_ms: 100,
        }
    }
}

/// Global configuration loaded from `~/.config/mdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdmConfig {
    /// Directory finished files are moved into. Default: XDG data home.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    /// Scratch directory for in-flight downloads and mux output.
    /// Default: XDG cache home.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Muxer binary.
    pub ffmpeg_bin: String,
    /// Media-inspection binary.
    pub ffprobe_bin: String,
    /// Source extractor binary.
    pub ytdlp_bin: String,
    /// Optional retry policy; built-in defaults when missing.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional watchdog tuning; built-in defaults when missing.
    #[serde(default)]
    pub merge: Option<MergeConfig>,
}

impl Default for MdmConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            scratch_dir: None,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
            retry: None,
            merge: None,
        }
    }
}

impl MdmConfig {
    /// Effective retry section (defaults when absent).
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Effective merge-watchdog section (defaults when absent).
    pub fn merge_config(&self) -> MergeConfig {
        self.merge.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = MdmConfig::default();
        assert_eq!(cfg.ffmpeg_bin, "ffmpeg");
        assert_eq!(cfg.ffprobe_bin, "ffprobe");
        assert_eq!(cfg.ytdlp_bin, "yt-dlp");
        assert_eq!(cfg.retry_config().max_attempts, 3);
        assert_eq!(cfg.merge_config().simple_watchdog_secs, 120);
        assert_eq!(cfg.merge_config().advanced_watchdog_secs, 60);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = MdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.ffmpeg_bin, cfg.ffmpeg_bin);
        assert_eq!(parsed.storage_dir, cfg.storage_dir);
    }

    #[test]
    fn config_toml_custom_sections() {
        let toml = r#"
            ffmpeg_bin = "/opt/ffmpeg/bin/ffmpeg"
            ffprobe_bin = "ffprobe"
            ytdlp_bin = "yt-dlp"
            storage_dir = "/srv/media"

            [retry]
            max_attempts = 5
            base_delay_secs = 0.5
            max_delay_secs = 10

            [merge]
            simple_watchdog_secs = 60
            advanced_watchdog_secs = 30
            stall_floor_secs = 10
            telemetry_idle_secs = 5
            poll_interval_ms = 50
        "#;
        let cfg: MdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.storage_dir, Some(PathBuf::from("/srv/media")));
        assert_eq!(cfg.retry_config().max_attempts, 5);
        assert!((cfg.retry_config().base_delay_secs - 0.5).abs() < 1e-9);
        assert_eq!(cfg.merge_config().stall_floor_secs, 10);
    }
}
