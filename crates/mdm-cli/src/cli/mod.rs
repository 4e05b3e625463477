//! CLI for the mdm media download engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdm_core::config;

use commands::{run_formats, run_job};

/// Top-level CLI for the mdm media download engine.
#[derive(Debug, Parser)]
#[command(name = "mdm")]
#[command(about = "mdm: download-and-merge engine for media streams", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download (and merge, for video+audio selectors) one media URL.
    Run {
        /// Source page or video URL.
        url: String,

        /// Format selector: a single stream id ("18") or video+audio
        /// ids joined with `+` ("299+140").
        #[arg(long, short)]
        format: String,

        /// Override the output title (otherwise taken from the source).
        #[arg(long)]
        title: Option<String>,

        /// Extension hint when the source does not report a container.
        #[arg(long)]
        ext: Option<String>,
    },

    /// List the streams a source URL offers.
    Formats {
        /// Source page or video URL.
        url: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                url,
                format,
                title,
                ext,
            } => run_job(&cfg, url, format, title, ext).await?,
            CliCommand::Formats { url } => run_formats(&cfg, &url).await?,
        }

        Ok(())
    }
}
