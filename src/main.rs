//! video-compress CLI
//!
//! Re-encodes a video to H.264/AAC MP4 with optional trimming and audio
//! stripping. The result payload is printed as JSON on stdout; logs and
//! console progress go to stderr.
//!
//! # Usage
//!
//! ```bash
//! video-compress compress --input clip.mov --quality 6
//! video-compress compress --input clip.mov --bitrate 2000000 --start 5 --duration 10
//! video-compress info --input clip.mp4
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use video_compress::adapters::{ProgressStyle, TomlConfigAdapter};
use video_compress::app::DefaultAppContainer;
use video_compress::cli::commands::{self, CommandReport};
use video_compress::cli::{Cli, Commands};
use video_compress::utils::logging;

/// Main entry point for the video-compress CLI
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            println!("{}", report.payload);
            ExitCode::from(report.exit_code)
        }
        Err(e) => {
            error!("{:#}", e);
            println!("{}", commands::error_payload(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<CommandReport> {
    let config = TomlConfigAdapter::load(cli.config.as_deref())?;

    let directive = logging::resolve_filter(cli.log_level.as_deref(), &config.log_level, |key| {
        std::env::var(key).ok()
    });
    logging::init(&directive, config.json_logs);

    video_compress::init()?;
    info!("Starting video-compress");

    let container = DefaultAppContainer::new(&config);

    match cli.command {
        Commands::Compress(args) => {
            let style = match &args.progress {
                Some(style) => ProgressStyle::parse(style)?,
                None => config.progress,
            };
            commands::compress(&container, args, style).await
        }
        Commands::Info(args) => commands::info(&container, args).await,
    }
}
