//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the compress command
#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path (default: generated in the cache directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Quality preset, 1 (low) to 7 (1920x1080)
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=7))]
    pub quality: u8,

    /// Target video bitrate in bits per second
    #[arg(short, long)]
    pub bitrate: Option<i64>,

    /// Target frame rate
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Trim start in seconds
    #[arg(short, long)]
    pub start: Option<f64>,

    /// Trim duration in seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Drop the audio track
    #[arg(long)]
    pub no_audio: bool,

    /// Delete the source after a successful transcode
    #[arg(long)]
    pub delete_origin: bool,

    /// Compression strategy (manual, preset)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Progress output (console, json, none)
    #[arg(long)]
    pub progress: Option<String>,
}

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,
}
