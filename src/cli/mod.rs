//! CLI module for video-compress
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// video-compress
///
/// Re-encodes a video to H.264/AAC MP4 with optional trimming, audio
/// stripping, progress reporting and cancellation.
#[derive(Parser, Debug)]
#[command(name = "video-compress")]
#[command(about = "Compress videos to H.264/AAC MP4")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "VIDEO_COMPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level or filter directive
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcode a video file
    Compress(args::CompressArgs),
    /// Print metadata for a video file
    Info(args::InfoArgs),
}
