//! video-compress library
//!
//! Sample-level video transcoder: decodes a source container, re-encodes it to
//! H.264/AAC MP4 with optional trimming and audio stripping, and reports
//! progress with cooperative cancellation.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{CompressInteractor, CompressSettings};
pub use domain::errors::DomainError;
pub use domain::model::{MediaInfo, Outcome, QualityPreset, TranscodeRequest};
pub use error::{VideoCompressError, VideoCompressResult};

/// Initialize the library
pub fn init() -> VideoCompressResult<()> {
    ffmpeg_next::init().map_err(|e| VideoCompressError::FFmpegInitError {
        message: e.to_string(),
    })?;

    Ok(())
}
