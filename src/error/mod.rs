//! Error handling module for video-compress

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for library-level operations
#[derive(Error, Debug)]
pub enum VideoCompressError {
    /// FFmpeg initialization error
    #[error("Failed to initialize FFmpeg: {message}")]
    FFmpegInitError { message: String },

    /// Domain error surfaced by a use case
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
}

/// Result type alias for library operations
pub type VideoCompressResult<T> = std::result::Result<T, VideoCompressError>;
