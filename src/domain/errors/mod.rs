// Domain errors - Error types for the domain layer

use thiserror::Error;

/// Domain-specific error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Source has no video track or cannot be read
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
    /// Missing or invalid transcode parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Reader/writer registration or terminal failure
    #[error("I/O failure: {0}")]
    IoFailure(String),
    /// Source could not be removed after a successful transcode
    #[error("Failed to delete origin: {0}")]
    DeleteOriginFailure(String),
    /// A transcode session is already running on this controller
    #[error("A compression session is already active")]
    SessionBusy,
    /// Metadata query failed
    #[error("Probe failed: {0}")]
    ProbeFailure(String),
    /// Configuration file problem
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    /// Stable identifier used in result payloads
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::UnsupportedSource(_) => "unsupported_source",
            DomainError::InvalidConfig(_) => "invalid_config",
            DomainError::IoFailure(_) => "io_failure",
            DomainError::DeleteOriginFailure(_) => "delete_origin_failure",
            DomainError::SessionBusy => "session_busy",
            DomainError::ProbeFailure(_) => "probe_failure",
            DomainError::Config(_) => "config",
        }
    }
}
