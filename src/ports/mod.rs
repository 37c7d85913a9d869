// Ports - Interface definitions (contracts)

use std::path::Path;

use async_trait::async_trait;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Port for read-only media metadata queries
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Describe the first video and audio tracks of a container
    async fn probe_tracks(&self, path: &Path) -> Result<SourceTracks, DomainError>;

    /// Metadata payload for a file. `Ok(None)` when the container has no
    /// readable video track.
    async fn media_info(&self, path: &Path) -> Result<Option<MediaInfo>, DomainError>;
}

/// Port for file system operations
#[async_trait]
pub trait FsPort: Send + Sync {
    /// Check if file exists
    async fn file_exists(&self, path: &Path) -> bool;

    /// Delete file
    async fn delete_file(&self, path: &Path) -> Result<(), DomainError>;

    /// Create directory and parents
    async fn create_directory(&self, path: &Path) -> Result<(), DomainError>;
}

/// Reader lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderStatus {
    Unknown,
    Reading,
    Completed,
    Failed,
    Cancelled,
}

/// Writer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterStatus {
    Unknown,
    Writing,
    Completed,
    Failed,
    Cancelled,
}

/// One decoded unit pulled from a track output
pub trait MediaSample: Send {
    /// Progress units this sample represents: 1 for a video frame, the
    /// per-channel sample count for an audio buffer
    fn sample_count(&self) -> u64;
}

/// Pull side of one source track
#[async_trait]
pub trait TrackOutput: Send {
    type Sample: MediaSample + 'static;

    /// Next decoded sample, `None` once the track is drained or the reader
    /// stopped. Must be cancel-safe.
    async fn copy_next_sample(&mut self) -> Option<Self::Sample>;
}

/// Push side of one output track
#[async_trait]
pub trait TrackInput: Send {
    type Sample: MediaSample + 'static;

    /// Wait until the writer can take another sample. `false` when the writer
    /// no longer accepts data. Must be cancel-safe.
    async fn ready_for_more_data(&mut self) -> bool;

    /// Hand a sample to the writer. `false` when it was rejected.
    async fn append(&mut self, sample: Self::Sample) -> bool;

    /// No more samples will be appended to this track
    fn mark_as_finished(&mut self);
}

/// Demuxing and decoding session over one source
pub trait AssetReader: Send + Sync {
    fn status(&self) -> ReaderStatus;

    fn start_reading(&self) -> bool;

    fn cancel_reading(&self);
}

/// Encoding and muxing session over one destination
#[async_trait]
pub trait AssetWriter: Send + Sync {
    fn status(&self) -> WriterStatus;

    /// Terminal error, if the writer failed
    fn error(&self) -> Option<DomainError>;

    /// Begin writing and start the session at time zero
    fn start_writing(&self) -> bool;

    /// Flush encoders and finalize the container
    async fn finish_writing(&self);

    fn cancel_writing(&self);
}

/// Reader parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSetup {
    pub time_range: TimeRange,
    /// Keep one of every `cadence_ratio` video frames
    pub cadence_ratio: u32,
    pub include_audio: bool,
    /// Depth of the per-track sample queues
    pub channel_depth: usize,
}

/// Reader with its track outputs
pub struct OpenedReader<T: MediaToolkit + ?Sized> {
    pub reader: T::Reader,
    pub video: T::Output,
    pub audio: Option<T::Output>,
}

/// Writer with its track inputs
pub struct OpenedWriter<T: MediaToolkit + ?Sized> {
    pub writer: T::Writer,
    pub video: T::Input,
    pub audio: Option<T::Input>,
}

/// Port for the decode/encode toolkit
#[async_trait]
pub trait MediaToolkit: Send + Sync + 'static {
    type Sample: MediaSample + 'static;
    type Output: TrackOutput<Sample = Self::Sample> + 'static;
    type Input: TrackInput<Sample = Self::Sample> + 'static;
    type Reader: AssetReader + 'static;
    type Writer: AssetWriter + 'static;

    /// Open the source and register track outputs
    async fn open_reader(
        &self,
        source: &Path,
        setup: ReaderSetup,
    ) -> Result<OpenedReader<Self>, DomainError>;

    /// Create the destination and register track inputs. Any registration
    /// failure is an `IoFailure`.
    async fn open_writer(
        &self,
        destination: &Path,
        config: &OutputTrackConfig,
        channel_depth: usize,
    ) -> Result<OpenedWriter<Self>, DomainError>;
}
