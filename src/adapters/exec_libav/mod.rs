//! FFmpeg media toolkit using libav bindings
//!
//! The reader and the writer each own their FFmpeg contexts on a dedicated
//! thread. Only decoded frames cross threads: bounded per-track channels carry
//! samples from the demux thread, and one command channel gated by a credit
//! semaphore carries them into the mux thread.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ffmpeg_next::util::frame;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use crate::domain::errors::DomainError;
use crate::domain::model::{OutputTrackConfig, TrackKind};
use crate::ports::*;

mod reader;
mod writer;

pub use reader::LibavReader;
pub use writer::LibavWriter;

/// Decoded video frame with its presentation time relative to the trim start
pub struct VideoSample {
    pub frame: frame::Video,
    pub time: f64,
}

/// Mono F32 PCM at the output sample rate
pub struct AudioSample {
    pub samples: Vec<f32>,
    pub time: f64,
}

/// One unit moved from the demux thread to the mux thread
pub enum LibavSample {
    Video(VideoSample),
    Audio(AudioSample),
}

impl MediaSample for LibavSample {
    fn sample_count(&self) -> u64 {
        match self {
            LibavSample::Video(_) => 1,
            LibavSample::Audio(audio) => audio.samples.len() as u64,
        }
    }
}

/// Status enum that can live in an atomic
pub(crate) trait AtomicStatus: Copy {
    fn to_code(self) -> u8;
    fn from_code(code: u8) -> Self;
}

impl AtomicStatus for ReaderStatus {
    fn to_code(self) -> u8 {
        match self {
            ReaderStatus::Unknown => 0,
            ReaderStatus::Reading => 1,
            ReaderStatus::Completed => 2,
            ReaderStatus::Failed => 3,
            ReaderStatus::Cancelled => 4,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => ReaderStatus::Reading,
            2 => ReaderStatus::Completed,
            3 => ReaderStatus::Failed,
            4 => ReaderStatus::Cancelled,
            _ => ReaderStatus::Unknown,
        }
    }
}

impl AtomicStatus for WriterStatus {
    fn to_code(self) -> u8 {
        match self {
            WriterStatus::Unknown => 0,
            WriterStatus::Writing => 1,
            WriterStatus::Completed => 2,
            WriterStatus::Failed => 3,
            WriterStatus::Cancelled => 4,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => WriterStatus::Writing,
            2 => WriterStatus::Completed,
            3 => WriterStatus::Failed,
            4 => WriterStatus::Cancelled,
            _ => WriterStatus::Unknown,
        }
    }
}

/// Lifecycle state shared between an async handle and its worker thread
pub(crate) struct StatusCell<S: AtomicStatus> {
    code: AtomicU8,
    _status: PhantomData<S>,
}

impl<S: AtomicStatus> StatusCell<S> {
    pub(crate) fn new(status: S) -> Self {
        Self {
            code: AtomicU8::new(status.to_code()),
            _status: PhantomData,
        }
    }

    pub(crate) fn get(&self) -> S {
        S::from_code(self.code.load(Ordering::SeqCst))
    }

    /// Move `from -> to`; false if the current state is not `from`
    pub(crate) fn transition(&self, from: S, to: S) -> bool {
        self.code
            .compare_exchange(from.to_code(), to.to_code(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Decoded sample stream for one source track
pub struct LibavTrackOutput {
    rx: mpsc::Receiver<LibavSample>,
}

#[async_trait]
impl TrackOutput for LibavTrackOutput {
    type Sample = LibavSample;

    async fn copy_next_sample(&mut self) -> Option<LibavSample> {
        self.rx.recv().await
    }
}

/// Commands processed in order by the mux thread
pub(crate) enum WriterCommand {
    Append(TrackKind, LibavSample),
    EndOfTrack(TrackKind),
    Finish(tokio::sync::oneshot::Sender<()>),
    Cancel,
}

/// Encode input for one output track
pub struct LibavTrackInput {
    kind: TrackKind,
    tx: mpsc::UnboundedSender<WriterCommand>,
    credits: Arc<Semaphore>,
    status: Arc<StatusCell<WriterStatus>>,
    permit: Option<OwnedSemaphorePermit>,
    finished: bool,
}

impl LibavTrackInput {
    pub(crate) fn new(
        kind: TrackKind,
        tx: mpsc::UnboundedSender<WriterCommand>,
        credits: Arc<Semaphore>,
        status: Arc<StatusCell<WriterStatus>>,
    ) -> Self {
        Self {
            kind,
            tx,
            credits,
            status,
            permit: None,
            finished: false,
        }
    }

    fn accepting(&self) -> bool {
        !self.finished && self.status.get() == WriterStatus::Writing
    }
}

#[async_trait]
impl TrackInput for LibavTrackInput {
    type Sample = LibavSample;

    async fn ready_for_more_data(&mut self) -> bool {
        if !self.accepting() {
            return false;
        }
        if self.permit.is_some() {
            return true;
        }
        match self.credits.clone().acquire_owned().await {
            Ok(permit) => {
                self.permit = Some(permit);
                self.accepting()
            }
            Err(_) => false,
        }
    }

    async fn append(&mut self, sample: LibavSample) -> bool {
        if !self.ready_for_more_data().await {
            return false;
        }
        // The mux thread hands the credit back once the sample is encoded
        if let Some(permit) = self.permit.take() {
            permit.forget();
        }
        self.tx
            .send(WriterCommand::Append(self.kind, sample))
            .is_ok()
    }

    fn mark_as_finished(&mut self) {
        if !self.finished {
            self.finished = true;
            self.permit = None;
            let _ = self.tx.send(WriterCommand::EndOfTrack(self.kind));
        }
    }
}

/// [`MediaToolkit`] backed by FFmpeg
#[derive(Debug, Clone, Default)]
pub struct LibavToolkit;

impl LibavToolkit {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaToolkit for LibavToolkit {
    type Sample = LibavSample;
    type Output = LibavTrackOutput;
    type Input = LibavTrackInput;
    type Reader = LibavReader;
    type Writer = LibavWriter;

    async fn open_reader(
        &self,
        source: &Path,
        setup: ReaderSetup,
    ) -> Result<OpenedReader<Self>, DomainError> {
        reader::open(source, setup).await
    }

    async fn open_writer(
        &self,
        destination: &Path,
        config: &OutputTrackConfig,
        channel_depth: usize,
    ) -> Result<OpenedWriter<Self>, DomainError> {
        writer::open(destination, config, channel_depth).await
    }
}
