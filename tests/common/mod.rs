//! In-memory media world shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use video_compress::app::{CompressInteractor, CompressSettings};
use video_compress::domain::errors::DomainError;
use video_compress::domain::model::*;
use video_compress::domain::rules::StrategyDefaults;
use video_compress::engine::progress::ProgressCallback;
use video_compress::ports::*;

pub const CACHE_DIR: &str = "/cache";
pub const SOURCE: &str = "/videos/source.mov";

/// Files, directories and failure switches shared by every fake
#[derive(Default)]
pub struct World {
    files: Mutex<HashMap<PathBuf, SourceTracks>>,
    dirs: Mutex<HashSet<PathBuf>>,
    pub fail_delete: Mutex<HashSet<PathBuf>>,
    pub fail_open_writer: AtomicBool,
    pub one_sided_audio: AtomicBool,
    /// Writer fails once this many samples were appended
    pub writer_fails_after: Mutex<Option<u64>>,
    /// Video output stops yielding after this many samples
    pub stall_video_after: Mutex<Option<u64>>,
    pub video_appended: AtomicU64,
    pub audio_appended: AtomicU64,
    pub writers_opened: AtomicU64,
    pub reader_setups: Mutex<Vec<ReaderSetup>>,
    pub writer_configs: Mutex<Vec<OutputTrackConfig>>,
    /// Runs once the writer has finalized, before `finish_writing` returns
    pub on_finish: Mutex<Option<FinishHook>>,
}

pub type FinishHook = Arc<dyn Fn() + Send + Sync>;

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, tracks: SourceTracks) {
        self.files.lock().unwrap().insert(path.into(), tracks);
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path) || self.dirs.lock().unwrap().contains(path)
    }

    pub fn tracks(&self, path: &Path) -> Option<SourceTracks> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn remove_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().remove(path).is_some()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn last_setup(&self) -> Option<ReaderSetup> {
        self.reader_setups.lock().unwrap().last().cloned()
    }

    pub fn last_writer_config(&self) -> Option<OutputTrackConfig> {
        self.writer_configs.lock().unwrap().last().cloned()
    }
}

pub fn video_track(width: u32, height: u32, fps: f64, duration: f64) -> VideoTrackDescriptor {
    VideoTrackDescriptor {
        width,
        height,
        nominal_frame_rate: fps,
        duration,
        transform: AffineTransform::identity(),
    }
}

pub fn audio_track(duration: f64) -> AudioTrackDescriptor {
    AudioTrackDescriptor {
        sample_rate: 48_000,
        channels: 2,
        duration,
    }
}

/// 1920x1080 at `fps` with stereo audio, `duration` seconds
pub fn hd_source(fps: f64, duration: f64) -> SourceTracks {
    SourceTracks {
        video: Some(video_track(1920, 1080, fps, duration)),
        audio: Some(audio_track(duration)),
    }
}

// ---------------------------------------------------------------------------
// Probe and filesystem
// ---------------------------------------------------------------------------

pub struct FakeProbe {
    world: Arc<World>,
}

#[async_trait]
impl ProbePort for FakeProbe {
    async fn probe_tracks(&self, path: &Path) -> Result<SourceTracks, DomainError> {
        self.world.tracks(path).ok_or_else(|| {
            DomainError::UnsupportedSource(format!("File does not exist: {}", path.display()))
        })
    }

    async fn media_info(&self, path: &Path) -> Result<Option<MediaInfo>, DomainError> {
        let tracks = self.probe_tracks(path).await?;
        let Some(video) = tracks.video else {
            return Ok(None);
        };
        let (width, height) = video
            .transform
            .apply_to_size(f64::from(video.width), f64::from(video.height));
        Ok(Some(MediaInfo {
            path: path.to_string_lossy().to_string(),
            title: None,
            author: None,
            width: width as u32,
            height: height as u32,
            duration: video.duration * 1000.0,
            filesize: 1024,
            orientation: video.rotation().degrees(),
            is_cancel: false,
        }))
    }
}

pub struct FakeFs {
    world: Arc<World>,
}

#[async_trait]
impl FsPort for FakeFs {
    async fn file_exists(&self, path: &Path) -> bool {
        self.world.exists(path)
    }

    async fn delete_file(&self, path: &Path) -> Result<(), DomainError> {
        if self.world.fail_delete.lock().unwrap().contains(path) {
            return Err(DomainError::IoFailure(format!("Permission denied: {}", path.display())));
        }
        if self.world.remove_file(path) {
            Ok(())
        } else {
            Err(DomainError::IoFailure(format!("No such file: {}", path.display())))
        }
    }

    async fn create_directory(&self, path: &Path) -> Result<(), DomainError> {
        self.world.dirs.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Toolkit
// ---------------------------------------------------------------------------

pub struct FakeSample {
    count: u64,
}

impl MediaSample for FakeSample {
    fn sample_count(&self) -> u64 {
        self.count
    }
}

pub struct FakeOutput {
    remaining: Vec<u64>,
    yielded: u64,
    stall_after: Option<u64>,
    reader_status: Arc<Mutex<ReaderStatus>>,
}

#[async_trait]
impl TrackOutput for FakeOutput {
    type Sample = FakeSample;

    async fn copy_next_sample(&mut self) -> Option<FakeSample> {
        if *self.reader_status.lock().unwrap() != ReaderStatus::Reading {
            return None;
        }
        if self.stall_after.map_or(false, |n| self.yielded >= n) {
            std::future::pending::<()>().await;
        }
        let count = self.remaining.pop()?;
        self.yielded += 1;
        tokio::task::yield_now().await;
        Some(FakeSample { count })
    }
}

pub struct FakeReader {
    status: Arc<Mutex<ReaderStatus>>,
}

impl AssetReader for FakeReader {
    fn status(&self) -> ReaderStatus {
        *self.status.lock().unwrap()
    }

    fn start_reading(&self) -> bool {
        let mut status = self.status.lock().unwrap();
        if *status != ReaderStatus::Unknown {
            return false;
        }
        *status = ReaderStatus::Reading;
        true
    }

    fn cancel_reading(&self) {
        let mut status = self.status.lock().unwrap();
        if matches!(*status, ReaderStatus::Unknown | ReaderStatus::Reading) {
            *status = ReaderStatus::Cancelled;
        }
    }
}

struct WriterState {
    status: WriterStatus,
    error: Option<DomainError>,
    appended: u64,
}

pub struct FakeWriter {
    world: Arc<World>,
    destination: PathBuf,
    config: OutputTrackConfig,
    state: Arc<Mutex<WriterState>>,
}

#[async_trait]
impl AssetWriter for FakeWriter {
    fn status(&self) -> WriterStatus {
        self.state.lock().unwrap().status
    }

    fn error(&self) -> Option<DomainError> {
        self.state.lock().unwrap().error.clone()
    }

    fn start_writing(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status != WriterStatus::Unknown {
            return false;
        }
        state.status = WriterStatus::Writing;
        true
    }

    async fn finish_writing(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.status != WriterStatus::Writing {
                return;
            }
            state.status = WriterStatus::Completed;
        }
        let video = &self.config.video;
        self.world.add_file(
            &self.destination,
            SourceTracks {
                video: Some(VideoTrackDescriptor {
                    width: video.width,
                    height: video.height,
                    nominal_frame_rate: f64::from(video.frame_rate),
                    duration: 1.0,
                    transform: video.transform.unwrap_or_default(),
                }),
                audio: self.config.audio.as_ref().map(|a| AudioTrackDescriptor {
                    sample_rate: a.sample_rate,
                    channels: a.channels,
                    duration: 1.0,
                }),
            },
        );
        let hook = self.world.on_finish.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn cancel_writing(&self) {
        let mut state = self.state.lock().unwrap();
        if matches!(state.status, WriterStatus::Unknown | WriterStatus::Writing) {
            state.status = WriterStatus::Cancelled;
            self.world.remove_file(&self.destination);
        }
    }
}

pub struct FakeInput {
    kind: TrackKind,
    world: Arc<World>,
    state: Arc<Mutex<WriterState>>,
    finished: bool,
}

#[async_trait]
impl TrackInput for FakeInput {
    type Sample = FakeSample;

    async fn ready_for_more_data(&mut self) -> bool {
        !self.finished && self.state.lock().unwrap().status == WriterStatus::Writing
    }

    async fn append(&mut self, _sample: FakeSample) -> bool {
        if !self.ready_for_more_data().await {
            return false;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = *self.world.writer_fails_after.lock().unwrap() {
            if state.appended >= limit {
                state.status = WriterStatus::Failed;
                state.error = Some(DomainError::IoFailure("Disk full".to_string()));
                return false;
            }
        }
        state.appended += 1;
        let counter = match self.kind {
            TrackKind::Video => &self.world.video_appended,
            TrackKind::Audio => &self.world.audio_appended,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn mark_as_finished(&mut self) {
        self.finished = true;
    }
}

/// Toolkit whose reader synthesizes samples from the probed track layout
pub struct FakeToolkit {
    world: Arc<World>,
}

/// Audio buffer size the fake reader emits
pub const AUDIO_BUFFER: u64 = 1024;

#[async_trait]
impl MediaToolkit for FakeToolkit {
    type Sample = FakeSample;
    type Output = FakeOutput;
    type Input = FakeInput;
    type Reader = FakeReader;
    type Writer = FakeWriter;

    async fn open_reader(
        &self,
        source: &Path,
        setup: ReaderSetup,
    ) -> Result<OpenedReader<Self>, DomainError> {
        let tracks = self
            .world
            .tracks(source)
            .ok_or_else(|| DomainError::UnsupportedSource("missing".to_string()))?;
        let video = tracks
            .video
            .ok_or_else(|| DomainError::UnsupportedSource("no video".to_string()))?;
        self.world.reader_setups.lock().unwrap().push(setup.clone());

        let status = Arc::new(Mutex::new(ReaderStatus::Unknown));
        let source_frames = (setup.time_range.duration * video.nominal_frame_rate.round()).floor() as u64;
        let kept = source_frames.div_ceil(u64::from(setup.cadence_ratio.max(1)));
        let video_out = FakeOutput {
            remaining: vec![1; kept as usize],
            yielded: 0,
            stall_after: *self.world.stall_video_after.lock().unwrap(),
            reader_status: status.clone(),
        };

        let audio_out = match (setup.include_audio, tracks.audio) {
            (true, Some(audio)) => {
                let end = audio.duration.min(setup.time_range.end());
                let total = ((end - setup.time_range.start).max(0.0)
                    * f64::from(AUDIO_SAMPLE_RATE))
                .floor() as u64;
                let mut buffers = vec![AUDIO_BUFFER; (total / AUDIO_BUFFER) as usize];
                if total % AUDIO_BUFFER > 0 {
                    buffers.push(total % AUDIO_BUFFER);
                }
                Some(FakeOutput {
                    remaining: buffers,
                    yielded: 0,
                    stall_after: None,
                    reader_status: status.clone(),
                })
            }
            _ => None,
        };

        Ok(OpenedReader {
            reader: FakeReader { status },
            video: video_out,
            audio: audio_out,
        })
    }

    async fn open_writer(
        &self,
        destination: &Path,
        config: &OutputTrackConfig,
        _channel_depth: usize,
    ) -> Result<OpenedWriter<Self>, DomainError> {
        if self.world.fail_open_writer.load(Ordering::SeqCst) {
            return Err(DomainError::IoFailure("Cannot add video input".to_string()));
        }
        self.world.writers_opened.fetch_add(1, Ordering::SeqCst);
        self.world.writer_configs.lock().unwrap().push(config.clone());

        let state = Arc::new(Mutex::new(WriterState {
            status: WriterStatus::Unknown,
            error: None,
            appended: 0,
        }));
        let input = |kind| FakeInput {
            kind,
            world: self.world.clone(),
            state: state.clone(),
            finished: false,
        };
        let audio = if self.world.one_sided_audio.load(Ordering::SeqCst) {
            None
        } else {
            config.audio.as_ref().map(|_| input(TrackKind::Audio))
        };

        Ok(OpenedWriter {
            writer: FakeWriter {
                world: self.world.clone(),
                destination: destination.to_path_buf(),
                config: config.clone(),
                state: state.clone(),
            },
            video: input(TrackKind::Video),
            audio,
        })
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingProgress {
    pub ticks: Mutex<Vec<f64>>,
    pub completed: AtomicU64,
    pub cancelled: AtomicU64,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn ticks(&self) -> Vec<f64> {
        self.ticks.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, percent: f64) {
        self.ticks.lock().unwrap().push(percent);
    }

    fn on_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub world: Arc<World>,
    pub interactor: Arc<CompressInteractor<FakeToolkit>>,
    pub progress: Arc<RecordingProgress>,
}

impl Harness {
    /// Interactor over a world containing `SOURCE` with the given tracks
    pub fn with_source(tracks: SourceTracks) -> Self {
        let world = World::new();
        world.add_file(SOURCE, tracks);
        let interactor = CompressInteractor::new(
            Arc::new(FakeProbe { world: world.clone() }),
            Arc::new(FakeFs { world: world.clone() }),
            Arc::new(FakeToolkit { world: world.clone() }),
            CompressSettings {
                cache_dir: PathBuf::from(CACHE_DIR),
                defaults: StrategyDefaults::default(),
                channel_depth: 4,
            },
        );
        Self {
            world,
            interactor: Arc::new(interactor),
            progress: Arc::new(RecordingProgress::default()),
        }
    }

    pub fn request(&self) -> TranscodeRequest {
        TranscodeRequest::new(SOURCE)
    }

    pub async fn run(&self, request: TranscodeRequest) -> Result<Outcome, DomainError> {
        self.interactor.start(request, self.progress.clone()).await
    }

    /// Wait until the fake writer has taken `n` video samples
    pub async fn wait_for_video(&self, n: u64) {
        while self.world.video_appended.load(Ordering::SeqCst) < n {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }
}
