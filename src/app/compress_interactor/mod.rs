// Compress interactor - Orchestrates the transcode use case

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::engine::cancel::CancellationFlag;
use crate::engine::pipeline::{PipelineResult, TranscodePipeline};
use crate::engine::progress::ProgressCallback;
use crate::ports::*;
use crate::utils::path::PathUtils;

/// Settings the interactor reads from configuration
#[derive(Debug, Clone)]
pub struct CompressSettings {
    /// Directory for generated destinations
    pub cache_dir: PathBuf,
    pub defaults: StrategyDefaults,
    /// Depth of reader/writer sample queues
    pub channel_depth: usize,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir(),
            defaults: StrategyDefaults::default(),
            channel_depth: 8,
        }
    }
}

type ActiveSession = Arc<Mutex<Option<CancellationFlag>>>;

/// Clears the active session when the run ends or is dropped
struct SessionGuard {
    active: ActiveSession,
    flag: CancellationFlag,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            *active = None;
        }
    }
}

/// Interactor for the compress use case; owns at most one session at a time
pub struct CompressInteractor<T: MediaToolkit> {
    probe_port: Arc<dyn ProbePort>,
    fs_port: Arc<dyn FsPort>,
    pipeline: TranscodePipeline<T>,
    settings: CompressSettings,
    active: ActiveSession,
}

impl<T: MediaToolkit> CompressInteractor<T> {
    /// Create new compress interactor with injected ports
    pub fn new(
        probe_port: Arc<dyn ProbePort>,
        fs_port: Arc<dyn FsPort>,
        toolkit: Arc<T>,
        settings: CompressSettings,
    ) -> Self {
        let pipeline = TranscodePipeline::new(toolkit, fs_port.clone(), settings.channel_depth);
        Self {
            probe_port,
            fs_port,
            pipeline,
            settings,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start a transcode. The session is registered before the returned
    /// future is first polled, so an early `cancel` is never lost.
    pub fn start(
        &self,
        request: TranscodeRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> impl Future<Output = Result<Outcome, DomainError>> + Send + '_ {
        let session = self.register();
        async move {
            let session = session?;
            self.run_session(request, progress, session).await
        }
    }

    /// Start a transcode on the runtime and return its handle
    pub fn spawn(
        self: &Arc<Self>,
        request: TranscodeRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> JoinHandle<Result<Outcome, DomainError>> {
        let session = self.register();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let session = session?;
            this.run_session(request, progress, session).await
        })
    }

    /// Request cancellation of the active session. Returns whether one was
    /// active; idempotent and a no-op when idle.
    pub fn cancel(&self) -> bool {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(flag) => {
                    if flag.cancel() {
                        info!("Cancellation requested");
                    }
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Whether a session is running
    pub fn is_active(&self) -> bool {
        self.active.lock().map(|a| a.is_some()).unwrap_or(false)
    }

    /// Metadata for a file; an empty record when it has no video track
    pub async fn media_info(&self, path: &Path) -> Result<MediaInfo, DomainError> {
        Ok(self
            .probe_port
            .media_info(path)
            .await?
            .unwrap_or_else(|| MediaInfo::empty(path)))
    }

    fn register(&self) -> Result<SessionGuard, DomainError> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| DomainError::IoFailure("Session state poisoned".to_string()))?;
        if active.is_some() {
            return Err(DomainError::SessionBusy);
        }
        let flag = CancellationFlag::new();
        *active = Some(flag.clone());
        Ok(SessionGuard {
            active: Arc::clone(&self.active),
            flag,
        })
    }

    async fn run_session(
        &self,
        request: TranscodeRequest,
        progress: Arc<dyn ProgressCallback>,
        session: SessionGuard,
    ) -> Result<Outcome, DomainError> {
        info!("Starting compression of {}", request.source.display());

        let plan = self.plan(&request).await?;
        info!(
            "Output {}x{} @ {} fps, {} bps, audio: {}",
            plan.output.video.width,
            plan.output.video.height,
            plan.output.video.frame_rate,
            plan.output.video.bit_rate,
            plan.has_audio()
        );

        let result = self.pipeline.run(&plan, &session.flag, progress.clone()).await;

        let outcome = match result {
            PipelineResult::Completed => {
                progress.on_complete();
                if request.delete_origin {
                    self.delete_origin(&request.source).await;
                }
                let info = self.info_or_empty(&plan.destination).await;
                Outcome::Completed {
                    output_path: plan.destination.clone(),
                    info,
                }
            }
            PipelineResult::Cancelled => {
                progress.on_cancel();
                let info = self.info_or_empty(&request.source).await.with_cancel(true);
                Outcome::Cancelled { info }
            }
            PipelineResult::Failed(error) => {
                warn!("Compression failed: {}", error);
                progress.on_error(&error.to_string());
                Outcome::Failed { error }
            }
        };

        drop(session);
        Ok(outcome)
    }

    /// Pre-start validation; nothing is created on failure
    async fn plan(&self, request: &TranscodeRequest) -> Result<TranscodePlan, DomainError> {
        request.validate()?;
        let tracks = self.probe_port.probe_tracks(&request.source).await?;
        let strategy = StrategySelector::select(request, &self.settings.defaults);
        info!("Using {:?} strategy", strategy.kind());

        let destination = match &request.destination {
            Some(dest) => dest.clone(),
            None => PathUtils::generate_destination(&self.settings.cache_dir, &request.source),
        };
        let plan = TranscodePlanner::plan(request, &tracks, destination, strategy.as_ref())?;

        if let Some(parent) = PathUtils::parent_dir(&plan.destination) {
            if !self.fs_port.file_exists(parent).await {
                self.fs_port.create_directory(parent).await?;
            }
        }
        Ok(plan)
    }

    async fn delete_origin(&self, source: &Path) {
        if let Err(e) = self.fs_port.delete_file(source).await {
            let error = DomainError::DeleteOriginFailure(e.to_string());
            warn!("{}", error);
        } else {
            info!("Deleted origin {}", source.display());
        }
    }

    async fn info_or_empty(&self, path: &Path) -> MediaInfo {
        match self.media_info(path).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Metadata query for {} failed: {}", path.display(), e);
                MediaInfo::empty(path)
            }
        }
    }
}
