use std::sync::Arc;

use crate::adapters::{AppConfig, LibavProbeAdapter, LibavToolkit, LocalFsAdapter};
use crate::app::compress_interactor::{CompressInteractor, CompressSettings};
use crate::ports::{FsPort, MediaToolkit, ProbePort};

pub trait AppContainer: Send + Sync {
    type Toolkit: MediaToolkit;

    fn compress_interactor(&self) -> Arc<CompressInteractor<Self::Toolkit>>;
}

pub struct DefaultAppContainer {
    compress_interactor: Arc<CompressInteractor<LibavToolkit>>,
}

impl DefaultAppContainer {
    pub fn new(config: &AppConfig) -> Self {
        let probe_port = Arc::new(LibavProbeAdapter::new());
        let fs_port = Arc::new(LocalFsAdapter::new());
        let toolkit = Arc::new(LibavToolkit::new());

        let settings = CompressSettings {
            cache_dir: config.cache_dir.clone(),
            defaults: config.strategy_defaults(),
            channel_depth: config.channel_depth,
        };

        let compress_interactor = Arc::new(CompressInteractor::new(
            probe_port as Arc<dyn ProbePort>,
            fs_port as Arc<dyn FsPort>,
            toolkit,
            settings,
        ));

        Self { compress_interactor }
    }
}

impl AppContainer for DefaultAppContainer {
    type Toolkit = LibavToolkit;

    fn compress_interactor(&self) -> Arc<CompressInteractor<LibavToolkit>> {
        Arc::clone(&self.compress_interactor)
    }
}
