// Adapters - External system implementations

pub mod exec_libav;
pub mod fs_local;
pub mod probe_libav;
pub mod toml_config;

// Re-export adapters
pub use exec_libav::LibavToolkit;
pub use fs_local::LocalFsAdapter;
pub use probe_libav::LibavProbeAdapter;
pub use toml_config::{AppConfig, ProgressStyle, TomlConfigAdapter};
