// TOML config adapter - Configuration management using TOML files
//
// Precedence: CLI > environment (VIDEO_COMPRESS_*) > file > defaults.
// CLI overrides are applied by the binary after `load`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::domain::model::{DEFAULT_FRAME_RATE, PRESET_FRAME_RATE};
use crate::domain::rules::StrategyDefaults;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "VIDEO_COMPRESS_CONFIG";
/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "video-compress.toml";

/// How progress is reported by the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    Console,
    Json,
    None,
}

impl ProgressStyle {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.to_lowercase().as_str() {
            "console" => Ok(ProgressStyle::Console),
            "json" => Ok(ProgressStyle::Json),
            "none" => Ok(ProgressStyle::None),
            other => Err(DomainError::Config(format!(
                "Unknown progress style '{}'. Valid styles: console, json, none",
                other
            ))),
        }
    }
}

impl fmt::Display for ProgressStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStyle::Console => write!(f, "console"),
            ProgressStyle::Json => write!(f, "json"),
            ProgressStyle::None => write!(f, "none"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for generated destinations
    pub cache_dir: PathBuf,
    pub log_level: String,
    /// Emit logs as JSON
    pub json_logs: bool,
    pub manual_frame_rate: u32,
    pub preset_frame_rate: u32,
    /// Depth of reader/writer sample queues
    pub channel_depth: usize,
    pub progress: ProgressStyle,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("video-compress"),
            log_level: "info".to_string(),
            json_logs: false,
            manual_frame_rate: DEFAULT_FRAME_RATE,
            preset_frame_rate: PRESET_FRAME_RATE,
            channel_depth: 8,
            progress: ProgressStyle::Console,
        }
    }
}

impl AppConfig {
    pub fn strategy_defaults(&self) -> StrategyDefaults {
        StrategyDefaults {
            manual_frame_rate: self.manual_frame_rate,
            preset_frame_rate: self.preset_frame_rate,
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DomainError> {
        if !matches!(
            self.log_level.to_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(DomainError::Config(format!(
                "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                self.log_level
            )));
        }
        if self.manual_frame_rate == 0 || self.preset_frame_rate == 0 {
            return Err(DomainError::Config(
                "Default frame rates must be greater than zero".to_string(),
            ));
        }
        if self.channel_depth == 0 {
            return Err(DomainError::Config(
                "channel_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// On-disk layout: everything lives under one `[video_compress]` table
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    video_compress: AppConfig,
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Load defaults, then the config file, then environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<AppConfig, DomainError> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_file(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                AppConfig::default()
            }
        };
        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse one config file
    pub fn load_file(path: &Path) -> Result<AppConfig, DomainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse TOML content
    pub fn parse(content: &str) -> Result<AppConfig, DomainError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| DomainError::Config(format!("Failed to parse TOML config: {}", e)))?;
        Ok(file.video_compress)
    }

    /// Apply `VIDEO_COMPRESS_*` overrides through a lookup function
    pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<(), DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VIDEO_COMPRESS_CACHE_DIR") {
            config.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VIDEO_COMPRESS_LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("VIDEO_COMPRESS_JSON_LOGS") {
            config.json_logs = parse_env("VIDEO_COMPRESS_JSON_LOGS", &v)?;
        }
        if let Some(v) = lookup("VIDEO_COMPRESS_MANUAL_FRAME_RATE") {
            config.manual_frame_rate = parse_env("VIDEO_COMPRESS_MANUAL_FRAME_RATE", &v)?;
        }
        if let Some(v) = lookup("VIDEO_COMPRESS_PRESET_FRAME_RATE") {
            config.preset_frame_rate = parse_env("VIDEO_COMPRESS_PRESET_FRAME_RATE", &v)?;
        }
        if let Some(v) = lookup("VIDEO_COMPRESS_CHANNEL_DEPTH") {
            config.channel_depth = parse_env("VIDEO_COMPRESS_CHANNEL_DEPTH", &v)?;
        }
        if let Some(v) = lookup("VIDEO_COMPRESS_PROGRESS") {
            config.progress = ProgressStyle::parse(&v)?;
        }
        Ok(())
    }

    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>, DomainError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(DomainError::Config(format!(
                    "Config file does not exist: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::locate(Some(Path::new(&path)));
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(fallback.exists().then_some(fallback))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DomainError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DomainError::Config(format!("Invalid value for {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.manual_frame_rate, 30);
        assert_eq!(config.preset_frame_rate, 25);
        assert_eq!(config.progress, ProgressStyle::Console);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = TomlConfigAdapter::parse(
            r#"
            [video_compress]
            log_level = "debug"
            channel_depth = 4
            progress = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.channel_depth, 4);
        assert_eq!(config.progress, ProgressStyle::Json);
        assert_eq!(config.manual_frame_rate, 30);
    }

    #[test]
    fn test_parse_empty_file() {
        assert_eq!(TomlConfigAdapter::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = TomlConfigAdapter::parse("[video_compress\nlog_level=");
        assert!(matches!(result, Err(DomainError::Config(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = TomlConfigAdapter::parse("[video_compress]\nmanual_frame_rate = 24").unwrap();
        let env: HashMap<&str, &str> = [
            ("VIDEO_COMPRESS_MANUAL_FRAME_RATE", "60"),
            ("VIDEO_COMPRESS_JSON_LOGS", "true"),
            ("VIDEO_COMPRESS_CACHE_DIR", "/var/cache/vc"),
        ]
        .into_iter()
        .collect();
        TomlConfigAdapter::apply_env(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.manual_frame_rate, 60);
        assert!(config.json_logs);
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/vc"));
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = AppConfig::default();
        let result = TomlConfigAdapter::apply_env(&mut config, |k| {
            (k == "VIDEO_COMPRESS_CHANNEL_DEPTH").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(DomainError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.channel_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video_compress]\npreset_frame_rate = 20\n").unwrap();
        let config = TomlConfigAdapter::load_file(&path).unwrap();
        assert_eq!(config.preset_frame_rate, 20);

        let missing = TomlConfigAdapter::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(missing, Err(DomainError::Config(_))));
    }
}
