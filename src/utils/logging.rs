//! Logging initialization

use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive
pub const LOG_ENV: &str = "VIDEO_COMPRESS_LOG";

/// Pick the filter directive: CLI level, then `VIDEO_COMPRESS_LOG`, then
/// `RUST_LOG`, then the configured level.
pub fn resolve_filter<F>(cli_level: Option<&str>, config_level: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = cli_level {
        return level.to_string();
    }
    let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    set(LOG_ENV)
        .or_else(|| set("RUST_LOG"))
        .unwrap_or_else(|| config_level.to_string())
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// result payloads. Calling twice is harmless.
pub fn init(directive: &str, json: bool) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
