//! Structured logging for the Atrium service.
//!
//! Builds the `tracing` subscriber both binaries install at startup: a
//! compact stderr layer for humans, plus an optional JSON file layer for
//! post-mortem analysis when a log directory is configured. RUST_LOG
//! overrides the configured level filter.

use std::path::Path;

use atrium_config::LogConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// The level filter comes from RUST_LOG when set, otherwise from
/// `config.level`. When `config.dir` names a directory, a JSON log file
/// is written there alongside the stderr output.
///
/// Call once per process; a second call panics inside tracing.
pub fn init_logging(config: &LogConfig) {
    let filter_str = if config.level.is_empty() {
        "info".to_string()
    } else {
        config.level.clone()
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let stderr_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    if let Some(log_dir) = &config.dir
        && let Ok(log_file) = open_log_file(log_dir)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

fn open_log_file(log_dir: &Path) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all(log_dir)?;
    std::fs::File::create(log_dir.join("atrium.log"))
}

/// The filter used when neither RUST_LOG nor the config say otherwise.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_info() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_per_crate_filter_parses() {
        let filter = EnvFilter::new("info,atrium_room=trace");
        let filter_str = format!("{filter}");
        assert!(filter_str.contains("atrium_room=trace"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,atrium_net=trace",
            "warn,atrium_room=debug,atrium_client=trace",
            "error",
        ];
        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "failed to parse filter: {filter_str}");
        }
    }

    #[test]
    fn test_log_file_opens_in_fresh_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("logs");
        assert!(open_log_file(&nested).is_ok());
        assert!(nested.join("atrium.log").exists());
    }
}
