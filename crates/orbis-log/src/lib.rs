//! Structured logging for the orbital server.
//!
//! Console output with uptime timestamps and module paths, plus an optional
//! JSON log file for post-mortem analysis. The level comes from `RUST_LOG`,
//! then the config's `debug.log_level`.

use std::path::{Path, PathBuf};

use orbis_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the JSON log file inside the log directory.
pub const LOG_FILE_NAME: &str = "orbis.log";

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file
/// * `debug_build` - debug builds always log to file when `log_dir` is given
/// * `config` - supplies the level and the `log_to_file` switch
///
/// ```no_run
/// use orbis_log::init_logging;
///
/// init_logging(Some(std::path::Path::new("./logs")), cfg!(debug_assertions), None);
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(log_path) = log_file_path(log_dir, debug_build, config)
        && let Some(parent) = log_path.parent()
        && std::fs::create_dir_all(parent).is_ok()
        && let Ok(log_file) = std::fs::File::create(&log_path)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        tracing::debug!(path = %log_path.display(), "File logging enabled");
        return;
    }

    subscriber.init();
}

/// Filter directives taken from the config, or [`DEFAULT_FILTER`].
pub fn filter_directives(config: Option<&Config>) -> String {
    config
        .map(|config| config.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Where the JSON log goes, if file logging applies.
pub fn log_file_path(
    log_dir: Option<&Path>,
    debug_build: bool,
    config: Option<&Config>,
) -> Option<PathBuf> {
    let wanted = debug_build || config.is_some_and(|config| config.debug.log_to_file);
    match log_dir {
        Some(dir) if wanted => Some(dir.join(LOG_FILE_NAME)),
        _ => None,
    }
}
