//! Shared logging utilities for Kiln binaries.

use anyhow::{anyhow, Context, Result};
use kiln_protocol::defaults::HOME_ENV_VAR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "kiln=info,kiln_credentials=info,kiln_pipeline_config=info,kiln_security=info,kiln_store=info";

/// Logging configuration shared by Kiln binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Directory for the daily log file. `None` logs to stderr only.
    pub log_dir: Option<&'a Path>,
}

/// Keeps the background file writer alive. Drop it last in `main`.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize tracing with a daily rolling file and stderr output.
///
/// `RUST_LOG` overrides the default filter. Without `verbose` the console
/// only shows warnings.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        env_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    let mut file_guard = None;
    let file_layer = match config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", sanitize_name(config.app_name)));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(LogGuard { _file: file_guard })
}

/// Kiln home directory: `$KILN_HOME`, else `~/.kiln`.
pub fn kiln_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(HOME_ENV_VAR) {
        if !override_path.trim().is_empty() {
            return Ok(PathBuf::from(override_path));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".kiln"))
        .ok_or_else(|| anyhow!("Could not determine home directory; set {}", HOME_ENV_VAR))
}

/// Logs directory under `home`.
pub fn logs_dir(home: &Path) -> PathBuf {
    home.join("logs")
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
