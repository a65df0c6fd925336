//! Tracing subscriber setup.
//!
//! Filter comes from `XYLO_LOG` (same syntax as `RUST_LOG`), default `warn`.
//! Output goes to a daily-rolled file under the logs directory, or to stderr
//! when verbose.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "XYLO_LOG";
const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "xylo_core=debug,xylo_cli=debug,info";
const LOG_FILE_PREFIX: &str = "xylo.log";

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        })
    })
}

/// Installs the global subscriber.
///
/// Returns the appender guard when logging to a file; keep it alive until
/// exit so buffered lines are flushed.
pub fn init(verbose: bool, log_dir: &Path) -> Result<Option<WorkerGuard>> {
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(true))
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;
        return Ok(None);
    }

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(false))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;
    Ok(Some(guard))
}
