//! Tracing setup for applications embedding the chat client
//!
//! The filter comes from `RUST_LOG`, falling back to `shadow_chat_sdk=info`.

use std::path::Path;

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "shadow_chat_sdk=info";

/// File name prefix for rolling log files
pub const LOG_FILE_PREFIX: &str = "chat-client.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a stderr fmt subscriber
pub fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Install a subscriber that writes JSON lines to a daily-rolling file in `dir`
///
/// Keep the returned guard alive for as long as logs should be flushed.
pub fn init_file_logging(dir: impl AsRef<Path>) -> Result<WorkerGuard> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow!("Failed to create log directory {}: {}", dir.display(), e))?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}
