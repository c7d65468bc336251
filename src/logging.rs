//! File logging. The terminal belongs to the UI, so everything goes to a
//! daily-rolled file under the data directory.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

/// Filter directives, e.g. `TAXDESK_LOG=taxdesk=debug`
pub const LOG_ENV: &str = "TAXDESK_LOG";

const DEFAULT_FILTER: &str = "taxdesk=info";
const LOG_FILE: &str = "taxdesk.log";

/// Where log files are written
pub fn log_dir(config: &LogConfig) -> PathBuf {
  config
    .directory
    .as_deref()
    .map(expand_home)
    .or_else(|| dirs::data_dir().map(|d| d.join("taxdesk")))
    .unwrap_or_else(|| PathBuf::from("."))
}

/// Replace a leading `~` with the home directory
fn expand_home(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), dirs::home_dir()) {
    (Ok(rest), Some(home)) => home.join(rest),
    _ => path.to_path_buf(),
  }
}

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
  let dir = log_dir(config);
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}
