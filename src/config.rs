use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::RetryPolicy;

/// Environment variable that overrides `api.base_url`
pub const API_URL_ENV: &str = "TAXDESK_API_URL";

/// Rows-per-page choices offered by the table
pub const PAGE_SIZES: &[usize] = &[5, 10, 20, 30, 50];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Header title
  pub title: Option<String>,
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub table: TableConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub records_path: String,
  pub countries_path: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: String::new(),
      records_path: "/taxes".to_string(),
      countries_path: "/countries".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Extra attempts after a failed load
  pub retry_attempts: u32,
  pub retry_base_delay_ms: u64,
  pub retry_max_delay_ms: u64,
  /// Records are refetched on every request by default
  pub records_stale_secs: u64,
  /// Countries change rarely
  pub countries_stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      retry_attempts: 2,
      retry_base_delay_ms: 1000,
      retry_max_delay_ms: 30_000,
      records_stale_secs: 0,
      countries_stale_secs: 30 * 60,
    }
  }
}

impl CacheConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      attempts: self.retry_attempts,
      base_delay: Duration::from_millis(self.retry_base_delay_ms),
      max_delay: Duration::from_millis(self.retry_max_delay_ms),
    }
  }

  pub fn records_stale_time(&self) -> Duration {
    Duration::from_secs(self.records_stale_secs)
  }

  pub fn countries_stale_time(&self) -> Duration {
    Duration::from_secs(self.countries_stale_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
  pub page_size: usize,
}

impl Default for TableConfig {
  fn default() -> Self {
    Self {
      page_size: PAGE_SIZES[0],
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Directory for log files, `~` expands to home (default: $XDG_DATA_HOME/taxdesk)
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./taxdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/taxdesk/config.yaml
  ///
  /// Falls back to defaults when no file exists. `TAXDESK_API_URL` overrides
  /// the base URL from the file.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      if !url.trim().is_empty() {
        config.api.base_url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("taxdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("taxdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Check the settings that have no usable default
  pub fn validate(&self) -> Result<()> {
    if self.api.base_url.trim().is_empty() {
      return Err(eyre!(
        "No API base URL configured. Set api.base_url in taxdesk.yaml, \
         export {} or pass --api-url.",
        API_URL_ENV
      ));
    }
    if self.table.page_size == 0 {
      return Err(eyre!("table.page_size must be greater than zero"));
    }
    Ok(())
  }

  /// Header title
  pub fn title(&self) -> &str {
    self.title.as_deref().unwrap_or("Tax Management")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.records_path, "/taxes");
    assert_eq!(config.api.countries_path, "/countries");
    assert_eq!(config.cache.retry_attempts, 2);
    assert_eq!(config.cache.countries_stale_time(), Duration::from_secs(1800));
    assert_eq!(config.table.page_size, 5);
    assert_eq!(config.title(), "Tax Management");
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      "title: Customers\napi:\n  base_url: https://example.test\ncache:\n  retry_attempts: 0\n",
    )
    .unwrap();
    assert_eq!(config.title(), "Customers");
    assert_eq!(config.api.base_url, "https://example.test");
    assert_eq!(config.api.records_path, "/taxes");
    assert_eq!(config.cache.retry_attempts, 0);
    assert_eq!(config.cache.retry_base_delay_ms, 1000);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_missing_base_url_is_rejected() {
    let config = Config::default();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    let config = Config::parse("api:\n  base_url: https://x.test\ntable:\n  page_size: 0\n").unwrap();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_retry_policy_from_config() {
    let policy = CacheConfig::default().retry_policy();
    assert_eq!(policy.attempts, 2);
    assert_eq!(policy.base_delay, Duration::from_secs(1));
    assert_eq!(policy.max_delay, Duration::from_secs(30));
  }

  #[test]
  fn test_explicit_missing_path_errors() {
    let result = Config::load(Some(Path::new("/nonexistent/taxdesk.yaml")));
    assert!(result.is_err());
  }
}
