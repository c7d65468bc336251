//! Load status and snapshots handed to the UI.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::ApiError;

/// The state of a cached collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryStatus {
  /// Nothing has been requested yet
  #[default]
  Idle,
  /// A load is in flight
  Loading,
  /// The last load succeeded
  Success,
  /// The last load failed after all retries
  Error(ApiError),
}

impl QueryStatus {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryStatus::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryStatus::Error(_))
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryStatus::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Point-in-time view of a cache entry for rendering.
///
/// `data` is the last published snapshot; it stays populated while a reload
/// is loading or after a reload failed.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
  pub status: QueryStatus,
  pub data: Option<Arc<Vec<T>>>,
  pub fetched_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
  fn default() -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      fetched_at: None,
    }
  }
}

impl<T> QueryState<T> {
  /// Items of the snapshot, empty when nothing has loaded
  pub fn items(&self) -> &[T] {
    self.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn is_loading(&self) -> bool {
    self.status.is_loading()
  }

  /// Loading with nothing to show yet
  pub fn is_initial_loading(&self) -> bool {
    self.status.is_loading() && self.data.is_none()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.status.error()
  }
}

/// Result from a cache fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
    }
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Loaded from the network by this call or one it joined
  Network,
  /// Served from a snapshot still within its stale time
  CacheFresh,
}

/// Per-call fetch options
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
  /// How long a snapshot is served without reloading
  pub stale_time: Duration,
}

impl FetchOptions {
  pub fn stale_after(stale_time: Duration) -> Self {
    Self { stale_time }
  }
}

/// Retry policy for failed loads.
///
/// Writes are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  /// Extra attempts after the first failure
  pub attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts: 2,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  /// No retries at all
  pub fn none() -> Self {
    Self {
      attempts: 0,
      ..Self::default()
    }
  }

  /// Backoff before retry number `retry` (0-based): base * 2^retry, capped
  pub fn delay_for(&self, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry);
    self.base_delay.saturating_mul(factor).min(self.max_delay)
  }
}
