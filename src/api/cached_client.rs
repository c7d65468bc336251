//! Cached API client that wraps ApiClient with the query cache.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;

use crate::cache::{CacheError, CacheResult, FetchOptions, PendingLoad, QueryCache, QueryState};
use crate::config::Config;

use super::cache::ApiQueryKey;
use super::client::ApiClient;
use super::types::{Country, Record, RecordPatch};

/// API client with transparent caching support.
///
/// Reads go through the cache with per-collection stale times; record edits
/// go through the cache's optimistic write protocol.
#[derive(Clone)]
pub struct CachedApiClient {
  inner: ApiClient,
  cache: QueryCache,
  records_stale: Duration,
  countries_stale: Duration,
}

impl CachedApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let inner = ApiClient::new(&config.api)?;
    let cache = QueryCache::new(config.cache.retry_policy());
    Ok(Self::with_cache(inner, cache, config))
  }

  pub fn with_cache(inner: ApiClient, cache: QueryCache, config: &Config) -> Self {
    Self {
      inner,
      cache,
      records_stale: config.cache.records_stale_time(),
      countries_stale: config.cache.countries_stale_time(),
    }
  }

  pub fn client(&self) -> &ApiClient {
    &self.inner
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// All records, served from cache while fresh
  pub async fn records(&self) -> Result<CacheResult<Arc<Vec<Record>>>, CacheError> {
    let inner = self.inner.clone();
    self
      .cache
      .fetch(
        &ApiQueryKey::Records,
        FetchOptions::stale_after(self.records_stale),
        move || {
          let inner = inner.clone();
          async move { inner.list_records().await }
        },
      )
      .await
  }

  /// Reference countries for the edit form
  pub async fn countries(&self) -> Result<CacheResult<Arc<Vec<Country>>>, CacheError> {
    let inner = self.inner.clone();
    self
      .cache
      .fetch(
        &ApiQueryKey::Countries,
        FetchOptions::stale_after(self.countries_stale),
        move || {
          let inner = inner.clone();
          async move { inner.list_countries().await }
        },
      )
      .await
  }

  /// Force a reload of the records collection
  pub fn refetch_records(&self) -> Option<PendingLoad> {
    self.cache.refetch(&ApiQueryKey::Records)
  }

  pub fn records_state(&self) -> QueryState<Record> {
    self.cache.state(&ApiQueryKey::Records)
  }

  pub fn countries_state(&self) -> QueryState<Country> {
    self.cache.state(&ApiQueryKey::Countries)
  }

  /// Apply `patch` to record `id` optimistically and PUT just the patch.
  ///
  /// Fields the form doesn't edit never leave the client, so the server's
  /// copies of them stay exactly as they were.
  pub async fn update_record(&self, id: &str, patch: RecordPatch) -> Result<Record, CacheError> {
    let inner = self.inner.clone();
    let body = patch.clone();
    let target = id.to_string();

    self
      .cache
      .mutate(&ApiQueryKey::Records, id, patch, move || async move {
        inner.update_record(&target, &body).await
      })
      .await
  }
}
