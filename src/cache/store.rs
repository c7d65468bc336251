//! Keyed collection store with load deduplication and optimistic writes.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

use super::state::{CacheResult, FetchOptions, QueryState, QueryStatus, RetryPolicy};
use super::traits::{merge_patch, replace_item, Cacheable, Patch, QueryKey};
use crate::api::ApiError;

/// Type-erased `Arc<Vec<T>>`
type Snapshot = Arc<dyn Any + Send + Sync>;
type LoadResult = Result<Snapshot, ApiError>;
type Loader = Arc<dyn Fn() -> BoxFuture<'static, LoadResult> + Send + Sync>;
type PatchFn = Arc<dyn Fn(&Snapshot) -> Option<Snapshot> + Send + Sync>;

/// Handle to an in-flight load. Resolves once the load has settled.
pub type PendingLoad = Shared<BoxFuture<'static, LoadResult>>;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("cache entry '{0}' holds a different type")]
  TypeMismatch(String),
}

impl CacheError {
  pub fn api(&self) -> Option<&ApiError> {
    match self {
      CacheError::Api(e) => Some(e),
      CacheError::TypeMismatch(_) => None,
    }
  }
}

/// Change notifications for subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// Status or data of an entry changed
  Updated { key: String },
  /// Everything was discarded
  Cleared,
}

struct PendingPatch {
  seq: u64,
  apply: PatchFn,
}

#[derive(Default)]
struct Entry {
  data: Option<Snapshot>,
  status: QueryStatus,
  fetched_at: Option<Instant>,
  /// Set by `invalidate`, cleared when a load lands
  invalidated: bool,
  loader: Option<Loader>,
  inflight: Option<PendingLoad>,
  /// Bumped whenever a load starts or is superseded; only the load holding
  /// the current generation may publish
  generation: u64,
  pending: Vec<PendingPatch>,
}

impl Entry {
  fn fresh_data(&self, options: &FetchOptions) -> Option<Snapshot> {
    if self.invalidated {
      return None;
    }
    let fetched_at = self.fetched_at?;
    if fetched_at.elapsed() > options.stale_time {
      return None;
    }
    self.data.clone()
  }

  /// Re-apply pending optimistic patches on top of freshly loaded data
  fn layer_pending(&self, data: Snapshot) -> Snapshot {
    self
      .pending
      .iter()
      .fold(data, |acc, patch| (patch.apply)(&acc).unwrap_or(acc))
  }
}

#[derive(Default)]
struct Inner {
  entries: HashMap<String, Entry>,
  /// Completion signal of the most recently queued write per (key, id)
  write_tails: HashMap<(String, String), oneshot::Receiver<()>>,
  /// Bumped by `clear`; anything started in an older epoch is ignored
  epoch: u64,
  next_seq: u64,
}

/// Bookkeeping for one optimistic write between apply and settle
struct Optimistic<T> {
  seq: u64,
  epoch: u64,
  rollback: Option<T>,
}

/// What settling a mutation did to the visible collection
struct Settled {
  restored: bool,
  needs_reload: bool,
}

/// Process-wide store of server collections.
///
/// Cloning is cheap and every clone shares the same entries, so one
/// instance is created at startup and handed to whoever needs it.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Mutex<Inner>>,
  events: broadcast::Sender<CacheEvent>,
  retry: RetryPolicy,
}

impl QueryCache {
  pub fn new(retry: RetryPolicy) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(Mutex::new(Inner::default())),
      events,
      retry,
    }
  }

  /// Receive a `CacheEvent` for every visible change
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.events.subscribe()
  }

  fn notify(&self, key: &str) {
    let _ = self.events.send(CacheEvent::Updated {
      key: key.to_string(),
    });
  }

  /// Fetch a collection with stale-time caching.
  ///
  /// 1. A snapshot younger than `options.stale_time` is returned as is
  /// 2. Otherwise the caller joins the in-flight load, or starts one
  /// 3. Failed loads are retried per the retry policy; the previous snapshot
  ///    stays visible until a load succeeds
  ///
  /// The loader is remembered so `refetch` and `invalidate` can reload the
  /// key later.
  pub async fn fetch<T, K, F, Fut>(
    &self,
    key: &K,
    options: FetchOptions,
    loader: F,
  ) -> Result<CacheResult<Arc<Vec<T>>>, CacheError>
  where
    T: Cacheable,
    K: QueryKey + ?Sized,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
  {
    let key = key.cache_hash();
    let loader: Loader = Arc::new(move || {
      loader()
        .map(|result| result.map(|items| Arc::new(items) as Snapshot))
        .boxed()
    });

    let (load, started) = {
      let mut inner = lock(&self.inner);
      let epoch = inner.epoch;
      let entry = inner.entries.entry(key.clone()).or_default();
      entry.loader = Some(Arc::clone(&loader));

      if let Some(data) = entry.fresh_data(&options) {
        debug!(key = %key, entity = T::entity_type(), "serving fresh snapshot");
        return Ok(CacheResult::from_cache(downcast(&key, data)?));
      }

      match &entry.inflight {
        Some(load) => {
          debug!(key = %key, "joining in-flight load");
          (load.clone(), false)
        }
        None => (self.start_load(&key, entry, loader, epoch), true),
      }
    };

    if started {
      self.notify(&key);
    }

    let data = load.await?;
    Ok(CacheResult::from_network(downcast(&key, data)?))
  }

  /// Reload `key` with its registered loader, superseding any in-flight load.
  ///
  /// Returns `None` if the key was never fetched.
  pub fn refetch<K: QueryKey + ?Sized>(&self, key: &K) -> Option<PendingLoad> {
    let key = key.cache_hash();
    let load = {
      let mut inner = lock(&self.inner);
      let epoch = inner.epoch;
      let entry = inner.entries.get_mut(&key)?;
      let loader = entry.loader.clone()?;
      self.start_load(&key, entry, loader, epoch)
    };
    self.notify(&key);
    Some(load)
  }

  /// Mark `key` stale and reload it in the background.
  pub fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) -> Option<PendingLoad> {
    {
      let mut inner = lock(&self.inner);
      if let Some(entry) = inner.entries.get_mut(&key.cache_hash()) {
        entry.invalidated = true;
      }
    }
    self.refetch(key)
  }

  /// The load currently in flight for `key`, if any
  pub fn in_flight<K: QueryKey + ?Sized>(&self, key: &K) -> Option<PendingLoad> {
    let inner = lock(&self.inner);
    inner
      .entries
      .get(&key.cache_hash())
      .and_then(|entry| entry.inflight.clone())
  }

  /// Current status and snapshot of `key`
  pub fn state<T: Cacheable, K: QueryKey + ?Sized>(&self, key: &K) -> QueryState<T> {
    let inner = lock(&self.inner);
    match inner.entries.get(&key.cache_hash()) {
      Some(entry) => QueryState {
        status: entry.status.clone(),
        data: entry
          .data
          .clone()
          .and_then(|data| data.downcast::<Vec<T>>().ok()),
        fetched_at: entry.fetched_at,
      },
      None => QueryState::default(),
    }
  }

  /// Last published snapshot of `key`, stale or not
  pub fn snapshot<T: Cacheable, K: QueryKey + ?Sized>(&self, key: &K) -> Option<Arc<Vec<T>>> {
    self.state::<T, K>(key).data
  }

  /// Apply `patch` to the item `id` of `key` optimistically and run `write`.
  ///
  /// The patched collection is published before the write starts. On
  /// success the key is reloaded to reconcile with the server; on failure
  /// the item is restored to its pre-write value and the error returned.
  /// Writes to the same (key, id) run one at a time in the order this
  /// method was called; writes are never retried. Dropping the future
  /// mid-write rolls the item back and reloads the key.
  pub fn mutate<T, K, P, W, Fut>(
    &self,
    key: &K,
    id: &str,
    patch: P,
    write: W,
  ) -> impl Future<Output = Result<T, CacheError>> + Send + 'static
  where
    T: Cacheable,
    K: QueryKey + ?Sized + 'static,
    P: Patch<T>,
    W: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let cache = self.clone();
    let key = key.cache_hash();
    let id = id.to_string();
    // Taken now so queue order is call order, not poll order
    let mut ticket = self.enqueue_write(&key, &id);

    async move {
      ticket.wait_turn().await;

      let optimistic = cache.apply_optimistic::<T, P>(&key, &id, patch)?;
      let guard = WriteGuard {
        cache: cache.clone(),
        key: key.clone(),
        id: id.clone(),
        optimistic: Some(optimistic),
      };
      cache.notify(&key);

      info!(key = %key, id = %id, "write issued");
      let result = write().await;
      let settled = guard.settle(result.is_ok());

      match result {
        Ok(saved) => {
          info!(key = %key, id = %id, "write confirmed, reconciling");
          cache.invalidate(key.as_str());
          Ok(saved)
        }
        Err(err) => {
          warn!(key = %key, id = %id, error = %err, restored = settled.restored, "write failed, rolled back");
          if settled.restored {
            cache.notify(&key);
          }
          if settled.needs_reload {
            cache.refetch(key.as_str());
          }
          Err(err.into())
        }
      }
    }
  }

  /// Discard every snapshot, loader and pending write.
  ///
  /// Loads and writes started before the clear can no longer publish.
  pub fn clear(&self) {
    {
      let mut inner = lock(&self.inner);
      inner.entries.clear();
      inner.write_tails.clear();
      inner.epoch += 1;
    }
    info!("cache cleared");
    let _ = self.events.send(CacheEvent::Cleared);
  }

  fn start_load(&self, key: &str, entry: &mut Entry, loader: Loader, epoch: u64) -> PendingLoad {
    entry.generation += 1;
    entry.status = QueryStatus::Loading;

    let generation = entry.generation;
    let inner = Arc::clone(&self.inner);
    let events = self.events.clone();
    let retry = self.retry.clone();
    let key = key.to_string();
    info!(key = %key, generation, "load started");

    let load = async move {
      let result = load_with_retry(&key, &loader, &retry).await;
      let (result, published) = settle_load(&inner, &key, epoch, generation, result);
      if published {
        let _ = events.send(CacheEvent::Updated { key });
      }
      result
    }
    .boxed()
    .shared();

    entry.inflight = Some(load.clone());
    // Run to completion even if every caller stops waiting
    tokio::spawn(load.clone());
    load
  }

  fn enqueue_write(&self, key: &str, id: &str) -> WriteTicket {
    let (done, tail) = oneshot::channel();
    let previous = lock(&self.inner)
      .write_tails
      .insert((key.to_string(), id.to_string()), tail);
    WriteTicket {
      previous,
      _done: Some(done),
    }
  }

  fn apply_optimistic<T: Cacheable, P: Patch<T>>(
    &self,
    key: &str,
    id: &str,
    patch: P,
  ) -> Result<Optimistic<T>, CacheError> {
    let mut inner = lock(&self.inner);
    let seq = inner.next_seq;
    inner.next_seq += 1;
    let epoch = inner.epoch;
    let entry = inner.entries.entry(key.to_string()).or_default();

    // A load that started before this write must not land on top of it
    if entry.inflight.take().is_some() {
      entry.generation += 1;
      entry.status = if entry.data.is_some() {
        QueryStatus::Success
      } else {
        QueryStatus::Idle
      };
      debug!(key = %key, "superseded in-flight load for optimistic write");
    }

    let rollback = match &entry.data {
      Some(data) => downcast::<T>(key, Arc::clone(data))?
        .iter()
        .find(|item| item.cache_key() == id)
        .cloned(),
      None => None,
    };

    let target = id.to_string();
    let apply: PatchFn = Arc::new(move |snapshot: &Snapshot| {
      let items = Arc::clone(snapshot).downcast::<Vec<T>>().ok()?;
      Some(Arc::new(merge_patch(&items, &target, &patch)) as Snapshot)
    });

    if let Some(data) = &entry.data {
      if let Some(patched) = apply(data) {
        entry.data = Some(patched);
      }
    }
    entry.pending.push(PendingPatch { seq, apply });

    Ok(Optimistic {
      seq,
      epoch,
      rollback,
    })
  }

  fn settle_mutation<T: Cacheable>(
    &self,
    key: &str,
    optimistic: Optimistic<T>,
    succeeded: bool,
  ) -> Settled {
    let mut inner = lock(&self.inner);
    let unchanged = Settled {
      restored: false,
      needs_reload: false,
    };
    if inner.epoch != optimistic.epoch {
      return unchanged;
    }
    let Some(entry) = inner.entries.get_mut(key) else {
      return unchanged;
    };

    entry.pending.retain(|patch| patch.seq != optimistic.seq);
    if succeeded {
      return unchanged;
    }

    let Some(data) = entry.data.clone() else {
      return unchanged;
    };
    match (optimistic.rollback, data.downcast::<Vec<T>>()) {
      (Some(previous), Ok(items)) => {
        entry.data = Some(Arc::new(replace_item(&items, &previous)));
        Settled {
          restored: true,
          // a reconciling load this write superseded still has to run
          needs_reload: entry.invalidated,
        }
      }
      // No pre-write value to restore (collection loaded mid-write)
      _ => Settled {
        restored: false,
        needs_reload: true,
      },
    }
  }
}

/// Owns an applied optimistic patch until its write settles.
///
/// Dropped unsettled (the mutation future was dropped or the write
/// panicked): the patch is removed, the item restored and the key reloaded,
/// since the write may or may not have reached the server.
struct WriteGuard<T: Cacheable> {
  cache: QueryCache,
  key: String,
  id: String,
  optimistic: Option<Optimistic<T>>,
}

impl<T: Cacheable> WriteGuard<T> {
  fn settle(mut self, succeeded: bool) -> Settled {
    match self.optimistic.take() {
      Some(optimistic) => self.cache.settle_mutation(&self.key, optimistic, succeeded),
      None => Settled {
        restored: false,
        needs_reload: false,
      },
    }
  }
}

impl<T: Cacheable> Drop for WriteGuard<T> {
  fn drop(&mut self) {
    let Some(optimistic) = self.optimistic.take() else {
      return;
    };
    warn!(key = %self.key, id = %self.id, "write abandoned, rolled back");
    let settled = self.cache.settle_mutation(&self.key, optimistic, false);
    if settled.restored {
      self.cache.notify(&self.key);
    }
    // reloads are spawned, so only from inside a runtime
    if tokio::runtime::Handle::try_current().is_ok() {
      self.cache.refetch(self.key.as_str());
    }
  }
}

/// Position in the per-(key, id) write queue.
///
/// The writer ahead of us signals completion by dropping its sender.
struct WriteTicket {
  previous: Option<oneshot::Receiver<()>>,
  _done: Option<oneshot::Sender<()>>,
}

impl WriteTicket {
  async fn wait_turn(&mut self) {
    if let Some(previous) = self.previous.as_mut() {
      // Err just means the previous writer is gone, which is the signal
      let _ = previous.await;
      self.previous = None;
    }
  }
}

impl Drop for WriteTicket {
  fn drop(&mut self) {
    // Dropped while still queued: hand the turn on only once the writer
    // ahead of us has finished.
    if let (Some(previous), Some(done)) = (self.previous.take(), self._done.take()) {
      if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
          let _ = previous.await;
          drop(done);
        });
      }
    }
  }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
  inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn downcast<T: Cacheable>(key: &str, snapshot: Snapshot) -> Result<Arc<Vec<T>>, CacheError> {
  snapshot
    .downcast::<Vec<T>>()
    .map_err(|_| CacheError::TypeMismatch(key.to_string()))
}

async fn load_with_retry(key: &str, loader: &Loader, retry: &RetryPolicy) -> LoadResult {
  let mut retries = 0;
  loop {
    match loader().await {
      Ok(data) => return Ok(data),
      Err(err) if retries < retry.attempts => {
        let delay = retry.delay_for(retries);
        warn!(key, attempt = retries + 1, error = %err, delay_ms = delay.as_millis() as u64, "load failed, retrying");
        tokio::time::sleep(delay).await;
        retries += 1;
      }
      Err(err) => return Err(err),
    }
  }
}

/// Publish a finished load if it is still current.
///
/// Returns the result to hand to waiters and whether anything changed.
fn settle_load(
  inner: &Mutex<Inner>,
  key: &str,
  epoch: u64,
  generation: u64,
  result: LoadResult,
) -> (LoadResult, bool) {
  let mut inner = lock(inner);
  if inner.epoch != epoch {
    debug!(key, "discarding load from before clear");
    return (result, false);
  }
  let Some(entry) = inner.entries.get_mut(key) else {
    return (result, false);
  };
  if entry.generation != generation {
    debug!(key, generation, "discarding superseded load");
    return (result, false);
  }

  entry.inflight = None;
  match result {
    Ok(data) => {
      let published = entry.layer_pending(data);
      entry.data = Some(Arc::clone(&published));
      entry.status = QueryStatus::Success;
      entry.fetched_at = Some(Instant::now());
      entry.invalidated = false;
      info!(key, "load succeeded");
      (Ok(published), true)
    }
    Err(err) => {
      error!(key, error = %err, "load failed, keeping last snapshot");
      entry.status = QueryStatus::Error(err.clone());
      (Err(err), true)
    }
  }
}
