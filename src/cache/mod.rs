//! Generic in-memory query cache for server collections.
//!
//! This module is API-agnostic. It provides:
//! - Stale-time caching of whole collections under a logical key
//! - Deduplication of concurrent loads and retry with backoff
//! - Optimistic writes with per-item rollback and reconciliation
//! - Change notifications for the UI

mod state;
mod store;
mod traits;

pub use state::{CacheResult, CacheSource, FetchOptions, QueryState, RetryPolicy};
pub use store::{CacheError, CacheEvent, PendingLoad, QueryCache};
pub use traits::{merge_patch, Cacheable, Patch, QueryKey};
