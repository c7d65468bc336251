//! Remote records API: HTTP client, wire types and cached access.

mod cache;
mod cached_client;
mod client;
mod error;
mod types;

pub use cached_client::CachedApiClient;
pub use client::ApiClient;
pub use error::ApiError;
pub use types::{Country, Record, RecordPatch};
