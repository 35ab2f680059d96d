//! KV Web Cache - request/response caching over a TTL key-value store
//!
//! Bodies are compressed, split into chunks under the store's value limit and
//! written before the metadata that references them, so readers never observe a
//! partially written entry.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod kv;
pub mod loader;
pub mod models;
pub mod tasks;

pub use cache::{CacheHandle, CacheStorage};
pub use config::Config;
pub use error::{CacheError, Result};
pub use kv::{KvStore, MemoryKv};
pub use loader::{CacheAvailability, CacheMode, LoaderCache, LoaderStatus};
pub use models::{CacheQueryOptions, CacheRequest, CachedResponse};
pub use tasks::spawn_expiry_sweeper;
