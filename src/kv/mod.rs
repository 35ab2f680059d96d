//! Key-Value Substrate Module
//!
//! The storage contract the cache is built on: tuple keys, per-key TTL, batched
//! reads, prefix listing and single-key check-and-set. [`MemoryKv`] is the
//! in-process implementation.

mod entry;
mod key;
mod memory;
mod stats;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use entry::{current_timestamp_ms, StoredValue};
pub use key::{KeyPart, KvKey};
pub use memory::MemoryKv;
pub use stats::KvStats;

// == Public Constants ==
/// Maximum encoded key size in bytes
pub const MAX_KEY_SIZE: usize = 2048;

/// Maximum value size in bytes
pub const MAX_VALUE_SIZE: usize = 64 * 1024; // 64 KiB

// == KV Error ==
/// Errors raised by a [`KvStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// Key is empty or too large
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value exceeds the substrate's per-value limit
    #[error("Value of {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    /// Backend could not serve the call
    #[error("Substrate unavailable: {0}")]
    Unavailable(String),
}

// == Consistency ==
/// Read consistency requested from the substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Linearizable read
    #[default]
    Strong,
    /// May observe a slightly stale value; cheaper
    Eventual,
}

// == KV Entry ==
/// A live entry returned by a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: KvKey,
    pub value: Bytes,
    /// Changes on every write to the key; compared by check-and-set
    pub versionstamp: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

// == KV Store ==
/// Key-value substrate used by the cache.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Reads a single key. Expired and missing keys read as `None`.
    async fn get(&self, key: &KvKey, consistency: Consistency) -> Result<Option<KvEntry>, KvError>;

    /// Reads several keys in one round trip, preserving input order.
    async fn get_many(
        &self,
        keys: &[KvKey],
        consistency: Consistency,
    ) -> Result<Vec<Option<KvEntry>>, KvError>;

    /// Writes a value, replacing any previous one. Returns the new versionstamp.
    async fn set(&self, key: &KvKey, value: Bytes, ttl: Option<Duration>) -> Result<u64, KvError>;

    /// Removes a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &KvKey) -> Result<(), KvError>;

    /// Lists every live entry whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &KvKey) -> Result<Vec<KvEntry>, KvError>;

    /// Atomically writes `value` only if the key's current versionstamp equals
    /// `expected` (`None` = key must be absent). Returns false on conflict.
    async fn check_and_set(
        &self,
        key: &KvKey,
        expected: Option<u64>,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError>;
}
