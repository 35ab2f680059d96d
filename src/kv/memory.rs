//! Memory Substrate Module
//!
//! In-process [`KvStore`] combining an ordered map with versionstamps and TTL expiration.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::trace;

use crate::kv::{
    current_timestamp_ms, Consistency, KvEntry, KvError, KvKey, KvStats, KvStore, StoredValue,
    MAX_VALUE_SIZE,
};

#[derive(Debug, Default)]
struct Inner {
    /// Key-value storage, ordered so prefixes are contiguous
    entries: BTreeMap<KvKey, StoredValue>,
    /// Operation statistics
    stats: KvStats,
    /// Last versionstamp handed out
    versionstamp: u64,
}

impl Inner {
    fn next_versionstamp(&mut self) -> u64 {
        self.versionstamp += 1;
        self.versionstamp
    }

    /// Looks up a live entry, dropping it if its TTL has elapsed.
    fn read(&mut self, key: &KvKey, now: u64) -> Option<KvEntry> {
        let expired = match self.entries.get(key) {
            Some(stored) if stored.is_expired_at(now) => true,
            Some(stored) => {
                return Some(KvEntry {
                    key: key.clone(),
                    value: stored.value.clone(),
                    versionstamp: stored.versionstamp,
                    expires_at: stored.expires_at,
                })
            }
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_expired(1);
            self.stats.set_total_entries(self.entries.len());
        }
        None
    }

    fn write(&mut self, key: &KvKey, value: Bytes, ttl: Option<Duration>) -> u64 {
        let versionstamp = self.next_versionstamp();
        self.entries
            .insert(key.clone(), StoredValue::new(value, versionstamp, ttl));
        self.stats.record_write();
        self.stats.set_total_entries(self.entries.len());
        versionstamp
    }
}

// == Memory KV ==
/// In-memory key-value substrate with per-key TTL and check-and-set.
///
/// Reads honour TTL lazily; [`MemoryKv::purge_expired`] reclaims memory for
/// entries nobody reads again. Both consistency levels are served strongly.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: RwLock<Inner>,
}

impl MemoryKv {
    // == Constructor ==
    /// Creates an empty substrate.
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_value(value: &Bytes) -> Result<(), KvError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        Ok(())
    }

    // == Stats ==
    /// Returns current operation statistics.
    pub async fn stats(&self) -> KvStats {
        let inner = self.inner.read().await;
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Purge Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let now = current_timestamp_ms();

        let before = inner.entries.len();
        inner.entries.retain(|_, stored| !stored.is_expired_at(now));
        let count = before - inner.entries.len();

        inner.stats.record_expired(count);
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        count
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    // == Is Empty ==
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &KvKey, _consistency: Consistency) -> Result<Option<KvEntry>, KvError> {
        key.validate()?;
        let mut inner = self.inner.write().await;
        inner.stats.record_reads(1);
        Ok(inner.read(key, current_timestamp_ms()))
    }

    async fn get_many(
        &self,
        keys: &[KvKey],
        _consistency: Consistency,
    ) -> Result<Vec<Option<KvEntry>>, KvError> {
        for key in keys {
            key.validate()?;
        }
        let mut inner = self.inner.write().await;
        let now = current_timestamp_ms();
        inner.stats.record_reads(keys.len());
        Ok(keys.iter().map(|key| inner.read(key, now)).collect())
    }

    async fn set(&self, key: &KvKey, value: Bytes, ttl: Option<Duration>) -> Result<u64, KvError> {
        key.validate()?;
        Self::validate_value(&value)?;

        let mut inner = self.inner.write().await;
        let versionstamp = inner.write(key, value, ttl);
        trace!("set {} (versionstamp {})", key, versionstamp);
        Ok(versionstamp)
    }

    async fn delete(&self, key: &KvKey) -> Result<(), KvError> {
        key.validate()?;
        let mut inner = self.inner.write().await;
        inner.entries.remove(key);
        inner.stats.record_delete();
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        Ok(())
    }

    async fn list(&self, prefix: &KvKey) -> Result<Vec<KvEntry>, KvError> {
        let mut inner = self.inner.write().await;
        let now = current_timestamp_ms();

        let entries: Vec<KvEntry> = inner
            .entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, stored)| !stored.is_expired_at(now))
            .map(|(key, stored)| KvEntry {
                key: key.clone(),
                value: stored.value.clone(),
                versionstamp: stored.versionstamp,
                expires_at: stored.expires_at,
            })
            .collect();

        inner.stats.record_reads(entries.len());
        Ok(entries)
    }

    async fn check_and_set(
        &self,
        key: &KvKey,
        expected: Option<u64>,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<bool, KvError> {
        key.validate()?;
        Self::validate_value(&value)?;

        let mut inner = self.inner.write().await;
        let current = inner
            .read(key, current_timestamp_ms())
            .map(|entry| entry.versionstamp);

        if current != expected {
            inner.stats.record_cas_conflict();
            trace!(
                "check_and_set conflict on {}: expected {:?}, found {:?}",
                key,
                expected,
                current
            );
            return Ok(false);
        }

        inner.write(key, value, ttl);
        Ok(true)
    }
}
