//! Chunk Store Module
//!
//! Body generations split into bounded chunks, keyed by `(version_tag, index)`.
//! A generation is written completely before any metadata points at it, read
//! back lazily in bounded batches, and reclaimed by lowering chunk TTLs.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use tracing::{debug, trace};

use crate::cache::{BodyDescriptor, KeyLayout};
use crate::codec::Codec;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::kv::{current_timestamp_ms, Consistency, KvKey, KvStore};
use crate::models::BodyStream;

/// Number of chunks a payload of `len` bytes splits into.
pub fn chunk_count(len: usize, max_chunk_size: usize) -> u32 {
    len.div_ceil(max_chunk_size) as u32
}

// == Chunk Store ==
#[derive(Clone)]
pub struct ChunkStore {
    kv: Arc<dyn KvStore>,
    layout: KeyLayout,
    max_chunk_size: usize,
    batch_size: usize,
    /// TTL of freshly written chunks
    chunk_ttl: Duration,
    /// TTL of reclaimed chunks
    short_ttl: Duration,
}

impl ChunkStore {
    pub fn new(kv: Arc<dyn KvStore>, layout: KeyLayout, config: &Config) -> Self {
        Self {
            kv,
            layout,
            max_chunk_size: config.max_chunk_size,
            batch_size: config.match_batch_size,
            chunk_ttl: config.chunk_ttl(),
            short_ttl: config.short_ttl,
        }
    }

    /// Number of chunks this store splits a payload of `len` bytes into.
    pub fn chunks_for(&self, len: usize) -> u32 {
        chunk_count(len, self.max_chunk_size)
    }

    // == Write ==
    /// Writes every chunk of `payload` under `version_tag`, in order.
    ///
    /// Returns the number of chunks written. Stops at the first failed write;
    /// chunks written before it stay behind for the caller to reclaim.
    pub async fn write_generation(&self, version_tag: &str, payload: &Bytes) -> Result<u32> {
        let count = self.chunks_for(payload.len());

        for index in 0..count {
            let start = index as usize * self.max_chunk_size;
            let end = (start + self.max_chunk_size).min(payload.len());
            let key = self.layout.chunk(version_tag, index);

            self.kv
                .set(&key, payload.slice(start..end), Some(self.chunk_ttl))
                .await?;
            trace!("Wrote chunk {} ({} bytes)", key, end - start);
        }

        debug!(
            "Wrote {} chunk(s) for body {} ({} bytes)",
            count,
            version_tag,
            payload.len()
        );
        Ok(count)
    }

    // == Reclaim ==
    /// Lowers the TTL of every chunk of a generation to the short tier.
    ///
    /// Each chunk is rewritten with check-and-set against the versionstamp just
    /// read, so a concurrent write to the same key is never clobbered. Missing
    /// chunks and chunks already expiring within the short tier are skipped.
    ///
    /// Returns the number of chunks demoted, or [`CacheError::Reclaim`] if any
    /// check-and-set lost its race.
    pub async fn reclaim(&self, version_tag: &str, chunks: u32) -> Result<usize> {
        let mut demoted = 0;
        let mut conflicts = 0;

        for index in 0..chunks {
            let key = self.layout.chunk(version_tag, index);
            let Some(entry) = self.kv.get(&key, Consistency::Strong).await? else {
                continue;
            };

            let deadline = current_timestamp_ms() + self.short_ttl.as_millis() as u64;
            if entry.expires_at.is_some_and(|expires| expires <= deadline) {
                continue;
            }

            let swapped = self
                .kv
                .check_and_set(
                    &key,
                    Some(entry.versionstamp),
                    entry.value,
                    Some(self.short_ttl),
                )
                .await?;
            if swapped {
                demoted += 1;
            } else {
                conflicts += 1;
            }
        }

        if conflicts > 0 {
            return Err(CacheError::Reclaim {
                version_tag: version_tag.to_string(),
                conflicts,
            });
        }

        debug!("Lowered expiry of {} chunk(s) of body {}", demoted, version_tag);
        Ok(demoted)
    }

    // == Stream ==
    /// Lazily reads and decodes a generation.
    ///
    /// Chunks are fetched `batch_size` at a time, only when the consumer asks
    /// for more data. A missing chunk or a failed read ends the stream with an error.
    pub fn stream(&self, body: &BodyDescriptor, codec: Arc<dyn Codec>) -> BodyStream {
        BodyStream::new(read_generation(
            self.kv.clone(),
            self.layout.clone(),
            body.version_tag.clone(),
            body.chunks,
            self.batch_size,
            codec,
        ))
    }
}

fn read_generation(
    kv: Arc<dyn KvStore>,
    layout: KeyLayout,
    version_tag: String,
    chunks: u32,
    batch_size: usize,
    codec: Arc<dyn Codec>,
) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    try_stream! {
        let mut decoder = codec.decoder()?;
        let mut next = 0u32;

        while next < chunks {
            let end = chunks.min(next + batch_size as u32);
            let keys: Vec<KvKey> = (next..end)
                .map(|index| layout.chunk(&version_tag, index))
                .collect();

            let entries = kv.get_many(&keys, Consistency::Eventual).await?;
            for (index, entry) in (next..end).zip(entries) {
                let entry = entry.ok_or_else(|| CacheError::MissingChunk {
                    version_tag: version_tag.clone(),
                    index,
                })?;

                let decoded = decoder.feed(&entry.value)?;
                if !decoded.is_empty() {
                    yield Bytes::from(decoded);
                }
            }
            next = end;
        }

        let tail = decoder.finish()?;
        if !tail.is_empty() {
            yield Bytes::from(tail);
        }
    }
}
