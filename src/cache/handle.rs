//! Cache Handle Module
//!
//! One named cache. `put` writes body chunks and only then publishes metadata;
//! `match_request` reads metadata and streams chunks back through the codec;
//! `delete` drops metadata. Generations that lose their metadata are reclaimed
//! in the background.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::validation::{assert_can_be_cached, assert_no_options};
use crate::cache::{BodyDescriptor, ChunkStore, KeyLayout, Metadata, MetadataIndex};
use crate::codec::Codec;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprinter;
use crate::kv::{Consistency, KvStore};
use crate::models::{CacheQueryOptions, CacheRequest, CachedResponse, ResponseBody};
use crate::tasks::Reclaimer;

struct HandleInner {
    name: String,
    index: MetadataIndex,
    chunks: ChunkStore,
    codec: Arc<dyn Codec>,
    fingerprinter: Arc<dyn Fingerprinter>,
    reclaimer: Reclaimer,
}

// == Cache Handle ==
/// Handle to one named cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CacheHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("name", &self.inner.name)
            .field("codec", &self.inner.codec.name())
            .finish_non_exhaustive()
    }
}

impl CacheHandle {
    pub(crate) fn new(
        name: &str,
        kv: Arc<dyn KvStore>,
        config: &Config,
        codec: Arc<dyn Codec>,
        fingerprinter: Arc<dyn Fingerprinter>,
    ) -> Self {
        let layout = KeyLayout::new(name);
        Self {
            inner: Arc::new(HandleInner {
                name: name.to_string(),
                index: MetadataIndex::new(kv.clone(), layout.clone(), config.long_ttl),
                chunks: ChunkStore::new(kv, layout, config),
                codec,
                fingerprinter,
                reclaimer: Reclaimer::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    // == Put ==
    /// Stores `response` for `request`.
    ///
    /// Returns once the body chunks and the metadata are written. The
    /// generation the metadata pointed at before is reclaimed in the background.
    /// If any write fails, the new generation is reclaimed instead and the
    /// previous entry stays as it was.
    ///
    /// # Arguments
    /// * `request` - GET request over http(s)
    /// * `response` - Response to store; its body is consumed
    pub async fn put(&self, request: &CacheRequest, response: CachedResponse) -> Result<()> {
        assert_can_be_cached(request, &response)?;

        let inner = &self.inner;
        let fingerprint = inner.fingerprinter.fingerprint(request);
        let previous = inner.index.get(&fingerprint, Consistency::Strong).await?;

        let CachedResponse {
            status,
            headers,
            body,
        } = response;
        let raw = body.bytes().await?;

        let descriptor = if raw.is_empty() {
            None
        } else {
            let payload = Bytes::from(inner.codec.compress(&raw)?);
            let descriptor = BodyDescriptor {
                version_tag: Uuid::new_v4().to_string(),
                chunks: inner.chunks.chunks_for(payload.len()),
                codec: inner.codec.name().to_string(),
            };

            if let Err(e) = inner
                .chunks
                .write_generation(&descriptor.version_tag, &payload)
                .await
            {
                warn!(
                    "Writing body {} for {} failed, discarding it: {}",
                    descriptor.version_tag,
                    request.url(),
                    e
                );
                self.reclaim(descriptor);
                return Err(e);
            }
            Some(descriptor)
        };

        let metadata = Metadata {
            status,
            headers,
            body: descriptor,
        };
        if let Err(e) = inner.index.publish(&fingerprint, &metadata).await {
            warn!("Publishing metadata for {} failed: {}", request.url(), e);
            if let Some(body) = metadata.body {
                self.reclaim(body);
            }
            return Err(e);
        }

        debug!(
            "Stored {} in cache {} ({} bytes, {} chunk(s))",
            request.url(),
            inner.name,
            raw.len(),
            metadata.body.as_ref().map_or(0, |b| b.chunks)
        );

        if let Some(orphan) = previous.and_then(|m| m.body) {
            self.reclaim(orphan);
        }
        Ok(())
    }

    // == Match ==
    /// Looks up the response most recently stored for `request`.
    ///
    /// Metadata is read with eventual consistency. The returned body is a lazy
    /// stream: chunks are fetched as it is consumed, and dropping it stops the
    /// reads. Returns `Ok(None)` when nothing is stored.
    pub async fn match_request(
        &self,
        request: &CacheRequest,
        options: Option<&CacheQueryOptions>,
    ) -> Result<Option<CachedResponse>> {
        assert_no_options(options)?;

        let inner = &self.inner;
        let fingerprint = inner.fingerprinter.fingerprint(request);
        let Some(metadata) = inner.index.get(&fingerprint, Consistency::Eventual).await? else {
            debug!("No match for {} in cache {}", request.url(), inner.name);
            return Ok(None);
        };

        let body = match metadata.body {
            None => ResponseBody::Empty,
            Some(descriptor) if descriptor.codec != inner.codec.name() => {
                warn!(
                    "Ignoring entry for {}: stored with codec '{}', reading with '{}'",
                    request.url(),
                    descriptor.codec,
                    inner.codec.name()
                );
                return Ok(None);
            }
            Some(descriptor) => {
                ResponseBody::Stream(inner.chunks.stream(&descriptor, inner.codec.clone()))
            }
        };

        Ok(Some(CachedResponse {
            status: metadata.status,
            headers: metadata.headers,
            body,
        }))
    }

    // == Delete ==
    /// Removes the entry for `request`. Always `Ok(true)` unless storage fails.
    pub async fn delete(
        &self,
        request: &CacheRequest,
        options: Option<&CacheQueryOptions>,
    ) -> Result<bool> {
        assert_no_options(options)?;

        let fingerprint = self.inner.fingerprinter.fingerprint(request);
        let removed = self.inner.index.remove(&fingerprint).await?;

        if let Some(orphan) = removed.and_then(|m| m.body) {
            debug!("Deleted {} from cache {}", request.url(), self.inner.name);
            self.reclaim(orphan);
        }
        Ok(true)
    }

    // == Unsupported ==
    pub async fn add(&self, _request: &CacheRequest) -> Result<()> {
        Err(CacheError::NotImplemented("Cache::add"))
    }

    pub async fn add_all(&self, _requests: &[CacheRequest]) -> Result<()> {
        Err(CacheError::NotImplemented("Cache::add_all"))
    }

    pub async fn match_all(
        &self,
        _request: Option<&CacheRequest>,
        _options: Option<&CacheQueryOptions>,
    ) -> Result<Vec<CachedResponse>> {
        Err(CacheError::NotImplemented("Cache::match_all"))
    }

    pub async fn keys(
        &self,
        _request: Option<&CacheRequest>,
        _options: Option<&CacheQueryOptions>,
    ) -> Result<Vec<CacheRequest>> {
        Err(CacheError::NotImplemented("Cache::keys"))
    }

    // == Reclamation ==
    /// Waits until every background reclamation spawned by this handle is done.
    pub async fn flush_reclamation(&self) {
        self.inner.reclaimer.drain().await;
    }

    fn reclaim(&self, body: BodyDescriptor) {
        self.inner.reclaimer.spawn(self.inner.chunks.clone(), body);
    }
}
