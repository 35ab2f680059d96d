//! Metadata Index Module
//!
//! Maps a request fingerprint to the stored status, headers and a pointer to
//! the body generation. Records are small JSON documents kept apart from the
//! body chunks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::KeyLayout;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::kv::{Consistency, KvStore};
use crate::models::Headers;

// == Body Descriptor ==
/// Points at one complete generation of body chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    /// Generation identifier, minted per put
    pub version_tag: String,
    /// Number of chunks in the generation (at least one)
    pub chunks: u32,
    /// Codec the payload was encoded with
    pub codec: String,
}

// == Metadata ==
/// Stored response minus its body bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub status: u16,
    pub headers: Headers,
    /// None for a zero-length body
    pub body: Option<BodyDescriptor>,
}

impl Metadata {
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// == Metadata Index ==
/// Reads and writes metadata records of one named cache.
#[derive(Clone)]
pub struct MetadataIndex {
    kv: Arc<dyn KvStore>,
    layout: KeyLayout,
    ttl: Duration,
}

impl MetadataIndex {
    /// # Arguments
    /// * `kv` - Substrate holding the records
    /// * `layout` - Key layout of the owning cache
    /// * `ttl` - Lifetime of a published record
    pub fn new(kv: Arc<dyn KvStore>, layout: KeyLayout, ttl: Duration) -> Self {
        Self { kv, layout, ttl }
    }

    // == Get ==
    /// Reads the record for `fingerprint`, if any.
    pub async fn get(
        &self,
        fingerprint: &Fingerprint,
        consistency: Consistency,
    ) -> Result<Option<Metadata>> {
        let key = self.layout.metadata(fingerprint);
        match self.kv.get(&key, consistency).await? {
            Some(entry) => Ok(Some(Metadata::decode(&entry.value)?)),
            None => Ok(None),
        }
    }

    // == Publish ==
    /// Writes the record, overwriting whatever was there (last writer wins).
    pub async fn publish(&self, fingerprint: &Fingerprint, metadata: &Metadata) -> Result<()> {
        let key = self.layout.metadata(fingerprint);
        self.kv.set(&key, metadata.encode()?, Some(self.ttl)).await?;
        debug!("Published metadata {} (status {})", key, metadata.status);
        Ok(())
    }

    // == Remove ==
    /// Deletes the record and returns what it held. Missing records are not an error.
    pub async fn remove(&self, fingerprint: &Fingerprint) -> Result<Option<Metadata>> {
        let key = self.layout.metadata(fingerprint);
        let previous = self.kv.get(&key, Consistency::Strong).await?;
        self.kv.delete(&key).await?;

        // The record is already gone; an unreadable one only loses its chunk list
        let Some(entry) = previous else {
            return Ok(None);
        };
        match Metadata::decode(&entry.value) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                warn!("Removed unreadable metadata {}: {}", key, e);
                Ok(None)
            }
        }
    }
}
