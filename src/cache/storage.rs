//! Cache Registry Module
//!
//! Opens and deletes named caches over one substrate.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheHandle, KeyLayout};
use crate::codec::{Codec, ZstdCodec};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fingerprint::{Fingerprinter, RequestFingerprinter};
use crate::kv::{KvStore, MAX_KEY_SIZE};
use crate::models::{CacheQueryOptions, CacheRequest, CachedResponse};

/// Room left in a key for the parts appended after the cache name.
const KEY_HEADROOM: usize = 128;

// == Cache Storage ==
/// Registry of named caches sharing one substrate, codec and fingerprinter.
#[derive(Clone)]
pub struct CacheStorage {
    kv: Arc<dyn KvStore>,
    config: Config,
    codec: Arc<dyn Codec>,
    fingerprinter: Arc<dyn Fingerprinter>,
}

impl fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStorage")
            .field("config", &self.config)
            .field("codec", &self.codec.name())
            .field("fingerprinter", &self.fingerprinter)
            .finish_non_exhaustive()
    }
}

impl CacheStorage {
    // == Constructor ==
    /// Creates a registry using zstd at the configured level and a fingerprinter
    /// over the configured vary headers.
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(kv: Arc<dyn KvStore>, config: Config) -> Result<Self> {
        config.validate()?;
        let codec = Arc::new(ZstdCodec::new(config.compression_level));
        let fingerprinter = Arc::new(RequestFingerprinter::new(&config.vary_headers));

        Ok(Self {
            kv,
            config,
            codec,
            fingerprinter,
        })
    }

    /// Replaces the codec used by handles opened afterwards.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Replaces the fingerprinter used by handles opened afterwards.
    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Open ==
    /// Returns a handle bound to `["CACHES", name]`.
    ///
    /// Opening is idempotent: handles for the same name see the same entries.
    pub async fn open(&self, name: &str) -> Result<CacheHandle> {
        if name.is_empty() {
            return Err(CacheError::Validation("Cache name must not be empty".to_string()));
        }
        let prefix_len = KeyLayout::new(name).cache_prefix().encoded_len();
        if prefix_len + KEY_HEADROOM > MAX_KEY_SIZE {
            return Err(CacheError::Validation(format!(
                "Cache name is too long ({} bytes)",
                name.len()
            )));
        }

        debug!("Opened cache {}", name);
        Ok(CacheHandle::new(
            name,
            self.kv.clone(),
            &self.config,
            self.codec.clone(),
            self.fingerprinter.clone(),
        ))
    }

    // == Delete ==
    /// Deletes every metadata record and chunk of cache `name`.
    ///
    /// Returns `Ok(true)` even when the cache held nothing.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let layout = KeyLayout::new(name);
        let entries = self.kv.list(layout.cache_prefix()).await?;
        let count = entries.len();

        for entry in entries {
            self.kv.delete(&entry.key).await?;
        }

        info!("Deleted cache {} ({} keys)", name, count);
        Ok(true)
    }

    // == Unsupported ==
    pub async fn has(&self, _name: &str) -> Result<bool> {
        Err(CacheError::NotImplemented("CacheStorage::has"))
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        Err(CacheError::NotImplemented("CacheStorage::keys"))
    }

    pub async fn match_request(
        &self,
        _request: &CacheRequest,
        _options: Option<&CacheQueryOptions>,
    ) -> Result<Option<CachedResponse>> {
        Err(CacheError::NotImplemented("CacheStorage::match"))
    }
}
