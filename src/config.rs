//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{CacheError, Result};
use crate::kv::MAX_VALUE_SIZE;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Largest chunk written to the substrate, in bytes
    pub max_chunk_size: usize,
    /// Grace window before an orphaned body expires
    pub short_ttl: Duration,
    /// Lifetime of a published entry
    pub long_ttl: Duration,
    /// Chunks requested per substrate read while streaming a body
    pub match_batch_size: usize,
    /// zstd compression level
    pub compression_level: i32,
    /// Expiry sweeper interval in seconds
    pub sweep_interval: u64,
    /// Request headers that take part in the fingerprint
    pub vary_headers: Vec<String>,
    /// Bypass the loader cache entirely
    pub disable_loader_cache: bool,
    /// Freshness window stamped on loader results, in seconds
    pub loader_max_age: u64,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `KV_CACHE_MAX_CHUNK_SIZE` - Chunk size in bytes (default: 65536)
    /// - `KV_CACHE_SHORT_TTL_MS` - Orphan grace window (default: 10000)
    /// - `KV_CACHE_LONG_TTL_MS` - Entry lifetime (default: 86400000)
    /// - `KV_CACHE_MATCH_BATCH_SIZE` - Chunks per read (default: 10)
    /// - `KV_CACHE_COMPRESSION_LEVEL` - zstd level (default: 4)
    /// - `KV_CACHE_SWEEP_INTERVAL` - Sweeper frequency in seconds (default: 1)
    /// - `KV_CACHE_VARY_HEADERS` - Comma-separated header names (default: none)
    /// - `DISABLE_LOADER_CACHE` - Any value disables the loader cache
    /// - `LOADER_CACHE_MAX_AGE_SECS` - Loader freshness (default: 1800)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_chunk_size: env_or("KV_CACHE_MAX_CHUNK_SIZE", defaults.max_chunk_size),
            short_ttl: Duration::from_millis(env_or(
                "KV_CACHE_SHORT_TTL_MS",
                defaults.short_ttl.as_millis() as u64,
            )),
            long_ttl: Duration::from_millis(env_or(
                "KV_CACHE_LONG_TTL_MS",
                defaults.long_ttl.as_millis() as u64,
            )),
            match_batch_size: env_or("KV_CACHE_MATCH_BATCH_SIZE", defaults.match_batch_size),
            compression_level: env_or("KV_CACHE_COMPRESSION_LEVEL", defaults.compression_level),
            sweep_interval: env_or("KV_CACHE_SWEEP_INTERVAL", defaults.sweep_interval),
            vary_headers: env::var("KV_CACHE_VARY_HEADERS")
                .map(|v| parse_header_list(&v))
                .unwrap_or(defaults.vary_headers),
            disable_loader_cache: env::var_os("DISABLE_LOADER_CACHE").is_some(),
            loader_max_age: env_or("LOADER_CACHE_MAX_AGE_SECS", defaults.loader_max_age),
        }
    }

    /// TTL applied to body chunks. Always outlives the metadata that points at them.
    pub fn chunk_ttl(&self) -> Duration {
        self.long_ttl + self.short_ttl
    }

    /// Rejects settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 || self.max_chunk_size > MAX_VALUE_SIZE {
            return Err(CacheError::Config(format!(
                "max_chunk_size must be between 1 and {} bytes, got {}",
                MAX_VALUE_SIZE, self.max_chunk_size
            )));
        }
        if self.match_batch_size == 0 {
            return Err(CacheError::Config(
                "match_batch_size must be at least 1".to_string(),
            ));
        }
        if self.short_ttl >= self.long_ttl {
            return Err(CacheError::Config(format!(
                "short_ttl ({:?}) must be below long_ttl ({:?})",
                self.short_ttl, self.long_ttl
            )));
        }
        Ok(())
    }
}

fn parse_header_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_chunk_size: 64 * 1024,
            short_ttl: Duration::from_secs(10),
            long_ttl: Duration::from_secs(3600 * 24),
            match_batch_size: 10,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sweep_interval: 1,
            vary_headers: Vec::new(),
            disable_loader_cache: false,
            loader_max_age: 30 * 60,
        }
    }
}
