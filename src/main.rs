//! KV Web Cache - smoke run
//!
//! Stores a file as a cached response in an in-memory store, reads it back
//! through the chunked streaming path and checks the bytes.
//!
//! Usage: `kv_web_cache <file> [url]`

use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_web_cache::{
    spawn_expiry_sweeper, CacheAvailability, CacheMode, CacheRequest, CacheStorage, CachedResponse,
    Config, LoaderCache, MemoryKv,
};

const DEFAULT_URL: &str = "https://localhost/smoke";

/// Entry point of the smoke run.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the in-memory store and start the expiry sweeper
/// 4. Open the cache once and put the file under the URL
/// 5. Match it back as a stream and compare the bytes
/// 6. Delete the entry and shut the sweeper down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kv_web_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: kv_web_cache <file> [url]");
    };
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_chunk_size={}, compression_level={}, long_ttl={:?}, short_ttl={:?}",
        config.max_chunk_size, config.compression_level, config.long_ttl, config.short_ttl
    );

    let kv = Arc::new(MemoryKv::new());
    let sweeper = spawn_expiry_sweeper(kv.clone(), config.sweep_interval);
    let storage = CacheStorage::new(kv.clone(), config)?;

    let loaders = LoaderCache::with_name(storage.clone(), "smoke");
    let CacheAvailability::Available(cache) = loaders.availability().await.clone() else {
        bail!("cache 'smoke' could not be opened");
    };

    let body = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let request = CacheRequest::get(&url)?;

    cache
        .put(
            &request,
            CachedResponse::ok(body.clone()).with_header("content-type", "application/octet-stream"),
        )
        .await?;
    info!("Stored {} bytes from {} under {}", body.len(), path, url);

    let Some(matched) = cache.match_request(&request, None).await? else {
        bail!("entry for {} vanished right after put", url);
    };
    let mut stream = matched.into_body_stream();
    let mut restored = Vec::with_capacity(body.len());
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        restored.extend_from_slice(&chunk?);
        chunks += 1;
    }
    if restored != body {
        bail!("round-trip mismatch: stored {} bytes, read {}", body.len(), restored.len());
    }
    info!("Matched {} bytes back in {} streamed piece(s)", restored.len(), chunks);

    let memo = LoaderCache::new(storage.clone());
    let len = body.len();
    for _ in 0..2 {
        let (size, status) = memo
            .load("file-size", &path, CacheMode::StaleWhileRevalidate, move || async move {
                Ok(len)
            })
            .await?;
        info!("Loader answered {} ({})", size, status);
        memo.flush().await;
    }

    cache.delete(&request, None).await?;
    cache.flush_reclamation().await;
    storage.delete("smoke").await?;
    storage.delete("loader").await?;
    info!("Entries deleted, {} key(s) left in store", kv.len().await);

    sweeper.abort();
    warn!("Expiry sweeper aborted");
    Ok(())
}
