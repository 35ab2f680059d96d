//! Integration Tests for Loader Memoization
//!
//! Covers the bypass/miss/hit/stale decisions and background refresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use kv_web_cache::loader::{lookup_request, LOADER_CACHE_NAME};
use kv_web_cache::{
    CacheAvailability, CacheMode, CacheStorage, CachedResponse, Config, LoaderCache, LoaderStatus,
    MemoryKv,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    id: u32,
    name: String,
}

#[derive(Debug, Serialize)]
struct Props {
    slug: &'static str,
}

// == Helper Functions ==

fn loader_cache(config: Config) -> LoaderCache {
    let storage = CacheStorage::new(Arc::new(MemoryKv::new()), config).unwrap();
    LoaderCache::new(storage)
}

/// Loads `product` and counts how often the computation actually ran.
async fn load_counted(
    cache: &LoaderCache,
    calls: &Arc<AtomicUsize>,
    product: Product,
    mode: CacheMode,
) -> (Product, LoaderStatus) {
    let calls = calls.clone();
    cache
        .load("products/get", &Props { slug: "shoe" }, mode, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(product)
        })
        .await
        .unwrap()
}

fn product(id: u32) -> Product {
    Product {
        id,
        name: format!("product-{}", id),
    }
}

// == Status Decisions ==

#[tokio::test]
async fn test_miss_then_hit() {
    let cache = loader_cache(Config::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let (value, status) =
        load_counted(&cache, &calls, product(1), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Miss);
    assert_eq!(value, product(1));
    cache.flush().await;

    let (value, status) =
        load_counted(&cache, &calls, product(2), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Hit);
    assert_eq!(value, product(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_store_always_bypasses() {
    let cache = loader_cache(Config::default());
    let calls = Arc::new(AtomicUsize::new(0));

    for id in 0..3 {
        let (value, status) = load_counted(&cache, &calls, product(id), CacheMode::NoStore).await;
        assert_eq!(status, LoaderStatus::Bypass);
        assert_eq!(value, product(id));
        cache.flush().await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_disabled_by_config_bypasses() {
    let cache = loader_cache(Config {
        disable_loader_cache: true,
        ..Config::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let (_, status) =
            load_counted(&cache, &calls, product(1), CacheMode::StaleWhileRevalidate).await;
        assert_eq!(status, LoaderStatus::Bypass);
        cache.flush().await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unavailable_cache_bypasses() {
    let storage = CacheStorage::new(Arc::new(MemoryKv::new()), Config::default()).unwrap();
    let cache = LoaderCache::with_name(storage, "");
    let calls = Arc::new(AtomicUsize::new(0));

    assert!(matches!(
        cache.availability().await,
        CacheAvailability::Unavailable
    ));
    let (_, status) =
        load_counted(&cache, &calls, product(1), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Bypass);
}

#[tokio::test]
async fn test_stale_returns_cached_and_refreshes() {
    // Zero max age: every stored result is already expired
    let cache = loader_cache(Config {
        loader_max_age: 0,
        ..Config::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let (_, status) =
        load_counted(&cache, &calls, product(1), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Miss);
    cache.flush().await;

    let (value, status) =
        load_counted(&cache, &calls, product(2), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Stale);
    assert_eq!(value, product(1));
    cache.flush().await;

    let (value, status) =
        load_counted(&cache, &calls, product(3), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Stale);
    assert_eq!(value, product(2));
    cache.flush().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_expires_counts_as_fresh() {
    let storage = CacheStorage::new(Arc::new(MemoryKv::new()), Config::default()).unwrap();
    let handle = storage.open(LOADER_CACHE_NAME).await.unwrap();
    let props = serde_json::to_string(&Props { slug: "shoe" }).unwrap();
    let request = lookup_request("products/get", &props).unwrap();
    handle
        .put(&request, CachedResponse::ok(serde_json::to_vec(&product(7)).unwrap()))
        .await
        .unwrap();

    let cache = LoaderCache::new(storage);
    let calls = Arc::new(AtomicUsize::new(0));
    let (value, status) =
        load_counted(&cache, &calls, product(8), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Hit);
    assert_eq!(value, product(7));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparseable_expires_counts_as_stale() {
    let storage = CacheStorage::new(Arc::new(MemoryKv::new()), Config::default()).unwrap();
    let handle = storage.open(LOADER_CACHE_NAME).await.unwrap();
    let props = serde_json::to_string(&Props { slug: "shoe" }).unwrap();
    let request = lookup_request("products/get", &props).unwrap();
    handle
        .put(
            &request,
            CachedResponse::ok(serde_json::to_vec(&product(7)).unwrap())
                .with_header("expires", "tomorrow-ish"),
        )
        .await
        .unwrap();

    let cache = LoaderCache::new(storage.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let (value, status) =
        load_counted(&cache, &calls, product(8), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Stale);
    assert_eq!(value, product(7));
    cache.flush().await;

    // The background refresh replaced the entry with a fresh one
    let refreshed = handle.match_request(&request, None).await.unwrap().unwrap();
    assert_ne!(refreshed.headers.get("expires"), Some("tomorrow-ish"));
    assert_eq!(
        refreshed.bytes().await.unwrap(),
        Bytes::from(serde_json::to_vec(&product(8)).unwrap())
    );
}

#[tokio::test]
async fn test_props_partition_results() {
    let cache = loader_cache(Config::default());

    for slug in ["a", "b"] {
        let (value, status) = cache
            .load("echo", &slug, CacheMode::StaleWhileRevalidate, move || async move {
                Ok(slug.to_uppercase())
            })
            .await
            .unwrap();
        assert_eq!(status, LoaderStatus::Miss);
        assert_eq!(value, slug.to_uppercase());
    }
    cache.flush().await;

    let (value, status) = cache
        .load("echo", &"b", CacheMode::StaleWhileRevalidate, || async {
            Ok("unused".to_string())
        })
        .await
        .unwrap();
    assert_eq!(status, LoaderStatus::Hit);
    assert_eq!(value, "B");
}

// == Errors ==

#[tokio::test]
async fn test_compute_error_propagates_and_caches_nothing() {
    let cache = loader_cache(Config::default());

    let result: anyhow::Result<(Product, LoaderStatus)> = cache
        .load("broken", &(), CacheMode::StaleWhileRevalidate, || async {
            Err(anyhow!("upstream down"))
        })
        .await;
    assert!(result.unwrap_err().to_string().contains("upstream down"));
    cache.flush().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let (_, status) = cache
        .load("broken", &(), CacheMode::StaleWhileRevalidate, move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(product(1))
        })
        .await
        .unwrap();
    assert_eq!(status, LoaderStatus::Miss);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undecodable_entry_is_a_miss() {
    let storage = CacheStorage::new(Arc::new(MemoryKv::new()), Config::default()).unwrap();
    let handle = storage.open(LOADER_CACHE_NAME).await.unwrap();
    let request = lookup_request("products/get", r#"{"slug":"shoe"}"#).unwrap();
    handle
        .put(&request, CachedResponse::ok("not json"))
        .await
        .unwrap();

    let cache = LoaderCache::new(storage);
    let calls = Arc::new(AtomicUsize::new(0));
    let (value, status) =
        load_counted(&cache, &calls, product(3), CacheMode::StaleWhileRevalidate).await;
    assert_eq!(status, LoaderStatus::Miss);
    assert_eq!(value, product(3));
}

// == Single-Flight Open ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_shares_one_handle() {
    let cache = loader_cache(Config::default());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            matches!(cache.availability().await, CacheAvailability::Available(_))
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let first = cache.availability().await as *const CacheAvailability;
    let second = cache.clone();
    let again = second.availability().await as *const CacheAvailability;
    assert_eq!(first, again);
}
