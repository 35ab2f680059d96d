//! Loader Memoization Module
//!
//! Stale-while-revalidate memoization of expensive async computations on top of
//! one named cache. Results are stored as JSON with an `expires` header; a
//! fresh hit is returned as is, a stale one is returned and recomputed in the
//! background.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheHandle, CacheStorage};
use crate::models::{CacheRequest, CachedResponse};
use crate::tasks::BackgroundTasks;

/// Name of the cache loader results are stored in.
pub const LOADER_CACHE_NAME: &str = "loader";

/// Base URL of the synthetic lookup requests.
const LOOKUP_BASE_URL: &str = "https://localhost";

/// `Date::toUTCString`-style HTTP date, always GMT.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

// == Cache Mode ==
/// Caching policy declared by a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Always compute; never read or write the cache
    NoStore,
    /// Serve cached results, refreshing stale ones in the background
    StaleWhileRevalidate,
}

// == Loader Status ==
/// How a `load` call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderStatus {
    Bypass,
    Miss,
    Stale,
    Hit,
}

impl LoaderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderStatus::Bypass => "BYPASS",
            LoaderStatus::Miss => "MISS",
            LoaderStatus::Stale => "STALE",
            LoaderStatus::Hit => "HIT",
        }
    }
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Availability ==
/// Outcome of opening the loader cache. Resolved once per [`LoaderCache`].
#[derive(Debug, Clone)]
pub enum CacheAvailability {
    Unavailable,
    Available(CacheHandle),
}

impl CacheAvailability {
    pub fn handle(&self) -> Option<&CacheHandle> {
        match self {
            CacheAvailability::Available(handle) => Some(handle),
            CacheAvailability::Unavailable => None,
        }
    }
}

// == Loader Cache ==
/// Memoizes loader results in one cache of a [`CacheStorage`].
#[derive(Debug, Clone)]
pub struct LoaderCache {
    storage: CacheStorage,
    name: String,
    availability: Arc<OnceCell<CacheAvailability>>,
    disabled: bool,
    max_age: Duration,
    tasks: BackgroundTasks,
}

impl LoaderCache {
    /// Creates a loader cache over the `"loader"` cache of `storage`.
    ///
    /// `disable_loader_cache` and `loader_max_age` are taken from the storage
    /// configuration. The cache itself is opened on first use.
    pub fn new(storage: CacheStorage) -> Self {
        Self::with_name(storage, LOADER_CACHE_NAME)
    }

    /// Same as [`LoaderCache::new`] with a different cache name.
    pub fn with_name(storage: CacheStorage, name: &str) -> Self {
        let config = storage.config();
        let disabled = config.disable_loader_cache;
        let max_age = Duration::from_secs(config.loader_max_age);

        Self {
            storage,
            name: name.to_string(),
            availability: Arc::new(OnceCell::new()),
            disabled,
            max_age,
            tasks: BackgroundTasks::new("Loader cache"),
        }
    }

    /// Opens the cache on first call; concurrent callers share one attempt.
    ///
    /// A failed open is remembered as [`CacheAvailability::Unavailable`] and
    /// every later `load` bypasses the cache.
    pub async fn availability(&self) -> &CacheAvailability {
        self.availability
            .get_or_init(|| async {
                match self.storage.open(&self.name).await {
                    Ok(handle) => CacheAvailability::Available(handle),
                    Err(e) => {
                        warn!("Loader cache {} unavailable, bypassing: {}", self.name, e);
                        CacheAvailability::Unavailable
                    }
                }
            })
            .await
    }

    // == Load ==
    /// Returns the result of `compute`, memoized under `(loader, props)`.
    ///
    /// # Arguments
    /// * `loader` - Identifier of the loader
    /// * `props` - Request-derived inputs; part of the cache key as JSON
    /// * `mode` - Caching policy of the loader
    /// * `compute` - Produces a fresh value; called at most once per call
    ///
    /// # Returns
    /// The value and how it was obtained. Errors only come from `compute` or
    /// from `props` failing to serialize; cache failures degrade to a miss.
    pub async fn load<P, T, F, Fut>(
        &self,
        loader: &str,
        props: &P,
        mode: CacheMode,
        compute: F,
    ) -> anyhow::Result<(T, LoaderStatus)>
    where
        P: Serialize + ?Sized,
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let start = Instant::now();
        let props_json = serde_json::to_string(props).context("Loader props are not serializable")?;

        let result = self.resolve(loader, &props_json, mode, compute).await;
        let latency = format_latency(start.elapsed());
        match &result {
            Ok((_, status)) => info!("-> {} {} {} {}", status, latency, loader, props_json),
            Err(e) => warn!("-> FAILED {} {} {}: {:#}", latency, loader, props_json, e),
        }
        result
    }

    async fn resolve<T, F, Fut>(
        &self,
        loader: &str,
        props_json: &str,
        mode: CacheMode,
        compute: F,
    ) -> anyhow::Result<(T, LoaderStatus)>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let cache = if mode == CacheMode::NoStore || self.disabled {
            None
        } else {
            self.availability().await.handle().cloned()
        };
        let Some(cache) = cache else {
            return Ok((compute().await?, LoaderStatus::Bypass));
        };

        let request = lookup_request(loader, props_json)?;
        let cached = match cache.match_request(&request, None).await {
            Ok(Some(matched)) => read_cached::<T>(matched).await,
            Ok(None) => None,
            Err(e) => {
                warn!("Loader cache lookup for {} failed: {}", loader, e);
                None
            }
        };

        match cached {
            None => {
                let value = compute().await?;
                self.store_in_background(cache, request, &value);
                Ok((value, LoaderStatus::Miss))
            }
            Some((value, true)) => {
                self.refresh_in_background(cache, request, compute);
                Ok((value, LoaderStatus::Stale))
            }
            Some((value, false)) => Ok((value, LoaderStatus::Hit)),
        }
    }

    /// Waits for background stores and refreshes, then for the reclamation
    /// they triggered.
    pub async fn flush(&self) {
        self.tasks.drain().await;
        if let Some(CacheAvailability::Available(handle)) = self.availability.get() {
            handle.flush_reclamation().await;
        }
    }

    fn store_in_background<T: Serialize>(&self, cache: CacheHandle, request: CacheRequest, value: &T) {
        match encode_response(value, self.max_age) {
            Ok(response) => self.tasks.spawn(async move {
                if let Err(e) = cache.put(&request, response).await {
                    warn!("Storing loader result for {} failed: {}", request.url(), e);
                }
            }),
            Err(e) => warn!("Loader result for {} is not serializable: {}", request.url(), e),
        }
    }

    fn refresh_in_background<T, F, Fut>(&self, cache: CacheHandle, request: CacheRequest, compute: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let max_age = self.max_age;
        self.tasks.spawn(async move {
            let response = match compute().await {
                Ok(value) => encode_response(&value, max_age),
                Err(e) => {
                    warn!("Revalidating {} failed: {:#}", request.url(), e);
                    return;
                }
            };
            match response {
                Ok(response) => {
                    if let Err(e) = cache.put(&request, response).await {
                        warn!("Storing revalidated result for {} failed: {}", request.url(), e);
                    } else {
                        debug!("Revalidated {}", request.url());
                    }
                }
                Err(e) => warn!("Revalidated result for {} is not serializable: {}", request.url(), e),
            }
        });
    }
}

// == Helpers ==
/// Synthetic GET request identifying `(loader, props)`.
pub fn lookup_request(loader: &str, props_json: &str) -> anyhow::Result<CacheRequest> {
    let url = Url::parse_with_params(
        LOOKUP_BASE_URL,
        &[("loader", loader), ("request", props_json)],
    )?;
    Ok(CacheRequest::from(url))
}

/// `now + max_age` as an HTTP date.
pub fn expires_header(max_age: Duration) -> String {
    let max_age = chrono::Duration::seconds(max_age.as_secs() as i64);
    (Utc::now() + max_age).format(HTTP_DATE_FORMAT).to_string()
}

/// True if `value` parses as a date later than now.
pub fn in_future(value: &str) -> bool {
    DateTime::parse_from_rfc2822(value)
        .map(|date| date.with_timezone(&Utc) > Utc::now())
        .unwrap_or(false)
}

fn encode_response<T: Serialize>(value: &T, max_age: Duration) -> serde_json::Result<CachedResponse> {
    let body = serde_json::to_vec(value)?;
    Ok(CachedResponse::ok(body)
        .with_header("content-type", "application/json")
        .with_header("expires", expires_header(max_age)))
}

/// Decodes a cached result and reports whether it is stale. Unreadable
/// entries count as absent.
async fn read_cached<T: DeserializeOwned>(matched: CachedResponse) -> Option<(T, bool)> {
    let stale = matched
        .headers
        .get("expires")
        .is_some_and(|expires| !in_future(expires));

    let body = match matched.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!("Reading cached loader result failed: {}", e);
            return None;
        }
    };
    match serde_json::from_slice(&body) {
        Ok(value) => Some((value, stale)),
        Err(e) => {
            warn!("Cached loader result is not valid JSON: {}", e);
            None
        }
    }
}

fn format_latency(elapsed: Duration) -> String {
    if elapsed >= Duration::from_secs(1) {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}
