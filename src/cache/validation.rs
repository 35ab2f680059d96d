//! Cacheability checks run before any storage access.

use crate::error::{CacheError, Result};
use crate::models::{CacheQueryOptions, CacheRequest, CachedResponse};

/// Rejects request/response pairs the cache must not store.
pub fn assert_can_be_cached(request: &CacheRequest, response: &CachedResponse) -> Result<()> {
    let scheme = request.url().scheme();
    if scheme != "http" && scheme != "https" {
        return Err(CacheError::Validation(format!(
            "Request url protocol must be 'http:' or 'https:', got '{}:'",
            scheme
        )));
    }
    if request.method() != "GET" {
        return Err(CacheError::Validation(format!(
            "Request method must be GET, got {}",
            request.method()
        )));
    }
    if response.status == 206 {
        return Err(CacheError::Validation(
            "Response status must not be 206".to_string(),
        ));
    }
    if response.headers.has_token("vary", "*") {
        return Err(CacheError::Validation(
            "Response with 'Vary: *' cannot be cached".to_string(),
        ));
    }
    if response.headers.has_token("cache-control", "no-store") {
        return Err(CacheError::Validation(
            "Response with 'Cache-Control: no-store' cannot be cached".to_string(),
        ));
    }
    if response.body.is_disturbed() {
        return Err(CacheError::Validation(
            "Response body is already used".to_string(),
        ));
    }
    Ok(())
}

/// Rejects any query option; none are supported.
pub fn assert_no_options(options: Option<&CacheQueryOptions>) -> Result<()> {
    let Some(options) = options else {
        return Ok(());
    };
    if options.ignore_search {
        return Err(CacheError::UnsupportedOption("ignore_search"));
    }
    if options.ignore_method {
        return Err(CacheError::UnsupportedOption("ignore_method"));
    }
    if options.ignore_vary {
        return Err(CacheError::UnsupportedOption("ignore_vary"));
    }
    Ok(())
}
