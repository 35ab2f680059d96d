//! Request types accepted by the cache
//!
//! A [`CacheRequest`] carries what the fingerprint and the cacheability checks
//! need: method, URL and headers. Request bodies are never cached.

use url::Url;

use crate::error::{CacheError, Result};
use crate::models::Headers;

/// Request used as a cache lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    method: String,
    url: Url,
    headers: Headers,
}

impl CacheRequest {
    /// Creates a request with an explicit method.
    pub fn new(method: impl AsRef<str>, url: Url) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url,
            headers: Headers::new(),
        }
    }

    /// Parses `url` into a GET request.
    ///
    /// Returns a validation error if the URL does not parse.
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| CacheError::Validation(format!("Invalid URL '{}': {}", url, e)))?;
        Ok(Self::new("GET", url))
    }

    /// Adds a header and returns the request.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl From<Url> for CacheRequest {
    fn from(url: Url) -> Self {
        Self::new("GET", url)
    }
}

/// Query options accepted by `match` and `delete`.
///
/// None of them are supported; setting any of them fails the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheQueryOptions {
    pub ignore_search: bool,
    pub ignore_method: bool,
    pub ignore_vary: bool,
}
