//! Request and Response models for the cache
//!
//! This module defines the HTTP-shaped values the cache stores and returns.

pub mod headers;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use headers::Headers;
pub use requests::{CacheQueryOptions, CacheRequest};
pub use responses::{BodyStream, CachedResponse, ResponseBody};
