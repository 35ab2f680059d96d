//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::codec::CodecError;
use crate::kv::KvError;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Request/response pair cannot be cached
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Query option the cache does not support
    #[error("Unsupported cache query option: {0}")]
    UnsupportedOption(&'static str),

    /// Operation exists only for contract compatibility
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Substrate call failed
    #[error("Storage error: {0}")]
    Kv(#[from] KvError),

    /// Body could not be compressed or decompressed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Metadata record could not be encoded or decoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// A chunk referenced by published metadata is gone
    #[error("Missing chunk {index} of body {version_tag}")]
    MissingChunk { version_tag: String, index: u32 },

    /// TTL demotion lost a check-and-set race on some chunks
    #[error("Could not lower expiry of {conflicts} chunk(s) of body {version_tag}")]
    Reclaim { version_tag: String, conflicts: usize },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// True for caller misuse: retrying the same call cannot succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CacheError::Validation(_) | CacheError::UnsupportedOption(_)
        )
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, CacheError::NotImplemented(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CacheError::Validation("x".into()).is_validation());
        assert!(CacheError::UnsupportedOption("ignore_search").is_validation());
        assert!(!CacheError::NotImplemented("Cache::add").is_validation());

        assert!(CacheError::NotImplemented("Cache::add").is_not_implemented());
        assert!(!CacheError::Kv(KvError::Unavailable("down".into())).is_not_implemented());
    }

    #[test]
    fn test_error_messages() {
        let err = CacheError::MissingChunk {
            version_tag: "abc".to_string(),
            index: 3,
        };
        assert_eq!(err.to_string(), "Missing chunk 3 of body abc");

        let err: CacheError = KvError::ValueTooLarge { size: 10, max: 5 }.into();
        assert!(err.to_string().contains("exceeds maximum of 5 bytes"));
    }
}
