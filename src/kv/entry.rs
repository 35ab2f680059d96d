//! Stored Value Module
//!
//! Defines the structure for individual substrate entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

// == Stored Value ==
/// A value held by the in-memory substrate together with its versionstamp and expiry.
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// The stored bytes
    pub value: Bytes,
    /// Versionstamp assigned on the write that produced this value
    pub versionstamp: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredValue {
    // == Constructor ==
    /// Creates a new stored value with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The bytes to store
    /// * `versionstamp` - Versionstamp of the write
    /// * `ttl` - Optional time to live
    pub fn new(value: Bytes, versionstamp: u64, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl.map(|ttl| now + ttl.as_millis() as u64);

        Self {
            value,
            versionstamp,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the value has expired at `now_ms`.
    ///
    /// A value is expired once the clock reading is greater than or equal to its
    /// expiration time.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_creation_no_ttl() {
        let entry = StoredValue::new(Bytes::from_static(b"v"), 1, None);

        assert_eq!(entry.value, Bytes::from_static(b"v"));
        assert_eq!(entry.versionstamp, 1);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_value_expiry_timestamp() {
        let before = current_timestamp_ms();
        let entry = StoredValue::new(Bytes::new(), 1, Some(Duration::from_secs(10)));
        let after = current_timestamp_ms();

        let expires = entry.expires_at.unwrap();
        assert!(expires >= before + 10_000);
        assert!(expires <= after + 10_000);
        assert!(!entry.is_expired_at(after));
        assert!(entry.is_expired_at(after + 10_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = StoredValue {
            value: Bytes::new(),
            versionstamp: 1,
            expires_at: Some(now),
        };

        assert!(entry.is_expired_at(now), "Value should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }
}
