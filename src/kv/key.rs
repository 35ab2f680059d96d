//! KV Key Module
//!
//! Tuple-shaped keys for the key-value substrate. Keys are ordered part by part,
//! so every key sharing a prefix sorts directly after that prefix.

use std::fmt;

use crate::kv::{KvError, MAX_KEY_SIZE};

// == Key Part ==
/// A single component of a [`KvKey`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    /// UTF-8 string component
    Str(String),
    /// Unsigned integer component (chunk indices)
    Int(u64),
}

impl KeyPart {
    /// Encoded size of this part in bytes.
    fn encoded_len(&self) -> usize {
        match self {
            KeyPart::Str(s) => s.len() + 2,
            KeyPart::Int(_) => 9,
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(u64::from(value))
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{:?}", s),
            KeyPart::Int(n) => write!(f, "{}", n),
        }
    }
}

// == KV Key ==
/// An ordered tuple of key parts, e.g. `["CACHES", "loader", "chunks", "<tag>", 3]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KvKey(Vec<KeyPart>);

impl KvKey {
    /// Creates a key from its parts.
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Returns a new key with `part` appended.
    pub fn child(&self, part: impl Into<KeyPart>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Self(parts)
    }

    /// Returns the key's parts.
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Returns true if `prefix` is a (non-strict) prefix of this key.
    pub fn starts_with(&self, prefix: &KvKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Encoded size of the key in bytes, as counted against [`MAX_KEY_SIZE`].
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(KeyPart::encoded_len).sum()
    }

    /// Rejects empty keys and keys over the substrate's size limit.
    pub fn validate(&self) -> Result<(), KvError> {
        if self.0.is_empty() {
            return Err(KvError::InvalidKey("key must have at least one part".to_string()));
        }
        let size = self.encoded_len();
        if size > MAX_KEY_SIZE {
            return Err(KvError::InvalidKey(format!(
                "key {} is {} bytes, exceeds maximum of {} bytes",
                self, size, MAX_KEY_SIZE
            )));
        }
        Ok(())
    }
}

impl<P: Into<KeyPart>> FromIterator<P> for KvKey {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_child_and_prefix() {
        let root: KvKey = ["CACHES", "loader"].into_iter().collect();
        let chunk = root.child("chunks").child("tag").child(3u32);

        assert!(chunk.starts_with(&root));
        assert!(!root.starts_with(&chunk));
        assert_eq!(chunk.parts().len(), 5);
        assert_eq!(chunk.parts()[4], KeyPart::Int(3));
    }

    #[test]
    fn test_key_ordering_groups_prefix() {
        let a: KvKey = ["CACHES", "a"].into_iter().collect();
        let a_child = a.child("metas");
        let b: KvKey = ["CACHES", "b"].into_iter().collect();

        assert!(a < a_child);
        assert!(a_child < b);
    }

    #[test]
    fn test_integer_parts_sort_numerically() {
        let base: KvKey = ["chunks"].into_iter().collect();
        assert!(base.child(2u32) < base.child(10u32));
    }

    #[test]
    fn test_key_display() {
        let key: KvKey = ["CACHES", "x"].into_iter().collect::<KvKey>().child(7u32);
        assert_eq!(key.to_string(), r#"["CACHES", "x", 7]"#);
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        assert!(matches!(KvKey::default().validate(), Err(KvError::InvalidKey(_))));

        let big: KvKey = ["x".repeat(MAX_KEY_SIZE)].into_iter().collect();
        assert!(matches!(big.validate(), Err(KvError::InvalidKey(_))));

        let ok: KvKey = ["CACHES", "loader"].into_iter().collect();
        assert!(ok.validate().is_ok());
    }
}
