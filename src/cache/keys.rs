//! Substrate key layout for one named cache.
//!
//! | Purpose  | Key                                              |
//! |----------|--------------------------------------------------|
//! | Metadata | `["CACHES", name, "metas", fingerprint]`         |
//! | Chunk    | `["CACHES", name, "chunks", version_tag, index]` |

use crate::fingerprint::Fingerprint;
use crate::kv::KvKey;

/// Root namespace shared by every cache.
pub const ROOT_NAMESPACE: &str = "CACHES";

const METAS: &str = "metas";
const CHUNKS: &str = "chunks";

/// Builds the keys of one named cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    root: KvKey,
}

impl KeyLayout {
    pub fn new(cache_name: &str) -> Self {
        Self {
            root: [ROOT_NAMESPACE, cache_name].into_iter().collect(),
        }
    }

    /// Prefix of every key belonging to this cache.
    pub fn cache_prefix(&self) -> &KvKey {
        &self.root
    }

    pub fn metadata_prefix(&self) -> KvKey {
        self.root.child(METAS)
    }

    pub fn metadata(&self, fingerprint: &Fingerprint) -> KvKey {
        self.metadata_prefix().child(fingerprint.as_str())
    }

    pub fn chunks_prefix(&self) -> KvKey {
        self.root.child(CHUNKS)
    }

    /// Prefix of every chunk of one generation.
    pub fn generation_prefix(&self, version_tag: &str) -> KvKey {
        self.chunks_prefix().child(version_tag)
    }

    pub fn chunk(&self, version_tag: &str, index: u32) -> KvKey {
        self.generation_prefix(version_tag).child(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{Fingerprinter, RequestFingerprinter};
    use crate::kv::KeyPart;
    use crate::models::CacheRequest;

    #[test]
    fn test_metadata_key_shape() {
        let layout = KeyLayout::new("loader");
        let fingerprint =
            RequestFingerprinter::default().fingerprint(&CacheRequest::get("https://x/a").unwrap());

        let key = layout.metadata(&fingerprint);
        assert_eq!(
            key.parts(),
            &[
                KeyPart::from("CACHES"),
                KeyPart::from("loader"),
                KeyPart::from("metas"),
                KeyPart::from(fingerprint.as_str()),
            ]
        );
    }

    #[test]
    fn test_chunk_key_shape() {
        let layout = KeyLayout::new("pages");
        let key = layout.chunk("tag-1", 4);

        assert_eq!(
            key.parts(),
            &[
                KeyPart::from("CACHES"),
                KeyPart::from("pages"),
                KeyPart::from("chunks"),
                KeyPart::from("tag-1"),
                KeyPart::Int(4),
            ]
        );
        assert!(key.starts_with(&layout.generation_prefix("tag-1")));
        assert!(key.starts_with(layout.cache_prefix()));
        assert!(!key.starts_with(&layout.metadata_prefix()));
    }

    #[test]
    fn test_caches_do_not_share_prefixes() {
        let a = KeyLayout::new("a");
        let ab = KeyLayout::new("ab");
        assert!(!ab.chunk("t", 0).starts_with(a.cache_prefix()));
    }
}
