//! Cache Module
//!
//! Request/response cache over a [`KvStore`](crate::kv::KvStore). Bodies are
//! compressed, split into chunks no larger than the substrate's value limit and
//! written before the metadata that references them.

mod chunks;
mod handle;
mod keys;
mod metadata;
mod storage;
mod validation;


// Re-export public types
pub use chunks::{chunk_count, ChunkStore};
pub use handle::CacheHandle;
pub use keys::{KeyLayout, ROOT_NAMESPACE};
pub use metadata::{BodyDescriptor, Metadata, MetadataIndex};
pub use storage::CacheStorage;
pub use validation::{assert_can_be_cached, assert_no_options};
