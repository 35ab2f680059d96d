//! Orphan Reclamation Task
//!
//! Spawns TTL demotion of body generations that no metadata points at anymore.
//! Callers never wait on it; failures are logged and otherwise ignored.

use tracing::{debug, warn};

use crate::cache::{BodyDescriptor, ChunkStore};
use crate::tasks::BackgroundTasks;

/// Tracks in-flight reclamation tasks of one cache handle.
#[derive(Debug, Clone)]
pub struct Reclaimer {
    tasks: BackgroundTasks,
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self {
            tasks: BackgroundTasks::new("Reclamation"),
        }
    }
}

impl Reclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns reclamation of `body` on the current tokio runtime.
    ///
    /// # Arguments
    /// * `chunks` - Chunk store of the cache owning the generation
    /// * `body` - Descriptor of the orphaned generation
    pub fn spawn(&self, chunks: ChunkStore, body: BodyDescriptor) {
        self.tasks.spawn(async move {
            match chunks.reclaim(&body.version_tag, body.chunks).await {
                Ok(demoted) => debug!(
                    "Reclaimed body {}: {} of {} chunk(s) demoted",
                    body.version_tag, demoted, body.chunks
                ),
                Err(e) => warn!("Reclamation of body {} incomplete: {}", body.version_tag, e),
            }
        });
    }

    /// Number of reclamation tasks spawned and not yet observed as finished.
    pub fn pending(&self) -> usize {
        self.tasks.pending()
    }

    /// Waits for every reclamation task spawned so far.
    pub async fn drain(&self) {
        self.tasks.drain().await;
    }
}
