//! Tracked Background Tasks
//!
//! Fire-and-forget work whose completion can still be awaited, for tests and
//! for orderly shutdown.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::warn;

/// Set of tokio tasks spawned by one owner.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    label: &'static str,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    /// Creates an empty set. `label` names the tasks in log lines.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawns `task` on the current tokio runtime and tracks it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Number of tasks spawned and not yet observed as finished.
    pub fn pending(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Waits for every task spawned so far, including ones spawned while waiting.
    pub async fn drain(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *pending)
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("{} task failed: {}", self.label, e);
                }
            }
        }
    }
}
