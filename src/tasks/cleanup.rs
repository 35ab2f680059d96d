//! TTL Sweeper Task
//!
//! Background task that periodically purges expired entries from the in-memory substrate.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::kv::MemoryKv;

/// Spawns a background task that periodically purges expired substrate entries.
///
/// Reads already ignore expired entries; the sweeper only returns their memory.
///
/// # Arguments
/// * `kv` - Shared in-memory substrate
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
pub fn spawn_expiry_sweeper(kv: Arc<MemoryKv>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL sweeper with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = kv.purge_expired().await;
            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }
    })
}
