//! Background Tasks Module
//!
//! # Tasks
//! - TTL Sweeper: Purges expired substrate entries at configured intervals
//! - Reclamation: Demotes orphaned body generations to the short TTL tier
//! - Tracked tasks: Background writes whose completion can be awaited

mod background;
mod cleanup;
mod reclaim;

pub use background::BackgroundTasks;
pub use cleanup::spawn_expiry_sweeper;
pub use reclaim::Reclaimer;
