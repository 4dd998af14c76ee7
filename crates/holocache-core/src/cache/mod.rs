//! Sync completion tracking and full cache clear.
//!
//! A single metadata record marks the dataset as fully synced. While it is
//! set the orchestrator performs no network work at all; clearing the cache
//! removes it along with every entity table, forcing a full re-sync.

pub mod controller;

pub use controller::{CacheController, CacheStatus};
