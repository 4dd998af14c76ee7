//! Core library for holocache.
//!
//! Holocache keeps a complete local copy of the Star Wars API dataset so that,
//! after one successful sync, browsing works entirely offline. The pieces:
//!
//! - `api`: paginated listing and detail fetches against the remote API
//! - `store`: persistent tables, one per entity type plus sync metadata
//! - `progress`: ordered fan-out of sync events to observers
//! - `cache`: the "sync complete" flag and full cache clear
//! - `relations`: read-time resolution of a person's related entities
//! - `sync`: the orchestrator driving listing, throttled detail enrichment and retries
//! - `service`: the `Holocache` composition root handed to front ends

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod progress;
pub mod relations;
pub mod service;
pub mod store;
pub mod sync;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, ListPage, RemoteSource, SwapiClient};
pub use cache::{CacheController, CacheStatus};
pub use config::Config;
pub use models::{EntityType, Film, Person, Planet, Record, Species, Starship, Vehicle};
pub use progress::{ProgressBus, ProgressEvent, SubscriptionId};
pub use relations::{PersonRelations, PersonWithRelations, RelationResolver};
pub use service::{Holocache, ReadError};
pub use store::{EntityStore, JsonFileStore, MemoryStore, StoreError};
pub use sync::{SyncError, SyncOrchestrator, SyncOutcome, SyncReport, SyncState};
