//! Persistent tables for the synced dataset.
//!
//! One table per entity type keyed by `uid`, plus a small metadata table that
//! holds the sync completion flag. `put` is an atomic upsert: a reader sees
//! either none or all of the records from one call, and records from earlier
//! calls stay visible while a later call is in progress.

pub mod error;
pub mod json;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{EntityType, Record};

pub use error::StoreError;
pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// A row of the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl MetaEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            updated_at: Utc::now(),
        }
    }
}

pub trait EntityStore: Send + Sync {
    /// A single record by uid.
    fn get(&self, entity: EntityType, uid: &str) -> Result<Option<Record>, StoreError>;

    /// Every record of a type, ordered by uid.
    fn get_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError>;

    /// Upsert records by uid in one atomic step.
    fn put(&self, entity: EntityType, records: &[Record]) -> Result<(), StoreError>;

    fn get_meta(&self, key: &str) -> Result<Option<MetaEntry>, StoreError>;

    fn put_meta(&self, entry: MetaEntry) -> Result<(), StoreError>;

    /// Wipe every entity table and the metadata table.
    fn clear(&self) -> Result<(), StoreError>;

    fn count(&self, entity: EntityType) -> Result<usize, StoreError> {
        Ok(self.get_all(entity)?.len())
    }
}
