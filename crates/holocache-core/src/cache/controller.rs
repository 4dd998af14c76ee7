use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::models::EntityType;
use crate::store::{EntityStore, MetaEntry, StoreError};

/// Metadata key of the completion flag.
pub const COMPLETION_KEY: &str = "initialization_complete";

#[derive(Clone)]
pub struct CacheController {
    store: Arc<dyn EntityStore>,
}

impl CacheController {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub fn is_complete(&self) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get_meta(COMPLETION_KEY)?
            .is_some_and(|entry| entry.value == Value::Bool(true)))
    }

    pub fn mark_complete(&self) -> Result<(), StoreError> {
        self.store.put_meta(MetaEntry::new(COMPLETION_KEY, true))
    }

    /// Wipe every entity table and the completion flag together.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!("Cache cleared");
        Ok(())
    }

    pub fn status(&self) -> Result<CacheStatus, StoreError> {
        let flag = self.store.get_meta(COMPLETION_KEY)?;
        let complete = flag.as_ref().is_some_and(|entry| entry.value == Value::Bool(true));
        let counts = EntityType::SYNC_ORDER
            .into_iter()
            .map(|entity| Ok((entity, self.store.count(entity)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(CacheStatus {
            complete,
            completed_at: flag.filter(|_| complete).map(|entry| entry.updated_at),
            counts,
        })
    }
}

/// Snapshot of what the cache holds.
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub complete: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: Vec<(EntityType, usize)>,
}

impl CacheStatus {
    pub fn total_records(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.completed_at.map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "never".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                // Round up: 1d 12h+ becomes 2d
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
