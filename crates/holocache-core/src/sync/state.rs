use serde::Serialize;

use crate::models::EntityType;

/// Where a sync run currently is.
///
/// `Idle → CacheCheck → Listing(t) → DetailFetching(t) → EntityDone(t) → … →
/// Completed | Failed`. Types with inline detail go straight from `Listing`
/// to `EntityDone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "entity", rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    CacheCheck,
    Listing(EntityType),
    DetailFetching(EntityType),
    EntityDone(EntityType),
    Completed,
    Failed,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Completed | SyncState::Failed)
    }

    pub fn is_running(&self) -> bool {
        !self.is_terminal() && *self != SyncState::Idle
    }

    pub fn entity(&self) -> Option<EntityType> {
        match self {
            SyncState::Listing(e) | SyncState::DetailFetching(e) | SyncState::EntityDone(e) => Some(*e),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::CacheCheck => write!(f, "checking cache"),
            SyncState::Listing(e) => write!(f, "listing {}", e),
            SyncState::DetailFetching(e) => write!(f, "fetching {} details", e),
            SyncState::EntityDone(e) => write!(f, "{} done", e),
            SyncState::Completed => write!(f, "completed"),
            SyncState::Failed => write!(f, "failed"),
        }
    }
}
