//! Progress reporting for sync runs.
//!
//! `ProgressBus` delivers every `ProgressEvent` synchronously to each registered
//! observer, in registration order. Observers run on the sync path: they must
//! return quickly and never block on I/O. An observer that fails or panics is
//! logged and skipped; the remaining observers still receive the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::EntityType;
use crate::utils::percent;

/// A sync lifecycle event, serialized with a snake_case `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Start {
        message: String,
    },
    EntityStart {
        entity: EntityType,
        message: String,
    },
    ListProgress {
        entity: EntityType,
        loaded: usize,
        total: Option<usize>,
        progress: Option<u8>,
        message: String,
    },
    EntityListComplete {
        entity: EntityType,
        count: usize,
        message: String,
    },
    DetailStart {
        entity: EntityType,
        message: String,
    },
    DetailSkip {
        entity: EntityType,
        message: String,
    },
    DetailProgress {
        entity: EntityType,
        processed: usize,
        total: usize,
        progress: Option<u8>,
        /// The attempt failed and the batch will be retried.
        failed: bool,
        retry_in_ms: Option<u64>,
        message: String,
    },
    EntityComplete {
        entity: EntityType,
        message: String,
    },
    Complete {
        from_cache: bool,
        progress: u8,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn list_progress(entity: EntityType, loaded: usize, total: Option<usize>) -> Self {
        let message = match total {
            Some(total) => format!("Listed {} of {} {}", loaded, total, entity),
            None => format!("Listed {} {}", loaded, entity),
        };
        ProgressEvent::ListProgress {
            entity,
            loaded,
            total,
            progress: percent(loaded, total),
            message,
        }
    }

    pub fn detail_progress(entity: EntityType, processed: usize, total: usize) -> Self {
        ProgressEvent::DetailProgress {
            entity,
            processed,
            total,
            progress: percent(processed, Some(total)),
            failed: false,
            retry_in_ms: None,
            message: format!("Fetched details for {} of {} {}", processed, total, entity),
        }
    }

    pub fn detail_retry(entity: EntityType, processed: usize, total: usize, retry_in_ms: u64) -> Self {
        ProgressEvent::DetailProgress {
            entity,
            processed,
            total,
            progress: percent(processed, Some(total)),
            failed: true,
            retry_in_ms: Some(retry_in_ms),
            message: format!(
                "Batch of {} failed, retrying in {}s ({} of {} done)",
                entity,
                retry_in_ms / 1000,
                processed,
                total
            ),
        }
    }

    pub fn loaded_from_cache() -> Self {
        ProgressEvent::Complete {
            from_cache: true,
            progress: 100,
            message: "Data loaded from cache".to_string(),
        }
    }

    pub fn completed() -> Self {
        ProgressEvent::Complete {
            from_cache: false,
            progress: 100,
            message: "All data initialized successfully!".to_string(),
        }
    }

    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::EntityStart { .. } => "entity_start",
            ProgressEvent::ListProgress { .. } => "list_progress",
            ProgressEvent::EntityListComplete { .. } => "entity_list_complete",
            ProgressEvent::DetailStart { .. } => "detail_start",
            ProgressEvent::DetailSkip { .. } => "detail_skip",
            ProgressEvent::DetailProgress { .. } => "detail_progress",
            ProgressEvent::EntityComplete { .. } => "entity_complete",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    pub fn entity(&self) -> Option<EntityType> {
        match self {
            ProgressEvent::EntityStart { entity, .. }
            | ProgressEvent::ListProgress { entity, .. }
            | ProgressEvent::EntityListComplete { entity, .. }
            | ProgressEvent::DetailStart { entity, .. }
            | ProgressEvent::DetailSkip { entity, .. }
            | ProgressEvent::DetailProgress { entity, .. }
            | ProgressEvent::EntityComplete { entity, .. } => Some(*entity),
            ProgressEvent::Start { .. } | ProgressEvent::Complete { .. } | ProgressEvent::Error { .. } => None,
        }
    }

    /// Percentage for events that carry one.
    pub fn progress(&self) -> Option<u8> {
        match self {
            ProgressEvent::Start { .. } => Some(0),
            ProgressEvent::ListProgress { progress, .. } | ProgressEvent::DetailProgress { progress, .. } => *progress,
            ProgressEvent::Complete { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Start { message }
            | ProgressEvent::EntityStart { message, .. }
            | ProgressEvent::ListProgress { message, .. }
            | ProgressEvent::EntityListComplete { message, .. }
            | ProgressEvent::DetailStart { message, .. }
            | ProgressEvent::DetailSkip { message, .. }
            | ProgressEvent::DetailProgress { message, .. }
            | ProgressEvent::EntityComplete { message, .. }
            | ProgressEvent::Complete { message, .. }
            | ProgressEvent::Error { message } => message,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct ProgressBus {
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_id: AtomicU64,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// Forward events into an unbounded channel, for consumers that want to
    /// process them off the sync path.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            tx.send(event.clone())
                .map_err(|_| anyhow::anyhow!("progress receiver dropped"))
        });
        (id, rx)
    }

    /// Returns whether the observer was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Deliver an event to every observer registered when the call started.
    /// Returns how many observers accepted it.
    pub fn publish(&self, event: &ProgressEvent) -> usize {
        // Snapshot so observers may (un)subscribe without deadlocking and so
        // late subscribers miss this event.
        let snapshot: Vec<(SubscriptionId, Observer)> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for (id, observer) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| observer(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(subscription = id.0, event = event.kind(), error = %e, "Progress observer failed");
                }
                Err(_) => {
                    warn!(subscription = id.0, event = event.kind(), "Progress observer panicked");
                }
            }
        }
        delivered
    }
}
