//! The `Holocache` composition root.
//!
//! Front ends build one `Holocache` at startup and pass it around. It owns the
//! store, the sync orchestrator and the relation resolver, and is the only
//! surface the presentation layer needs.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{error, info};

use crate::api::{RemoteSource, SwapiClient};
use crate::cache::{CacheController, CacheStatus};
use crate::config::Config;
use crate::models::{EntityType, Person};
use crate::progress::{ProgressBus, ProgressEvent, SubscriptionId};
use crate::relations::{decode_or_skip, PersonWithRelations, RelationResolver};
use crate::store::{EntityStore, JsonFileStore, StoreError};
use crate::sync::{SyncOrchestrator, SyncOutcome, SyncState};

/// Read-path failure. The message is fit for display; the cause is logged.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to load people")]
    People(#[source] StoreError),

    #[error("Failed to fetch person data")]
    Person(#[source] StoreError),
}

pub struct Holocache {
    store: Arc<dyn EntityStore>,
    sync: SyncOrchestrator,
    resolver: RelationResolver,
}

impl Holocache {
    /// Open the on-disk cache and the live API client described by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let store = Arc::new(JsonFileStore::new(cache_dir.clone())?);
        let remote = Arc::new(SwapiClient::new(&config.api)?);
        info!(cache_dir = %cache_dir.display(), base_url = %config.api.base_url, "Opened holocache");
        Ok(Self::from_parts(remote, store, config))
    }

    pub fn from_parts(remote: Arc<dyn RemoteSource>, store: Arc<dyn EntityStore>, config: &Config) -> Self {
        let bus = Arc::new(ProgressBus::new());
        Self {
            sync: SyncOrchestrator::new(remote, Arc::clone(&store), bus, config.sync.clone()),
            resolver: RelationResolver::new(Arc::clone(&store), &config.relations),
            store,
        }
    }

    /// Sync the dataset unless a previous sync completed. Concurrent callers
    /// share one run.
    pub async fn ensure_ready(&self) -> SyncOutcome {
        self.sync.ensure_ready().await
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ProgressEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.sync.bus().subscribe(observer)
    }

    pub fn bus(&self) -> &Arc<ProgressBus> {
        self.sync.bus()
    }

    pub fn sync(&self) -> &SyncOrchestrator {
        &self.sync
    }

    pub fn state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn cache(&self) -> &CacheController {
        self.sync.cache()
    }

    /// Every stored person, ordered by uid. Rows that do not decode are
    /// logged and left out.
    pub fn all_people(&self) -> Result<Vec<Person>, ReadError> {
        self.load_people().map_err(|e| {
            error!(error = %e, "Failed to load people");
            ReadError::People(e)
        })
    }

    fn load_people(&self) -> Result<Vec<Person>, StoreError> {
        Ok(self
            .store
            .get_all(EntityType::People)?
            .iter()
            .filter_map(decode_or_skip)
            .collect())
    }

    /// A person with homeworld, species, starships, vehicles and films
    /// resolved. `Ok(None)` when the uid is unknown.
    pub fn person_with_relations(&self, uid: &str) -> Result<Option<PersonWithRelations>, ReadError> {
        self.resolver.person_with_relations(uid).map_err(|e| {
            error!(uid, error = %e, "Failed to fetch person data");
            ReadError::Person(e)
        })
    }

    pub fn status(&self) -> Result<CacheStatus, StoreError> {
        self.cache().status()
    }

    /// Stop any sync in flight, wait for it to wind down, then wipe every
    /// table and the completion flag.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        if self.sync.is_running() {
            info!(state = %self.sync.state(), "Stopping sync before clearing the cache");
            self.sync.cancel();
        }
        self.sync.wait_idle().await;
        self.cache().clear_all()
    }
}
