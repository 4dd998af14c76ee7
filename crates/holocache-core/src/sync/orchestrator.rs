use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::RemoteSource;
use crate::cache::CacheController;
use crate::config::{ListingFailurePolicy, SyncConfig};
use crate::models::{EntityType, Record};
use crate::progress::{ProgressBus, ProgressEvent};
use crate::store::EntityStore;

use super::{SyncError, SyncState};

/// What every caller of `ensure_ready` receives. The error is shared because
/// all callers attached to one run observe the same failure.
pub type SyncOutcome = Result<SyncReport, Arc<SyncError>>;

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// The completion flag was already set; nothing was fetched.
    pub from_cache: bool,
    /// Records persisted per entity type during this run.
    pub records: Vec<(EntityType, usize)>,
    /// Detail batch attempts that failed and were retried.
    pub failed_batches: u32,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn total_records(&self) -> usize {
        self.records.iter().map(|(_, n)| n).sum()
    }
}

struct InFlight {
    outcome: Shared<BoxFuture<'static, SyncOutcome>>,
    cancel: CancellationToken,
}

/// Drives one dataset sync at a time and lets concurrent callers share it.
///
/// Construct one per application and hand it to consumers; there is no
/// global instance.
pub struct SyncOrchestrator {
    engine: Arc<SyncEngine>,
    in_flight: Mutex<Option<InFlight>>,
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn EntityStore>,
        bus: Arc<ProgressBus>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            engine: Arc::new(SyncEngine {
                remote,
                cache: CacheController::new(Arc::clone(&store)),
                store,
                bus,
                config,
                state,
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Make sure the full dataset is in the store.
    ///
    /// Returns immediately (after one `complete` event) when a previous sync
    /// finished. Otherwise starts a sync, or attaches to the one already
    /// running, and waits for it. Must be called within a Tokio runtime.
    pub async fn ensure_ready(&self) -> SyncOutcome {
        self.attach_or_start().await
    }

    fn attach_or_start(&self) -> Shared<BoxFuture<'static, SyncOutcome>> {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(run) = slot.as_ref() {
            if run.outcome.peek().is_none() && !self.engine.state().is_terminal() {
                debug!("Sync already in flight, attaching");
                return run.outcome.clone();
            }
        }

        // Leave the terminal state before anyone else can look at it, so a
        // second caller racing this one attaches instead of starting over.
        self.engine.set_state(SyncState::CacheCheck);

        let cancel = CancellationToken::new();
        let engine = Arc::clone(&self.engine);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { engine.run(token).await });

        let outcome = async move {
            match handle.await {
                Ok(result) => result.map_err(Arc::new),
                Err(e) => Err(Arc::new(SyncError::Aborted(e.to_string()))),
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            outcome: outcome.clone(),
            cancel,
        });
        outcome
    }

    /// Stop the run in flight at its next network call or pause. The run ends
    /// as `Failed` with `SyncError::Cancelled`. Returns whether a run was
    /// signalled.
    pub fn cancel(&self) -> bool {
        let slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(run) if !self.engine.state().is_terminal() => {
                info!("Cancelling sync in flight");
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Wait for the run in flight, if any, to finish.
    pub async fn wait_idle(&self) {
        let outcome = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|run| run.outcome.clone());
        if let Some(outcome) = outcome {
            let _ = outcome.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.state().is_running()
    }

    pub fn state(&self) -> SyncState {
        self.engine.state()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.engine.state.subscribe()
    }

    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.engine.bus
    }

    pub fn cache(&self) -> &CacheController {
        &self.engine.cache
    }
}

struct SyncEngine {
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn EntityStore>,
    cache: CacheController,
    bus: Arc<ProgressBus>,
    config: SyncConfig,
    state: watch::Sender<SyncState>,
}

impl SyncEngine {
    fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_replace(state);
    }

    fn publish(&self, event: ProgressEvent) {
        self.bus.publish(&event);
    }

    /// The terminal state is set only after the terminal event went out, so a
    /// caller that sees it can start a new run without interleaving events.
    async fn run(&self, cancel: CancellationToken) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        match self.sync_all(&cancel, started).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(error = %e, "Sync failed");
                self.publish(ProgressEvent::Error {
                    message: format!("Error during initialization: {}", e),
                });
                self.set_state(SyncState::Failed);
                Err(e)
            }
        }
    }

    async fn sync_all(&self, cancel: &CancellationToken, started: Instant) -> Result<SyncReport, SyncError> {
        self.set_state(SyncState::CacheCheck);
        if self.cache.is_complete()? {
            info!("Dataset already synced, serving from cache");
            self.publish(ProgressEvent::loaded_from_cache());
            self.set_state(SyncState::Completed);
            return Ok(SyncReport {
                from_cache: true,
                elapsed: started.elapsed(),
                ..SyncReport::default()
            });
        }

        info!("Starting full dataset sync");
        self.publish(ProgressEvent::Start {
            message: "Starting data initialization...".to_string(),
        });

        let mut report = SyncReport::default();
        for entity in EntityType::SYNC_ORDER {
            let stored = self.sync_entity(entity, cancel, &mut report).await?;
            report.records.push((entity, stored));
        }

        self.cache.mark_complete()?;
        report.elapsed = started.elapsed();
        info!(
            records = report.total_records(),
            failed_batches = report.failed_batches,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Sync complete"
        );
        self.publish(ProgressEvent::completed());
        self.set_state(SyncState::Completed);
        Ok(report)
    }

    /// List, enrich and persist one entity type. Returns the number of records
    /// persisted.
    async fn sync_entity(
        &self,
        entity: EntityType,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<usize, SyncError> {
        self.publish(ProgressEvent::EntityStart {
            entity,
            message: format!("Fetching {} list...", entity),
        });

        self.set_state(SyncState::Listing(entity));
        let items = self.list_all(entity, cancel).await?;
        info!(entity = %entity, count = items.len(), "Listing complete");
        self.publish(ProgressEvent::EntityListComplete {
            entity,
            count: items.len(),
            message: format!("Found {} {}.", items.len(), entity),
        });

        let stored = if entity.has_inline_detail() {
            if !items.is_empty() {
                self.store.put(entity, &items)?;
            }
            self.publish(ProgressEvent::DetailSkip {
                entity,
                message: format!("Detailed data for {} already fetched.", entity),
            });
            items.len()
        } else {
            self.set_state(SyncState::DetailFetching(entity));
            self.publish(ProgressEvent::DetailStart {
                entity,
                message: format!("Fetching detailed {} data...", entity),
            });
            self.fetch_details(entity, &items, cancel, report).await?
        };

        self.set_state(SyncState::EntityDone(entity));
        self.publish(ProgressEvent::EntityComplete {
            entity,
            message: format!("Completed {}", entity),
        });
        Ok(stored)
    }

    /// Fetch listing pages strictly one after another until the server reports
    /// no further page.
    async fn list_all(&self, entity: EntityType, cancel: &CancellationToken) -> Result<Vec<Record>, SyncError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            match guarded(cancel, self.remote.fetch_list(entity, page)).await? {
                Ok(listing) => {
                    if listing.items.is_empty() {
                        break;
                    }
                    items.extend(listing.items);
                    self.publish(ProgressEvent::list_progress(entity, items.len(), listing.total_count));

                    if !listing.has_next {
                        break;
                    }
                    page += 1;
                    self.pause(self.config.page_delay(), cancel).await?;
                }
                Err(e) => match self.config.listing_failure {
                    ListingFailurePolicy::Truncate => {
                        warn!(
                            entity = %entity,
                            page,
                            kept = items.len(),
                            error = %e,
                            "Listing page failed, treating it as the last page"
                        );
                        self.pause(self.config.page_failure_delay(), cancel).await?;
                        break;
                    }
                    ListingFailurePolicy::Fail => {
                        return Err(SyncError::Listing { entity, page, source: e });
                    }
                },
            }
        }

        Ok(items)
    }

    /// Enrich listed items in fixed-size batches. A batch is persisted only if
    /// every request in it succeeds; otherwise the same batch is retried after
    /// a backoff, forever.
    async fn fetch_details(
        &self,
        entity: EntityType,
        items: &[Record],
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<usize, SyncError> {
        let total = items.len();
        let batches: Vec<&[Record]> = items.chunks(self.config.batch_size()).collect();
        let mut processed = 0;
        let mut consecutive_failures: u32 = 0;
        let mut index = 0;

        while index < batches.len() {
            let batch = batches[index];
            let requests = batch.iter().map(|item| self.fetch_one(entity, item));
            let results = guarded(cancel, futures::future::join_all(requests)).await?;

            let mut records = Vec::with_capacity(batch.len());
            let mut failed = 0;
            for result in results {
                match result {
                    Ok(record) => records.push(record),
                    Err(()) => failed += 1,
                }
            }

            if failed > 0 {
                consecutive_failures += 1;
                report.failed_batches += 1;
                let delay = self.config.retry_delay(consecutive_failures);
                warn!(
                    entity = %entity,
                    batch = index + 1,
                    failed,
                    consecutive_failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Detail batch failed, retrying"
                );
                self.publish(ProgressEvent::detail_retry(entity, processed, total, delay.as_millis() as u64));
                self.pause(delay, cancel).await?;
                continue;
            }

            consecutive_failures = 0;
            self.store.put(entity, &records)?;
            processed += batch.len();
            debug!(entity = %entity, batch = index + 1, of = batches.len(), processed, "Detail batch stored");
            self.publish(ProgressEvent::detail_progress(entity, processed, total));

            index += 1;
            if index < batches.len() {
                self.pause(self.config.batch_delay(), cancel).await?;
            }
        }

        Ok(processed)
    }

    async fn fetch_one(&self, entity: EntityType, item: &Record) -> Result<Record, ()> {
        match self.remote.fetch_detail(entity, &item.uid).await {
            Ok(mut record) => {
                if record.name.is_empty() {
                    record.name = item.name.clone();
                }
                if record.url().is_none() {
                    if let Some(url) = item.url() {
                        record = record.with("url", url);
                    }
                }
                Ok(record)
            }
            Err(e) => {
                warn!(entity = %entity, uid = %item.uid, error = %e, "Detail fetch failed");
                Err(())
            }
        }
    }

    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), SyncError> {
        if duration.is_zero() {
            return if cancel.is_cancelled() {
                Err(SyncError::Cancelled)
            } else {
                Ok(())
            };
        }
        guarded(cancel, tokio::time::sleep(duration)).await
    }
}

/// Run a future unless the token fires first.
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, SyncError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        output = fut => Ok(output),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{record_events, refs, FakeRemote, RecordingStore};

    fn orchestrator(
        remote: Arc<FakeRemote>,
        store: Arc<dyn EntityStore>,
        config: SyncConfig,
    ) -> (SyncOrchestrator, Arc<Mutex<Vec<ProgressEvent>>>) {
        let bus = Arc::new(ProgressBus::new());
        let events = record_events(&bus);
        (SyncOrchestrator::new(remote, store, bus, config), events)
    }

    fn fast() -> SyncConfig {
        SyncConfig::default().without_delays()
    }

    fn small_dataset() -> FakeRemote {
        FakeRemote::new()
            .listing(EntityType::Films, vec![refs(EntityType::Films, 1, 2)], None)
            .listing(EntityType::People, vec![refs(EntityType::People, 1, 3)], Some(3))
            .listing(EntityType::Planets, vec![refs(EntityType::Planets, 1, 1)], Some(1))
    }

    fn kinds(events: &Mutex<Vec<ProgressEvent>>) -> Vec<&'static str> {
        events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    fn retry_delays(events: &Mutex<Vec<ProgressEvent>>) -> Vec<u64> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::DetailProgress { retry_in_ms: Some(ms), .. } => Some(*ms),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_cached_dataset_skips_network() {
        let remote = Arc::new(FakeRemote::new());
        let store = Arc::new(MemoryStore::new());
        CacheController::new(store.clone()).mark_complete().unwrap();
        let (sync, events) = orchestrator(remote.clone(), store, fast());

        let report = sync.ensure_ready().await.unwrap();

        assert!(report.from_cache);
        assert_eq!(remote.total_calls(), 0);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], ProgressEvent::loaded_from_cache());
        assert_eq!(events[0].progress(), Some(100));
        assert_eq!(sync.state(), SyncState::Completed);
    }

    #[tokio::test]
    async fn test_full_sync_populates_every_table() {
        let remote = Arc::new(small_dataset());
        let store = Arc::new(MemoryStore::new());
        let (sync, events) = orchestrator(remote.clone(), store.clone(), fast());

        let report = sync.ensure_ready().await.unwrap();

        assert!(!report.from_cache);
        assert_eq!(report.total_records(), 6);
        assert!(sync.cache().is_complete().unwrap());
        assert_eq!(store.count(EntityType::Films).unwrap(), 2);
        assert_eq!(store.count(EntityType::People).unwrap(), 3);
        assert_eq!(store.count(EntityType::Planets).unwrap(), 1);
        assert_eq!(remote.detail_calls_for(EntityType::Films), 0);
        assert_eq!(remote.detail_calls_for(EntityType::People), 3);

        let luke = store.get(EntityType::People, "1").unwrap().unwrap();
        assert_eq!(luke.name, "people 1");
        assert_eq!(luke.properties["detailed"], true);

        let kinds = kinds(&events);
        assert_eq!(kinds.first(), Some(&"start"));
        assert_eq!(kinds.last(), Some(&"complete"));
        assert_eq!(kinds.iter().filter(|k| **k == "complete").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "entity_complete").count(), 6);
        assert_eq!(&kinds[1..6], &["entity_start", "list_progress", "entity_list_complete", "detail_skip", "entity_complete"]);
    }

    #[tokio::test]
    async fn test_entity_types_complete_in_order() {
        let remote = Arc::new(small_dataset());
        let (sync, events) = orchestrator(remote, Arc::new(MemoryStore::new()), fast());
        sync.ensure_ready().await.unwrap();

        let completed: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == "entity_complete")
            .filter_map(|e| e.entity())
            .collect();
        assert_eq!(completed, EntityType::SYNC_ORDER.to_vec());
    }

    #[tokio::test]
    async fn test_pages_fetched_sequentially_until_last() {
        let pages = vec![
            refs(EntityType::Planets, 1, 10),
            refs(EntityType::Planets, 11, 10),
            refs(EntityType::Planets, 21, 10),
            refs(EntityType::Planets, 31, 4),
        ];
        let remote = Arc::new(FakeRemote::new().listing(EntityType::Planets, pages, Some(34)));
        let (sync, _) = orchestrator(remote.clone(), Arc::new(MemoryStore::new()), fast());

        sync.ensure_ready().await.unwrap();

        let planet_pages: Vec<u32> = remote
            .list_calls()
            .into_iter()
            .filter(|(e, _)| *e == EntityType::Planets)
            .map(|(_, page)| page)
            .collect();
        assert_eq!(planet_pages, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_people_listing_progress_and_count() {
        let pages = vec![refs(EntityType::People, 1, 10), refs(EntityType::People, 11, 2)];
        let remote = Arc::new(FakeRemote::new().listing(EntityType::People, pages, Some(12)));
        let store = Arc::new(MemoryStore::new());
        let (sync, events) = orchestrator(remote, store.clone(), fast());

        sync.ensure_ready().await.unwrap();

        assert_eq!(store.count(EntityType::People).unwrap(), 12);
        let progress: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::ListProgress { entity: EntityType::People, loaded, total, .. } => Some((*loaded, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(10, Some(12)), (12, Some(12))]);
    }

    #[tokio::test]
    async fn test_listing_without_total_reports_no_percentage() {
        let remote = Arc::new(FakeRemote::new().listing(EntityType::Films, vec![refs(EntityType::Films, 1, 6)], None));
        let (sync, events) = orchestrator(remote, Arc::new(MemoryStore::new()), fast());
        sync.ensure_ready().await.unwrap();

        let events = events.lock().unwrap();
        let listed = events.iter().find(|e| e.kind() == "list_progress").unwrap();
        assert_eq!(listed.progress(), None);
        assert_eq!(listed.message(), "Listed 6 films");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_retried_and_persisted_once() {
        let remote = Arc::new(
            FakeRemote::new()
                .listing(EntityType::People, vec![refs(EntityType::People, 1, 10)], Some(10))
                .fail_detail(EntityType::People, "3", 1),
        );
        let store = Arc::new(RecordingStore::new());
        let (sync, events) = orchestrator(remote.clone(), store.clone(), SyncConfig::default());

        let report = sync.ensure_ready().await.unwrap();

        assert_eq!(store.puts_for(EntityType::People).len(), 1);
        assert_eq!(store.puts_for(EntityType::People)[0].len(), 10);
        assert_eq!(remote.detail_calls_for(EntityType::People), 20);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(retry_delays(&events), vec![10_000]);

        let people_progress: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::DetailProgress { entity: EntityType::People, processed, failed, .. } => Some((*processed, *failed)),
                _ => None,
            })
            .collect();
        assert_eq!(people_progress, vec![(0, true), (10, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_escalates_then_resets() {
        let remote = Arc::new(
            FakeRemote::new()
                .listing(
                    EntityType::Vehicles,
                    vec![refs(EntityType::Vehicles, 1, 10), refs(EntityType::Vehicles, 11, 10)],
                    Some(20),
                )
                .fail_detail(EntityType::Vehicles, "2", 3)
                .fail_detail(EntityType::Vehicles, "15", 1),
        );
        let store = Arc::new(RecordingStore::new());
        let (sync, events) = orchestrator(remote, store.clone(), SyncConfig::default());

        let started = Instant::now();
        sync.ensure_ready().await.unwrap();

        // Three consecutive failures: base, base, base + escalation. The later
        // isolated failure starts from a reset counter.
        assert_eq!(retry_delays(&events), vec![10_000, 10_000, 30_000, 10_000]);
        assert_eq!(store.puts_for(EntityType::Vehicles).len(), 2);

        // Retry pauses plus one inter-batch pause for vehicles.
        assert!(started.elapsed() >= Duration::from_millis(60_000 + 4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_bound_concurrency() {
        let remote = Arc::new(
            FakeRemote::new()
                .with_latency(Duration::from_millis(200))
                .listing(EntityType::Species, vec![refs(EntityType::Species, 1, 7)], Some(7)),
        );
        let store = Arc::new(RecordingStore::new());
        let config = SyncConfig {
            batch_size: 3,
            ..SyncConfig::default()
        };
        let (sync, _) = orchestrator(remote.clone(), store.clone(), config);

        sync.ensure_ready().await.unwrap();

        assert_eq!(remote.max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 3);
        let batches = store.puts_for(EntityType::Species);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let remote = Arc::new(small_dataset().with_latency(Duration::from_millis(20)));
        let (sync, events) = orchestrator(remote.clone(), Arc::new(MemoryStore::new()), fast());

        let (a, b, c) = tokio::join!(sync.ensure_ready(), sync.ensure_ready(), sync.ensure_ready());

        let a = a.unwrap();
        assert_eq!(b.unwrap(), a);
        assert_eq!(c.unwrap(), a);
        assert_eq!(remote.detail_calls_for(EntityType::People), 3);
        let film_pages = remote.list_calls().iter().filter(|(e, _)| *e == EntityType::Films).count();
        assert_eq!(film_pages, 1);
        assert_eq!(kinds(&events).iter().filter(|k| **k == "start").count(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_truncates_by_default() {
        let pages = vec![refs(EntityType::Planets, 1, 10), refs(EntityType::Planets, 11, 10)];
        let remote = Arc::new(
            FakeRemote::new()
                .listing(EntityType::Planets, pages, Some(20))
                .fail_page(EntityType::Planets, 2),
        );
        let store = Arc::new(MemoryStore::new());
        let (sync, _) = orchestrator(remote, store.clone(), fast());

        sync.ensure_ready().await.unwrap();

        assert_eq!(store.count(EntityType::Planets).unwrap(), 10);
        assert!(sync.cache().is_complete().unwrap());
    }

    #[tokio::test]
    async fn test_listing_failure_can_fail_the_sync() {
        let remote = Arc::new(
            FakeRemote::new()
                .listing(EntityType::People, vec![refs(EntityType::People, 1, 10)], Some(10))
                .fail_page(EntityType::Planets, 1),
        );
        let store = Arc::new(MemoryStore::new());
        let config = SyncConfig {
            listing_failure: ListingFailurePolicy::Fail,
            ..fast()
        };
        let (sync, events) = orchestrator(remote, store.clone(), config);

        let err = sync.ensure_ready().await.unwrap_err();

        assert!(matches!(*err, SyncError::Listing { entity: EntityType::Planets, page: 1, .. }));
        assert!(!sync.cache().is_complete().unwrap());
        assert_eq!(sync.state(), SyncState::Failed);
        // People persisted before the failure stay in the store.
        assert_eq!(store.count(EntityType::People).unwrap(), 10);
        let kinds = kinds(&events);
        assert_eq!(kinds.last(), Some(&"error"));
        assert!(!kinds.contains(&"complete"));
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_run() {
        let remote = Arc::new(small_dataset());
        let store = Arc::new(RecordingStore::new());
        store.fail_put_for(EntityType::Planets);
        let (sync, events) = orchestrator(remote, store.clone(), fast());

        let err = sync.ensure_ready().await.unwrap_err();

        assert!(matches!(*err, SyncError::Store(_)));
        assert!(!sync.cache().is_complete().unwrap());
        assert_eq!(store.count(EntityType::People).unwrap(), 3);
        let events = events.lock().unwrap();
        match events.last() {
            Some(ProgressEvent::Error { message }) => assert!(message.contains("injected failure")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cache_check_failure_aborts_run() {
        let remote = Arc::new(small_dataset());
        let store = Arc::new(RecordingStore::new());
        store.fail_meta();
        let (sync, events) = orchestrator(remote.clone(), store, fast());

        assert!(sync.ensure_ready().await.is_err());
        assert_eq!(remote.total_calls(), 0);
        assert_eq!(kinds(&events), vec!["error"]);
    }

    #[tokio::test]
    async fn test_failed_run_is_retried_on_next_call() {
        let remote = Arc::new(small_dataset());
        let store = Arc::new(RecordingStore::new());
        store.fail_meta();
        let (sync, _) = orchestrator(remote.clone(), store.clone(), fast());

        assert!(sync.ensure_ready().await.is_err());
        assert_eq!(sync.state(), SyncState::Failed);

        store.heal();
        let report = sync.ensure_ready().await.unwrap();
        assert!(!report.from_cache);
        assert_eq!(remote.detail_calls_for(EntityType::People), 3);

        let again = sync.ensure_ready().await.unwrap();
        assert!(again.from_cache);
        assert_eq!(remote.detail_calls_for(EntityType::People), 3);
    }

    /// Record the orchestrator state seen by observers of terminal events.
    fn states_at_terminal_events(sync: &SyncOrchestrator) -> Arc<Mutex<Vec<SyncState>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let state = sync.subscribe_state();
        sync.bus().subscribe(move |event| {
            if event.is_terminal() {
                sink.lock().unwrap().push(*state.borrow());
            }
            Ok(())
        });
        seen
    }

    #[tokio::test]
    async fn test_terminal_state_set_after_terminal_event() {
        let store = Arc::new(RecordingStore::new());
        let (sync, events) = orchestrator(Arc::new(small_dataset()), store.clone(), fast());
        let seen = states_at_terminal_events(&sync);

        sync.ensure_ready().await.unwrap();
        assert!(sync.ensure_ready().await.unwrap().from_cache);
        store.fail_meta();
        assert!(sync.ensure_ready().await.is_err());

        // While each terminal event is delivered the run still counts as in
        // flight, so a caller arriving then attaches instead of starting over.
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|state| !state.is_terminal()), "{seen:?}");
        assert_eq!(sync.state(), SyncState::Failed);
        assert_eq!(kinds(&events).iter().filter(|k| **k == "start").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_endless_retries() {
        let remote = Arc::new(
            FakeRemote::new()
                .listing(EntityType::People, vec![refs(EntityType::People, 1, 2)], Some(2))
                .fail_detail(EntityType::People, "2", u32::MAX),
        );
        let (sync, events) = orchestrator(remote, Arc::new(MemoryStore::new()), SyncConfig::default());
        let sync = Arc::new(sync);

        let runner = {
            let sync = Arc::clone(&sync);
            tokio::spawn(async move { sync.ensure_ready().await })
        };

        let mut state = sync.subscribe_state();
        state
            .wait_for(|s| *s == SyncState::DetailFetching(EntityType::People))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(sync.cancel());

        let err = runner.await.unwrap().unwrap_err();
        assert!(matches!(*err, SyncError::Cancelled));
        assert_eq!(sync.state(), SyncState::Failed);
        assert!(!sync.cancel());
        assert!(retry_delays(&events).len() >= 3);
    }
}
