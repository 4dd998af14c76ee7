//! Scripted fakes shared by the crate's tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiError, ListPage, RemoteSource};
use crate::models::{EntityType, Record};
use crate::progress::{ProgressBus, ProgressEvent};
use crate::store::{EntityStore, MemoryStore, MetaEntry, StoreError};

pub(crate) const BASE: &str = "https://www.swapi.tech/api";

pub(crate) fn url(entity: EntityType, uid: &str) -> String {
    format!("{}/{}/{}", BASE, entity, uid)
}

/// Lightweight listing entries `first..first+count` for a type.
pub(crate) fn refs(entity: EntityType, first: usize, count: usize) -> Vec<Record> {
    (first..first + count)
        .map(|n| {
            let uid = n.to_string();
            Record::new(uid.clone(), format!("{} {}", entity, n)).with("url", url(entity, &uid))
        })
        .collect()
}

#[derive(Default)]
struct Listing {
    pages: Vec<Vec<Record>>,
    total: Option<usize>,
    failing_pages: HashSet<u32>,
}

/// A remote that serves scripted listings and details and records every call.
#[derive(Default)]
pub(crate) struct FakeRemote {
    listings: Mutex<HashMap<EntityType, Listing>>,
    /// Remaining failures per (type, uid); `u32::MAX` fails forever.
    detail_failures: Mutex<HashMap<(EntityType, String), u32>>,
    detail_latency: Duration,
    pub list_calls: Mutex<Vec<(EntityType, u32)>>,
    pub detail_calls: Mutex<Vec<(EntityType, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.detail_latency = latency;
        self
    }

    pub fn listing(self, entity: EntityType, pages: Vec<Vec<Record>>, total: Option<usize>) -> Self {
        self.listings.lock().unwrap().insert(
            entity,
            Listing {
                pages,
                total,
                failing_pages: HashSet::new(),
            },
        );
        self
    }

    pub fn fail_page(self, entity: EntityType, page: u32) -> Self {
        self.listings
            .lock()
            .unwrap()
            .entry(entity)
            .or_default()
            .failing_pages
            .insert(page);
        self
    }

    pub fn fail_detail(self, entity: EntityType, uid: &str, times: u32) -> Self {
        self.detail_failures
            .lock()
            .unwrap()
            .insert((entity, uid.to_string()), times);
        self
    }

    pub fn list_calls(&self) -> Vec<(EntityType, u32)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn detail_calls_for(&self, entity: EntityType) -> usize {
        self.detail_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == entity)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls.lock().unwrap().len() + self.detail_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn fetch_list(&self, entity: EntityType, page: u32) -> Result<ListPage, ApiError> {
        self.list_calls.lock().unwrap().push((entity, page));
        let listings = self.listings.lock().unwrap();
        let Some(listing) = listings.get(&entity) else {
            return Ok(ListPage::default());
        };
        if listing.failing_pages.contains(&page) {
            return Err(ApiError::ServerError(format!("{} page {} unavailable", entity, page)));
        }
        let index = page as usize - 1;
        Ok(ListPage {
            items: listing.pages.get(index).cloned().unwrap_or_default(),
            has_next: index + 1 < listing.pages.len(),
            total_count: listing.total,
        })
    }

    async fn fetch_detail(&self, entity: EntityType, uid: &str) -> Result<Record, ApiError> {
        self.detail_calls.lock().unwrap().push((entity, uid.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.detail_latency.is_zero() {
            tokio::time::sleep(self.detail_latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut failures = self.detail_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&(entity, uid.to_string())) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    return Err(ApiError::ServerError(format!("{} {} unavailable", entity, uid)));
                }
            }
        }

        Ok(Record::new(uid, "")
            .with("url", url(entity, uid))
            .with("detailed", true))
    }
}

/// Wraps a `MemoryStore`, recording writes and failing on demand.
#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    pub puts: Mutex<Vec<(EntityType, Vec<String>)>>,
    fail_put: Mutex<HashSet<EntityType>>,
    fail_meta: Mutex<bool>,
    fail_reads: Mutex<bool>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_put_for(&self, entity: EntityType) {
        self.fail_put.lock().unwrap().insert(entity);
    }

    pub fn fail_meta(&self) {
        *self.fail_meta.lock().unwrap() = true;
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    /// Drop every injected failure.
    pub fn heal(&self) {
        self.fail_put.lock().unwrap().clear();
        *self.fail_meta.lock().unwrap() = false;
        *self.fail_reads.lock().unwrap() = false;
    }

    pub fn puts_for(&self, entity: EntityType) -> Vec<Vec<String>> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == entity)
            .map(|(_, uids)| uids.clone())
            .collect()
    }

    fn injected(table: &str) -> StoreError {
        StoreError::io(table, std::io::Error::other("injected failure"))
    }
}

impl EntityStore for RecordingStore {
    fn get(&self, entity: EntityType, uid: &str) -> Result<Option<Record>, StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(Self::injected(entity.as_str()));
        }
        self.inner.get(entity, uid)
    }

    fn get_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(Self::injected(entity.as_str()));
        }
        self.inner.get_all(entity)
    }

    fn put(&self, entity: EntityType, records: &[Record]) -> Result<(), StoreError> {
        if self.fail_put.lock().unwrap().contains(&entity) {
            return Err(Self::injected(entity.as_str()));
        }
        self.puts
            .lock()
            .unwrap()
            .push((entity, records.iter().map(|r| r.uid.clone()).collect()));
        self.inner.put(entity, records)
    }

    fn get_meta(&self, key: &str) -> Result<Option<MetaEntry>, StoreError> {
        if *self.fail_meta.lock().unwrap() {
            return Err(Self::injected("meta"));
        }
        self.inner.get_meta(key)
    }

    fn put_meta(&self, entry: MetaEntry) -> Result<(), StoreError> {
        self.inner.put_meta(entry)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}

/// Collect every published event.
pub(crate) fn record_events(bus: &ProgressBus) -> Arc<Mutex<Vec<ProgressEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    bus.subscribe(move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    events
}
