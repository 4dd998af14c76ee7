use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::models::{EntityType, Record};

use super::{EntityStore, MetaEntry, StoreError};

#[derive(Default)]
struct Tables {
    entities: HashMap<EntityType, BTreeMap<String, Record>>,
    meta: BTreeMap<String, MetaEntry>,
}

/// In-process store. Nothing survives a restart; used for ephemeral sessions
/// and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, entity: EntityType, uid: &str) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables
            .entities
            .get(&entity)
            .and_then(|table| table.get(uid))
            .cloned())
    }

    fn get_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables
            .entities
            .get(&entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    fn put(&self, entity: EntityType, records: &[Record]) -> Result<(), StoreError> {
        let mut tables = self.tables.write()?;
        let table = tables.entities.entry(entity).or_default();
        for record in records {
            table.insert(record.uid.clone(), record.clone());
        }
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<MetaEntry>, StoreError> {
        Ok(self.tables.read()?.meta.get(key).cloned())
    }

    fn put_meta(&self, entry: MetaEntry) -> Result<(), StoreError> {
        self.tables.write()?.meta.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut tables = self.tables.write()?;
        tables.entities.clear();
        tables.meta.clear();
        Ok(())
    }

    fn count(&self, entity: EntityType) -> Result<usize, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables.entities.get(&entity).map(BTreeMap::len).unwrap_or(0))
    }
}
