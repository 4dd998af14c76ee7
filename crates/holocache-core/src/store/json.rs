use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{EntityType, Record};

use super::{EntityStore, MetaEntry, StoreError};

/// Name of the metadata table file.
const META_TABLE: &str = "meta";

/// On-disk envelope for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

/// File-backed store: one pretty-printed JSON document per table in the cache
/// directory.
///
/// Writes go to a temporary sibling file which is then renamed over the table,
/// so readers always see a complete table. Writers are serialized by a lock to
/// keep the read-modify-write of an upsert atomic.
pub struct JsonFileStore {
    cache_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| StoreError::io(&cache_dir.display().to_string(), e))?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>, StoreError> {
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| StoreError::io(name, e))?;

        let cached: CachedData<T> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
                table: name.to_string(),
                source,
            })?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<(), StoreError> {
        let cached = CachedData::new(data);
        let contents =
            serde_json::to_string_pretty(&cached).map_err(|source| StoreError::Serialize {
                table: name.to_string(),
                source,
            })?;

        let path = self.table_path(name);
        let tmp = self.cache_dir.join(format!(".{}.json.tmp", name));
        std::fs::write(&tmp, contents).map_err(|e| StoreError::io(name, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(name, e))?;
        Ok(())
    }

    fn load_table(&self, entity: EntityType) -> Result<BTreeMap<String, Record>, StoreError> {
        Ok(self
            .load(entity.as_str())?
            .map(|cached| cached.data)
            .unwrap_or_default())
    }

    fn load_meta(&self) -> Result<BTreeMap<String, MetaEntry>, StoreError> {
        Ok(self
            .load(META_TABLE)?
            .map(|cached| cached.data)
            .unwrap_or_default())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.table_path(name);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| StoreError::io(name, e))?;
        }
        Ok(())
    }
}

impl EntityStore for JsonFileStore {
    fn get(&self, entity: EntityType, uid: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.load_table(entity)?.remove(uid))
    }

    fn get_all(&self, entity: EntityType) -> Result<Vec<Record>, StoreError> {
        Ok(self.load_table(entity)?.into_values().collect())
    }

    fn put(&self, entity: EntityType, records: &[Record]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock()?;
        let mut table = self.load_table(entity)?;
        for record in records {
            table.insert(record.uid.clone(), record.clone());
        }
        self.save(entity.as_str(), &table)?;
        debug!(table = %entity, written = records.len(), total = table.len(), "Table saved");
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<MetaEntry>, StoreError> {
        Ok(self.load_meta()?.remove(key))
    }

    fn put_meta(&self, entry: MetaEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock()?;
        let mut meta = self.load_meta()?;
        meta.insert(entry.key.clone(), entry);
        self.save(META_TABLE, &meta)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock()?;
        // Metadata first: a failure part way through must not leave the
        // completion flag standing over missing tables.
        self.remove(META_TABLE)?;
        for entity in EntityType::SYNC_ORDER {
            self.remove(entity.as_str())?;
        }
        debug!(dir = %self.cache_dir.display(), "All tables cleared");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
