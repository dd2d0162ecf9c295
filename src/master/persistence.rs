//! Durable storage for the metadata table
//!
//! The master treats persistence as an opaque, blocking collaborator with a
//! three-call contract: load the whole table, save the whole table, and remove
//! one object then save. Backends:
//! - `JsonFilePersistence`: the table as one JSON document, replaced atomically
//! - `MemoryPersistence`: keeps the last saved table in memory
//! - `SledPersistence`: one sled entry per object (feature `sled-backend`)

use crate::common::{Error, Result};
use crate::master::metadata::ObjectRecord;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// The full metadata table, keyed by object id
pub type MetadataTable = HashMap<String, ObjectRecord>;

/// What a backend reports about itself for stats endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistenceStats {
    pub backend: String,
    pub location: Option<String>,
    pub stored_objects: usize,
    pub bytes_on_disk: u64,
}

/// Trait for metadata persistence backends
pub trait MetadataPersistence: Send + Sync {
    fn load(&self) -> Result<MetadataTable>;
    fn save(&self, table: &MetadataTable) -> Result<()>;
    fn remove_and_save(&self, object_id: &str, table: &MetadataTable) -> Result<()>;
    fn storage_stats(&self) -> PersistenceStats;
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Persistence(format!("{} {}: {}", action, path.display(), e))
}

/// Whole-table JSON file
pub struct JsonFilePersistence {
    path: PathBuf,
    stored: AtomicUsize,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stored: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "metadata.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_table(&self, table: &MetadataTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_failure("create", parent, e))?;
            }
        }

        let bytes = serde_json::to_vec_pretty(table)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes).map_err(|e| io_failure("write", &tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_failure("rename", &self.path, e))?;

        self.stored.store(table.len(), Ordering::Relaxed);
        Ok(())
    }
}

impl MetadataPersistence for JsonFilePersistence {
    fn load(&self) -> Result<MetadataTable> {
        if !self.path.exists() {
            tracing::info!(
                "No metadata file at {}, starting empty",
                self.path.display()
            );
            return Ok(MetadataTable::new());
        }

        let bytes = fs::read(&self.path).map_err(|e| io_failure("read", &self.path, e))?;
        let table: MetadataTable = serde_json::from_slice(&bytes)?;
        self.stored.store(table.len(), Ordering::Relaxed);
        Ok(table)
    }

    fn save(&self, table: &MetadataTable) -> Result<()> {
        self.write_table(table)?;
        tracing::debug!("Saved {} records to {}", table.len(), self.path.display());
        Ok(())
    }

    fn remove_and_save(&self, object_id: &str, table: &MetadataTable) -> Result<()> {
        self.write_table(table)?;
        tracing::debug!("Removed {} from {}", object_id, self.path.display());
        Ok(())
    }

    fn storage_stats(&self) -> PersistenceStats {
        PersistenceStats {
            backend: "json".to_string(),
            location: Some(self.path.display().to_string()),
            stored_objects: self.stored.load(Ordering::Relaxed),
            bytes_on_disk: fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }
}

/// In-memory store (nothing survives a restart)
#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<MetadataTable>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing table, as if it had been saved earlier
    pub fn with_table(table: MetadataTable) -> Self {
        Self {
            saved: Mutex::new(table),
        }
    }

    /// Copy of the last saved table
    pub fn stored(&self) -> MetadataTable {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MetadataPersistence for MemoryPersistence {
    fn load(&self) -> Result<MetadataTable> {
        Ok(self.stored())
    }

    fn save(&self, table: &MetadataTable) -> Result<()> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = table.clone();
        Ok(())
    }

    fn remove_and_save(&self, _object_id: &str, table: &MetadataTable) -> Result<()> {
        self.save(table)
    }

    fn storage_stats(&self) -> PersistenceStats {
        PersistenceStats {
            backend: "memory".to_string(),
            location: None,
            stored_objects: self.saved.lock().unwrap_or_else(|e| e.into_inner()).len(),
            bytes_on_disk: 0,
        }
    }
}

/// Sled store
#[cfg(feature = "sled-backend")]
pub struct SledPersistence {
    db: sled::Db,
    path: PathBuf,
}

#[cfg(feature = "sled-backend")]
fn sled_failure(e: sled::Error) -> Error {
    Error::Persistence(format!("sled error: {}", e))
}

#[cfg(feature = "sled-backend")]
impl SledPersistence {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let db = sled::open(&path).map_err(sled_failure)?;
        Ok(Self { db, path })
    }

    fn encode(record: &ObjectRecord) -> Result<Vec<u8>> {
        bincode::serialize(record)
            .map_err(|e| Error::Persistence(format!("Serialize error: {}", e)))
    }
}

#[cfg(feature = "sled-backend")]
impl MetadataPersistence for SledPersistence {
    fn load(&self) -> Result<MetadataTable> {
        let mut table = MetadataTable::new();
        for item in self.db.iter() {
            let (_, value) = item.map_err(sled_failure)?;
            let record: ObjectRecord = bincode::deserialize(&value)
                .map_err(|e| Error::Persistence(format!("Metadata corrupted: {}", e)))?;
            table.insert(record.id.clone(), record);
        }
        Ok(table)
    }

    fn save(&self, table: &MetadataTable) -> Result<()> {
        let mut batch = sled::Batch::default();

        for item in self.db.iter().keys() {
            let key = item.map_err(sled_failure)?;
            let stale = std::str::from_utf8(&key)
                .map(|id| !table.contains_key(id))
                .unwrap_or(true);
            if stale {
                batch.remove(key);
            }
        }
        for (id, record) in table {
            batch.insert(id.as_bytes(), Self::encode(record)?);
        }

        self.db.apply_batch(batch).map_err(sled_failure)?;
        self.db.flush().map_err(sled_failure)?;
        Ok(())
    }

    fn remove_and_save(&self, object_id: &str, _table: &MetadataTable) -> Result<()> {
        self.db.remove(object_id.as_bytes()).map_err(sled_failure)?;
        self.db.flush().map_err(sled_failure)?;
        Ok(())
    }

    fn storage_stats(&self) -> PersistenceStats {
        PersistenceStats {
            backend: "sled".to_string(),
            location: Some(self.path.display().to_string()),
            stored_objects: self.db.len(),
            bytes_on_disk: self.db.size_on_disk().unwrap_or(0),
        }
    }
}
