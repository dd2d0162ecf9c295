//! Metadata table: object id → placement record
//!
//! The table lives in memory behind a `RwLock`. Every mutation is handed to the
//! persistence collaborator while the write lock is held; if persisting fails
//! the mutation is rolled back so memory never runs ahead of disk.

use crate::common::{Error, Result};
use crate::master::persistence::{MetadataPersistence, MetadataTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One replica of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlacement {
    pub chunk_index: u64,
    /// 0 = primary, 1+ = secondary replicas
    pub replica_index: usize,
    pub chunkserver_endpoint: String,
}

/// Placement record for a stored object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: String,
    pub size: u64,
    pub chunks: Vec<ChunkPlacement>,
    pub created_at: DateTime<Utc>,
}

impl ObjectRecord {
    pub fn new(id: impl Into<String>, size: u64, chunks: Vec<ChunkPlacement>) -> Self {
        Self {
            id: id.into(),
            size,
            chunks,
            created_at: Utc::now(),
        }
    }

    /// Number of distinct chunk indices
    pub fn unique_chunks(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.chunk_index)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Total replica instances across all chunks
    pub fn replica_count(&self) -> usize {
        self.chunks.len()
    }

    /// Replicas actually assigned per chunk (0 for an empty object)
    pub fn replication_observed(&self) -> usize {
        self.chunks.iter().filter(|c| c.chunk_index == 0).count()
    }
}

/// Metadata store
pub struct MetadataStore {
    table: RwLock<MetadataTable>,
    persistence: Arc<dyn MetadataPersistence>,
    allow_overwrite: bool,
}

impl MetadataStore {
    /// Load the table through the persistence collaborator.
    ///
    /// A failed load is fatal: the master must not serve a table it could not read.
    pub fn load(persistence: Arc<dyn MetadataPersistence>, allow_overwrite: bool) -> Result<Self> {
        let table = persistence.load()?;
        tracing::info!("Loaded metadata for {} objects", table.len());

        Ok(Self {
            table: RwLock::new(table),
            persistence,
            allow_overwrite,
        })
    }

    fn read_table(&self) -> RwLockReadGuard<'_, MetadataTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, MetadataTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Plan an object and store its record.
    ///
    /// `plan` runs under the table's write lock, so the record that gets
    /// persisted is exactly the one produced for this call.
    pub fn plan_and_store<F>(&self, object_id: &str, size: u64, plan: F) -> Result<ObjectRecord>
    where
        F: FnOnce() -> Result<Vec<ChunkPlacement>>,
    {
        let mut table = self.write_table();

        if !self.allow_overwrite && table.contains_key(object_id) {
            return Err(Error::AlreadyExists(object_id.to_string()));
        }

        let record = ObjectRecord::new(object_id, size, plan()?);
        let previous = table.insert(object_id.to_string(), record.clone());

        if let Err(e) = self.persistence.save(&table) {
            match previous {
                Some(prev) => {
                    table.insert(object_id.to_string(), prev);
                }
                None => {
                    table.remove(object_id);
                }
            }
            tracing::error!("Failed to persist plan for {}: {}", object_id, e);
            return Err(e);
        }

        if let Some(prev) = previous {
            tracing::warn!(
                object_id = %object_id,
                previous_chunks = prev.chunks.len(),
                "Replaced existing placement record"
            );
        }

        Ok(record)
    }

    /// Get a record
    pub fn get(&self, object_id: &str) -> Result<ObjectRecord> {
        self.read_table()
            .get(object_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(object_id.to_string()))
    }

    /// Remove a record, returning it so the caller can clean up its replicas.
    ///
    /// `Ok(None)` means the id was not present; nothing is persisted then.
    pub fn remove(&self, object_id: &str) -> Result<Option<ObjectRecord>> {
        let mut table = self.write_table();

        let Some(record) = table.remove(object_id) else {
            return Ok(None);
        };

        if let Err(e) = self.persistence.remove_and_save(object_id, &table) {
            table.insert(object_id.to_string(), record);
            tracing::error!("Failed to persist removal of {}: {}", object_id, e);
            return Err(e);
        }

        Ok(Some(record))
    }

    /// Snapshot of all records (unordered)
    pub fn list(&self) -> Vec<ObjectRecord> {
        self.read_table().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_table().is_empty()
    }
}
