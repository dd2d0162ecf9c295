//! Master service: wires planning, membership, metadata and fan-out together

use crate::common::{validate_endpoint, validate_object_id, MasterConfig, Result};
use crate::master::chunkserver_client::ChunkserverClient;
use crate::master::fanout::{FanoutReport, ReplicaFanout};
use crate::master::metadata::{MetadataStore, ObjectRecord};
use crate::master::persistence::{MetadataPersistence, PersistenceStats};
use crate::master::placement::PlacementManager;
use crate::master::registry::{ChunkserverRegistry, HealthReport};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health report plus how many objects are tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    #[serde(flatten)]
    pub report: HealthReport,
    pub files_in_memory: usize,
}

/// Aggregate cluster statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStats {
    pub total_files: usize,
    pub total_chunkservers: usize,
    pub chunkservers: Vec<String>,
    pub chunk_size_bytes: u64,
    pub replication_factor: usize,
    pub total_storage_used: u64,
    pub total_unique_chunks: u64,
    pub total_replicas: u64,
    pub replication_efficiency: f64,
    pub health_status: ClusterHealth,
    pub persistence_stats: PersistenceStats,
}

pub struct MasterService {
    placement: PlacementManager,
    registry: ChunkserverRegistry,
    metadata: MetadataStore,
    fanout: ReplicaFanout,
    persistence: Arc<dyn MetadataPersistence>,
    max_chunks_per_object: u64,
}

impl MasterService {
    /// Build the service, loading the metadata table and registering the
    /// configured chunkservers.
    pub fn new(
        config: &MasterConfig,
        persistence: Arc<dyn MetadataPersistence>,
        client: Arc<dyn ChunkserverClient>,
    ) -> Result<Self> {
        config.validate()?;

        let metadata = MetadataStore::load(persistence.clone(), config.allow_overwrite)?;

        let registry = ChunkserverRegistry::new();
        for endpoint in &config.chunkservers {
            validate_endpoint(endpoint).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            registry.register(endpoint);
        }

        Ok(Self {
            placement: PlacementManager::new(config.chunk_size_bytes, config.replication_factor),
            registry,
            metadata,
            fanout: ReplicaFanout::new(client, config.fanout_concurrency),
            persistence,
            max_chunks_per_object: config.max_chunks_per_object,
        })
    }

    pub fn replication_factor(&self) -> usize {
        self.placement.replication_factor()
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        self.placement.chunk_size_bytes()
    }

    /// Decide chunk placement for an object and record it.
    pub fn plan_upload(&self, object_id: &str, size_bytes: u64) -> Result<ObjectRecord> {
        validate_object_id(object_id)?;

        let chunk_count = self.placement.chunk_count(size_bytes);
        if chunk_count > self.max_chunks_per_object {
            return Err(Error::InvalidRequest(format!(
                "object of {} bytes needs {} chunks, limit is {}",
                size_bytes, chunk_count, self.max_chunks_per_object
            )));
        }

        let record = self.metadata.plan_and_store(object_id, size_bytes, || {
            self.registry.draw_placements(&self.placement, size_bytes)
        })?;

        tracing::info!(
            object_id = %object_id,
            size_bytes,
            chunks = record.unique_chunks(),
            replicas_per_chunk = record.replication_observed(),
            "Planned upload"
        );
        Ok(record)
    }

    pub fn get_metadata(&self, object_id: &str) -> Result<ObjectRecord> {
        let record = self.metadata.get(object_id)?;
        tracing::debug!(
            "Fetched metadata for {} ({} replicas)",
            object_id,
            record.chunks.len()
        );
        Ok(record)
    }

    /// Remove an object's record, then delete its replicas.
    ///
    /// The record is gone once this returns `Ok`, whatever the per-replica
    /// outcome; failed replicas are only reported.
    pub async fn delete_file(&self, object_id: &str) -> Result<FanoutReport> {
        let record = self
            .metadata
            .remove(object_id)?
            .ok_or_else(|| Error::NotFound(object_id.to_string()))?;

        let report = self.fanout.delete_all_replicas(&record).await;

        tracing::info!(
            object_id = %object_id,
            deleted = report.deleted,
            failed = report.failed,
            "Deleted object"
        );
        Ok(report)
    }

    pub fn list_files(&self) -> Vec<ObjectRecord> {
        self.metadata.list()
    }

    /// Returns whether membership changed
    pub fn register_chunkserver(&self, endpoint: &str) -> Result<bool> {
        validate_endpoint(endpoint)?;
        Ok(self.registry.register(endpoint))
    }

    /// Returns whether membership changed
    pub fn unregister_chunkserver(&self, endpoint: &str) -> bool {
        self.registry.unregister(endpoint)
    }

    pub fn list_chunkservers(&self) -> Vec<String> {
        self.registry.snapshot()
    }

    pub fn get_health_status(&self) -> ClusterHealth {
        ClusterHealth {
            report: self.registry.health_status(self.replication_factor()),
            files_in_memory: self.metadata.len(),
        }
    }

    pub fn get_stats(&self) -> ClusterStats {
        let files = self.metadata.list();
        let chunkservers = self.registry.snapshot();

        let mut total_storage_used = 0u64;
        let mut total_unique_chunks = 0u64;
        let mut total_replicas = 0u64;
        for record in &files {
            total_storage_used += record.size;
            total_unique_chunks += record.unique_chunks() as u64;
            total_replicas += record.replica_count() as u64;
        }

        let replication_efficiency = if total_unique_chunks > 0 {
            total_replicas as f64 / total_unique_chunks as f64
        } else {
            0.0
        };

        ClusterStats {
            total_files: files.len(),
            total_chunkservers: chunkservers.len(),
            chunkservers,
            chunk_size_bytes: self.chunk_size_bytes(),
            replication_factor: self.replication_factor(),
            total_storage_used,
            total_unique_chunks,
            total_replicas,
            replication_efficiency,
            health_status: self.get_health_status(),
            persistence_stats: self.persistence.storage_stats(),
        }
    }
}
