//! Per-replica operations across chunkservers
//!
//! Deleting an object touches every replica of every chunk. Each call stands on
//! its own: failures are counted and logged, the remaining calls still run, and
//! nothing here can fail the delete as a whole.

use crate::master::chunkserver_client::ChunkserverClient;
use crate::master::metadata::{ChunkPlacement, ObjectRecord};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One replica that could not be deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaFailure {
    pub chunk_index: u64,
    pub replica_index: usize,
    pub chunkserver_endpoint: String,
    pub reason: String,
}

/// Outcome of a delete fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutReport {
    #[serde(rename = "deleted_replica_count")]
    pub deleted: usize,
    #[serde(rename = "failed_replica_count")]
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ReplicaFailure>,
}

/// Issues delete-chunk to every replica location of an object
pub struct ReplicaFanout {
    client: Arc<dyn ChunkserverClient>,
    /// Maximum calls in flight at once
    concurrency: usize,
}

impl ReplicaFanout {
    pub fn new(client: Arc<dyn ChunkserverClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Attempt every replica once; never aborts early.
    pub async fn delete_all_replicas(&self, record: &ObjectRecord) -> FanoutReport {
        // One boxed call per replica, built before the stream is polled.
        let calls: Vec<BoxFuture<'_, (&ChunkPlacement, crate::Result<()>)>> = record
            .chunks
            .iter()
            .map(|placement| {
                let call = self.client.delete_chunk(
                    &placement.chunkserver_endpoint,
                    &record.id,
                    placement.chunk_index,
                );
                async move { (placement, call.await) }.boxed()
            })
            .collect();

        let outcomes: Vec<(&ChunkPlacement, crate::Result<()>)> = stream::iter(calls)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = FanoutReport::default();
        for (placement, outcome) in outcomes {
            match outcome {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(
                        object_id = %record.id,
                        chunk_index = placement.chunk_index,
                        replica_index = placement.replica_index,
                        endpoint = %placement.chunkserver_endpoint,
                        "Replica delete failed: {}",
                        e
                    );
                    report.failed += 1;
                    report.failures.push(ReplicaFailure {
                        chunk_index: placement.chunk_index,
                        replica_index: placement.replica_index,
                        chunkserver_endpoint: placement.chunkserver_endpoint.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
            .failures
            .sort_by_key(|f| (f.chunk_index, f.replica_index));

        tracing::info!(
            object_id = %record.id,
            deleted = report.deleted,
            failed = report.failed,
            "Replica fan-out finished"
        );
        report
    }
}
