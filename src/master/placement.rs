//! Chunk planning and replica selection
//!
//! Objects are split into fixed-size chunks; each chunk gets an ordered replica
//! set drawn round-robin from a snapshot of the chunkserver registry. Replica 0
//! is the nominal primary.

use crate::common::{Error, Result};
use crate::master::metadata::ChunkPlacement;

/// Number of chunks needed to cover `size_bytes`. Zero bytes means zero chunks.
pub fn compute_chunk_count(size_bytes: u64, chunk_size_bytes: u64) -> u64 {
    debug_assert!(chunk_size_bytes > 0, "chunk size must be positive");
    size_bytes.div_ceil(chunk_size_bytes)
}

/// Draw `min(replication_factor, snapshot.len())` endpoints starting at `cursor`.
///
/// Returns the endpoints and the advanced cursor. Within one draw no snapshot
/// index repeats, so the endpoints are pairwise distinct as long as the
/// snapshot itself has no duplicates.
pub fn select_replica_set(
    replication_factor: usize,
    snapshot: &[String],
    cursor: usize,
) -> Result<(Vec<String>, usize)> {
    if snapshot.is_empty() {
        return Err(Error::NoChunkserversAvailable);
    }

    let actual = replication_factor.min(snapshot.len());
    let mut cursor = cursor;
    let mut selected = Vec::with_capacity(actual);

    for _ in 0..actual {
        selected.push(snapshot[cursor % snapshot.len()].clone());
        cursor = cursor.wrapping_add(1);
    }

    Ok((selected, cursor))
}

/// PlacementManager turns a declared object size into a full placement list.
#[derive(Debug, Clone)]
pub struct PlacementManager {
    /// Bytes per chunk
    chunk_size_bytes: u64,
    /// Target replicas per chunk
    replication_factor: usize,
}

impl PlacementManager {
    pub fn new(chunk_size_bytes: u64, replication_factor: usize) -> Self {
        Self {
            chunk_size_bytes,
            replication_factor,
        }
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_bytes
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn chunk_count(&self, size_bytes: u64) -> u64 {
        compute_chunk_count(size_bytes, self.chunk_size_bytes)
    }

    /// Plan every chunk of an object against one registry snapshot.
    ///
    /// Placements come out in (chunk index, replica index) order. The cursor
    /// keeps rotating across chunks, so after wraparound a later chunk may reuse
    /// an endpoint an earlier chunk already holds.
    pub fn plan(
        &self,
        size_bytes: u64,
        snapshot: &[String],
        cursor: usize,
    ) -> Result<(Vec<ChunkPlacement>, usize)> {
        if snapshot.is_empty() {
            return Err(Error::NoChunkserversAvailable);
        }

        let chunk_count = self.chunk_count(size_bytes);
        let mut cursor = cursor;
        let mut placements = Vec::new();

        for chunk_index in 0..chunk_count {
            let (replicas, next) = select_replica_set(self.replication_factor, snapshot, cursor)?;
            cursor = next;

            placements.extend(replicas.into_iter().enumerate().map(|(replica_index, endpoint)| {
                ChunkPlacement {
                    chunk_index,
                    replica_index,
                    chunkserver_endpoint: endpoint,
                }
            }));
        }

        Ok((placements, cursor))
    }
}
