//! Chunkserver membership
//!
//! Endpoints are kept in insertion order together with the round-robin cursor
//! used for replica selection. Both live behind one mutex so a plan sees a
//! consistent snapshot and advances the cursor atomically.

use crate::common::Result;
use crate::master::metadata::ChunkPlacement;
use crate::master::placement::PlacementManager;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Cluster health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
        }
    }
}

/// Registry size compared with the replication target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub available_chunkservers: usize,
    pub required_for_replication: usize,
    pub can_maintain_replication: bool,
}

#[derive(Debug, Default)]
struct RegistryInner {
    endpoints: Vec<String>,
    cursor: usize,
}

/// Set of known chunkserver endpoints
#[derive(Debug, Default)]
pub struct ChunkserverRegistry {
    inner: Mutex<RegistryInner>,
}

impl ChunkserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an endpoint. Returns false if it was already registered.
    pub fn register(&self, endpoint: &str) -> bool {
        let mut inner = self.lock();
        if inner.endpoints.iter().any(|e| e == endpoint) {
            return false;
        }
        inner.endpoints.push(endpoint.to_string());
        tracing::info!(
            "Registered chunkserver {} ({} total)",
            endpoint,
            inner.endpoints.len()
        );
        true
    }

    /// Remove an endpoint. Returns false if it was not registered.
    pub fn unregister(&self, endpoint: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.endpoints.len();
        inner.endpoints.retain(|e| e != endpoint);
        let removed = inner.endpoints.len() != before;
        if removed {
            tracing::warn!(
                "Unregistered chunkserver {} ({} remaining)",
                endpoint,
                inner.endpoints.len()
            );
        }
        removed
    }

    /// Point-in-time copy of the membership, in insertion order
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().endpoints.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().endpoints.is_empty()
    }

    pub fn health_status(&self, replication_factor: usize) -> HealthReport {
        let available = self.len();
        let healthy = available >= replication_factor;
        HealthReport {
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            available_chunkservers: available,
            required_for_replication: replication_factor,
            can_maintain_replication: healthy,
        }
    }

    /// Plan all chunks of an object against the current membership.
    pub fn draw_placements(
        &self,
        placement: &PlacementManager,
        size_bytes: u64,
    ) -> Result<Vec<ChunkPlacement>> {
        let mut inner = self.lock();
        let (placements, cursor) = placement.plan(size_bytes, &inner.endpoints, inner.cursor)?;
        inner.cursor = cursor;
        Ok(placements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_register_idempotent() {
        let registry = ChunkserverRegistry::new();
        assert!(registry.register("http://cs1"));
        assert!(!registry.register("http://cs1"));
        assert_eq!(registry.snapshot(), vec!["http://cs1".to_string()]);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = ChunkserverRegistry::new();
        registry.register("http://cs1");
        assert!(!registry.unregister("http://cs2"));
        assert!(registry.unregister("http://cs1"));
        assert!(!registry.unregister("http://cs1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let registry = ChunkserverRegistry::new();
        for e in ["http://c", "http://a", "http://b"] {
            registry.register(e);
        }
        registry.unregister("http://a");
        registry.register("http://a");
        assert_eq!(registry.snapshot(), vec!["http://c", "http://b", "http://a"]);
    }

    #[test]
    fn test_health_status() {
        let registry = ChunkserverRegistry::new();
        registry.register("http://cs1");
        registry.register("http://cs2");

        let report = registry.health_status(3);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.available_chunkservers, 2);
        assert_eq!(report.required_for_replication, 3);
        assert!(!report.can_maintain_replication);

        registry.register("http://cs3");
        assert_eq!(registry.health_status(3).status, HealthStatus::Healthy);
        registry.register("http://cs4");
        assert_eq!(registry.health_status(3).status, HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_serializes_uppercase() {
        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"DEGRADED\"");
    }

    #[test]
    fn test_draw_advances_cursor_across_plans() {
        let registry = ChunkserverRegistry::new();
        for i in 1..=3 {
            registry.register(&format!("http://cs{}", i));
        }
        let manager = PlacementManager::new(10, 2);

        let first = registry.draw_placements(&manager, 10).unwrap();
        let second = registry.draw_placements(&manager, 10).unwrap();
        assert_eq!(first[0].chunkserver_endpoint, "http://cs1");
        assert_eq!(first[1].chunkserver_endpoint, "http://cs2");
        assert_eq!(second[0].chunkserver_endpoint, "http://cs3");
        assert_eq!(second[1].chunkserver_endpoint, "http://cs1");
    }

    #[test]
    fn test_draw_empty_registry() {
        let registry = ChunkserverRegistry::new();
        let manager = PlacementManager::new(10, 2);
        assert!(matches!(
            registry.draw_placements(&manager, 100),
            Err(Error::NoChunkserversAvailable)
        ));
    }

    #[test]
    fn test_concurrent_draws_keep_replicas_distinct() {
        let registry = Arc::new(ChunkserverRegistry::new());
        for i in 1..=5 {
            registry.register(&format!("http://cs{}", i));
        }
        let manager = Arc::new(PlacementManager::new(1024, 3));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let manager = manager.clone();
                std::thread::spawn(move || registry.draw_placements(&manager, 10 * 1024).unwrap())
            })
            .collect();

        for handle in handles {
            let placements = handle.join().unwrap();
            for chunk in 0..10 {
                let endpoints: HashSet<_> = placements
                    .iter()
                    .filter(|p| p.chunk_index == chunk)
                    .map(|p| p.chunkserver_endpoint.clone())
                    .collect();
                assert_eq!(endpoints.len(), 3);
            }
        }
    }
}
