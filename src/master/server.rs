//! Master server

use crate::common::{format_bytes, MasterConfig, PersistenceBackend, Result};
use crate::master::chunkserver_client::HttpChunkserverClient;
use crate::master::http::create_router;
use crate::master::persistence::{JsonFilePersistence, MemoryPersistence, MetadataPersistence};
use crate::master::service::MasterService;
use std::sync::Arc;

/// Build the persistence collaborator selected by configuration
pub fn open_persistence(config: &MasterConfig) -> Result<Arc<dyn MetadataPersistence>> {
    match config.persistence_backend {
        PersistenceBackend::Json => Ok(Arc::new(JsonFilePersistence::new(
            &config.persistence_path,
        ))),
        PersistenceBackend::Memory => Ok(Arc::new(MemoryPersistence::new())),
        #[cfg(feature = "sled-backend")]
        PersistenceBackend::Sled => Ok(Arc::new(
            crate::master::persistence::SledPersistence::open(&config.persistence_path)?,
        )),
        #[cfg(not(feature = "sled-backend"))]
        PersistenceBackend::Sled => Err(crate::Error::InvalidConfig(
            "sled backend requires the `sled-backend` feature".into(),
        )),
    }
}

pub struct MasterServer {
    config: MasterConfig,
}

impl MasterServer {
    pub fn new(config: MasterConfig) -> Self {
        Self { config }
    }

    /// Assemble the service from configuration without binding a socket
    pub fn build_service(&self) -> Result<Arc<MasterService>> {
        let persistence = open_persistence(&self.config)?;
        let client = Arc::new(HttpChunkserverClient::new(self.config.delete_timeout())?);
        Ok(Arc::new(MasterService::new(
            &self.config,
            persistence,
            client,
        )?))
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting master");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!(
            "  Persistence: {:?} at {}",
            self.config.persistence_backend,
            self.config.persistence_path.display()
        );
        tracing::info!("  Replication factor: {}", self.config.replication_factor);
        tracing::info!(
            "  Chunk size: {}",
            format_bytes(self.config.chunk_size_bytes)
        );

        // A table that cannot be loaded is fatal here.
        let service = self.build_service()?;

        let health = service.get_health_status();
        tracing::info!(
            "  Objects loaded: {}, chunkservers: {} ({})",
            health.files_in_memory,
            health.report.available_chunkservers,
            health.report.status
        );
        for endpoint in service.list_chunkservers() {
            tracing::info!("    - {}", endpoint);
        }

        let router = create_router(service, self.config.max_body_bytes);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("✓ Master ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Master stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
