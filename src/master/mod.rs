//! Master implementation
//!
//! The master is responsible for:
//! - Chunk planning (object size → chunk count)
//! - Replica placement (round-robin over registered chunkservers)
//! - Metadata management (object id → placement record)
//! - Coordinated deletion across replicas
//! - Cluster health and statistics

pub mod chunkserver_client;
pub mod fanout;
pub mod http;
pub mod metadata;
pub mod persistence;
pub mod placement;
pub mod registry;
pub mod server;
pub mod service;

pub use server::MasterServer;
pub use service::MasterService;
