//! Common utilities and types shared across chunkmaster

pub mod config;
pub mod error;
pub mod tracing_middleware;
pub mod utils;

pub use self::config::{Config, MasterConfig, PersistenceBackend};
pub use error::{Error, Result};
pub use utils::{format_bytes, validate_endpoint, validate_object_id};
