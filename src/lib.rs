//! # chunkmaster
//!
//! Coordinator for a chunked, replicated object store:
//! - Splits objects into fixed-size chunks
//! - Places every chunk on several chunkservers (round-robin)
//! - Keeps the placement table durable (JSON file or sled)
//! - Fans deletes out to every replica, tolerating partial failure
//!
//! Clients never send object bytes to the master; they ask it where chunks go,
//! then talk to the chunkservers directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   plan / metadata / delete   ┌─────────────────────┐
//! │  Client  │ ───────────────────────────▶ │       Master        │
//! └────┬─────┘                              │  registry + planner │
//!      │ chunk bytes                        │  metadata table     │
//!      ▼                                    └──────────┬──────────┘
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐   │ delete fan-out
//! │ Chunkserver1 │ │ Chunkserver2 │ │ Chunkserver3 │ ◀─┘
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the master
//! ```bash
//! chunkmaster-master serve \
//!   --bind 0.0.0.0:8080 \
//!   --chunkservers http://localhost:9001/chunkserver1,http://localhost:9002/chunkserver2 \
//!   --replicas 3
//! ```
//!
//! ### Use the CLI
//! ```bash
//! chunkmaster plan photo-001 --size 1000000
//! chunkmaster metadata photo-001
//! chunkmaster delete photo-001
//! chunkmaster stats
//! ```

pub mod common;
pub mod master;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use master::{MasterServer, MasterService};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
