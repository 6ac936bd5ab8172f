//! # quorumkv
//!
//! A replicated in-memory key-value store with two interchangeable
//! replication protocols:
//! - Paxos (prepare / accept / learn, majority of reachable replicas)
//! - Two-phase commit (prepare / commit, every replica must confirm)
//!
//! ## Architecture
//!
//! ```text
//!        client ──HTTP──▶ ┌──────────────────────────────┐
//!                         │ Coordinator                  │
//!                         │  ReplicationCoordinator      │
//!                         │   = Paxos | TwoPc            │
//!                         └──────────────┬───────────────┘
//!                                        │ HTTP (directory resolve)
//!          ┌──────────────┬──────────────┼──────────────┬──────────────┐
//!          │              │              │              │              │
//!     ┌────▼────┐    ┌────▼────┐    ┌────▼────┐    ┌────▼────┐    ┌────▼────┐
//!     │Replica 1│    │Replica 2│    │Replica 3│    │Replica 4│    │Replica 5│
//!     │ store   │    │ store   │    │ store   │    │ store   │    │ store   │
//!     └─────────┘    └─────────┘    └─────────┘    └─────────┘    └─────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a coordinator with its replicas
//! ```bash
//! quorumkv-coord serve --protocol paxos --bind 127.0.0.1:5000
//! ```
//!
//! ### Use the CLI
//! ```bash
//! quorumkv put 1 abc --coordinator http://localhost:5000
//! quorumkv get 1
//! quorumkv delete 1
//! quorumkv --replica 3 get 1
//! quorumkv seed
//! ```

pub mod cluster;
pub mod common;
pub mod coordinator;
pub mod paxos;
pub mod twopc;

// Re-export commonly used types
pub use cluster::ReplicaId;
pub use common::{Config, Error, Protocol, Result};
pub use coordinator::{ReplicationCoordinator, Server};
pub use paxos::PaxosCoordinator;
pub use twopc::TwoPcCoordinator;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
