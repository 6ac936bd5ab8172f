//! Client-facing coordination
//!
//! The coordinator is responsible for:
//! - Routing client get/put/delete through the deployment's protocol
//! - Serving the client HTTP API
//! - Booting the in-process replica endpoints

pub mod http;
pub mod server;

pub use http::{create_router, kv_routes, CoordState};
pub use server::{build_coordinator, Server};

use crate::common::{Key, Protocol, Result};
use async_trait::async_trait;

/// Result text when a Paxos round falls short of a quorum
pub const CONSENSUS_NOT_REACHED: &str = "Consensus not reached";

/// Result text when any replica fails to confirm a 2PC phase
pub const TWO_PC_ABORTED: &str = "Operation aborted: two-phase commit failed";

/// One replication strategy.
///
/// Every call returns the text shown to the client. Protocol-level failures
/// (no quorum, aborted commit) are reported as text, not as `Err`.
#[async_trait]
pub trait ReplicationCoordinator: Send + Sync {
    fn protocol(&self) -> Protocol;

    async fn get(&self, key: Key) -> Result<String>;

    async fn put(&self, key: Key, value: String) -> Result<String>;

    async fn delete(&self, key: Key) -> Result<String>;

    /// Cancel queued and running replica calls. Later calls fail their quorum.
    fn shutdown(&self);

    fn is_shut_down(&self) -> bool;
}
