//! Two-phase commit replication
//!
//! The coordinator needs every replica to confirm prepare, then every
//! replica to confirm commit. Only then are mutations fanned out, without
//! waiting for them to land. There is no majority relaxation: one busy or
//! unreachable replica aborts the operation.

pub mod coordinator;
pub mod http;
pub mod replica;

pub use coordinator::{TwoPcCoordinator, TxnStatus};
pub use http::{replica_router, RemoteTwoPcReplica};
pub use replica::TwoPcReplica;

use crate::cluster::ReplicaId;
use crate::common::{Key, Method, Result};
use async_trait::async_trait;

/// Identifies one coordinator call. Fresh per call, never reused.
pub type ClientId = uuid::Uuid;

/// Participant side of a replica, local or remote.
///
/// `Err` means the replica did not answer.
#[async_trait]
pub trait Participant: Send + Sync {
    fn id(&self) -> ReplicaId;

    /// Take the replica-wide lock for `client`. `false` if someone holds it.
    async fn confirm_prepare(&self, method: Method, key: Key, client: ClientId) -> Result<bool>;

    /// Release the lock if `client` holds it. `false` otherwise.
    async fn confirm_commit(
        &self,
        method: Method,
        key: Key,
        value: Option<String>,
        client: ClientId,
    ) -> Result<bool>;

    async fn execute_get(&self, key: Key) -> Result<Option<String>>;

    async fn execute_put(&self, key: Key, value: String) -> Result<()>;

    async fn execute_delete(&self, key: Key) -> Result<()>;
}
