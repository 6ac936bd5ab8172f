//! Paxos replication
//!
//! Each client request becomes one proposal driven through three phases
//! (prepare, accept, learn) against every reachable replica:
//!
//! ```text
//!   PaxosCoordinator ──prepare──▶ PaxosReplica × N   (quorum N/2+1 promises)
//!                    ──accept───▶ responders          (quorum N/2+1 accepts)
//!                    ──learn────▶ responders          (apply to store)
//! ```

pub mod coordinator;
pub mod http;
pub mod replica;

pub use coordinator::PaxosCoordinator;
pub use http::{replica_router, RemotePaxosReplica};
pub use replica::{Faults, PaxosReplica};

use crate::cluster::ReplicaId;
use crate::common::{Promise, Proposal, Result};
use async_trait::async_trait;

/// Acceptor and learner side of a replica, local or remote.
///
/// `Err` means the replica did not answer; callers count it as a negative vote.
#[async_trait]
pub trait Acceptor: Send + Sync {
    fn id(&self) -> ReplicaId;

    async fn prepare(&self, proposal: Proposal) -> Result<Promise>;

    async fn accept(&self, proposal: Proposal) -> Result<bool>;

    async fn learn(&self, proposal: Proposal) -> Result<String>;
}
