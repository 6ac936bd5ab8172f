//! Cluster plumbing shared by both coordinators
//!
//! - Stable replica ids
//! - Quorum arithmetic
//! - Directory lookups (replica id → live handle)
//! - A bounded worker pool for phase fan-out

pub mod directory;
pub mod pool;
pub mod remote;

pub use directory::{resolve_reachable, Directory, HttpDirectory, StaticDirectory};
pub use pool::{TaskOutcome, WorkerPool};
pub use remote::RemoteEndpoint;

use serde::{Deserialize, Serialize};

/// Stable integer identifier of a replica within its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(pub u32);

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Votes needed out of `reachable` replicas.
///
/// Computed over the replicas reachable for the current round, not the
/// configured cluster size.
pub fn quorum_size(reachable: usize) -> usize {
    reachable / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_boundaries() {
        assert_eq!(quorum_size(1), 1);
        assert_eq!(quorum_size(2), 2);
        assert_eq!(quorum_size(3), 2);
        assert_eq!(quorum_size(4), 3);
        assert_eq!(quorum_size(5), 3);
    }

    #[test]
    fn test_any_two_quorums_intersect() {
        for n in 1..=9 {
            assert!(2 * quorum_size(n) > n, "quorums of {} may not overlap", n);
        }
    }
}
