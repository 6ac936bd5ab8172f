//! Paxos acceptor + learner wrapping one replica's store
//!
//! Lifecycle per round: idle → promised → accepted → learned (back to idle).
//! All state transitions run under one per-replica lock, so concurrent
//! proposals against the same replica are serialized.

use crate::cluster::ReplicaId;
use crate::common::{
    ClusterConfig, Error, Key, KeyValueStore, PaxosConfig, Promise, Proposal, ProposalId, Result,
};
use crate::paxos::Acceptor;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Simulated unavailability on prepare/accept. Learn is never affected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Faults {
    pub prepare: f64,
    pub accept: f64,
}

impl Faults {
    pub fn none() -> Self {
        Self {
            prepare: 0.0,
            accept: 0.0,
        }
    }

    /// Same crash probability on both phases
    pub fn flaky(probability: f64) -> Self {
        Self {
            prepare: probability,
            accept: probability,
        }
    }

    /// Never answers prepare
    pub fn down_on_prepare() -> Self {
        Self {
            prepare: 1.0,
            accept: 0.0,
        }
    }

    fn trips(probability: f64) -> bool {
        probability > 0.0 && rand::thread_rng().gen_bool(probability.min(1.0))
    }
}

#[derive(Debug, Default)]
struct AcceptorState {
    highest_seen: Option<ProposalId>,
    accepted: Option<Proposal>,
    store: KeyValueStore,
}

pub struct PaxosReplica {
    id: ReplicaId,
    faults: Faults,
    call_timeout: Duration,
    state: Mutex<AcceptorState>,
}

impl PaxosReplica {
    /// Build replica `id` of `cluster`, starting with an empty store
    pub fn new(id: ReplicaId, cluster: &ClusterConfig, config: &PaxosConfig) -> Result<Self> {
        if !cluster.contains(id) {
            return Err(Error::UnknownReplica(id));
        }
        Ok(Self {
            id,
            faults: Faults::flaky(config.failure_probability),
            call_timeout: config.call_timeout(),
            state: Mutex::new(AcceptorState::default()),
        })
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Highest proposal id seen so far, 0 if none
    pub async fn highest_seen_id(&self) -> ProposalId {
        self.state.lock().await.highest_seen.unwrap_or(0)
    }

    pub async fn accepted_proposal(&self) -> Option<Proposal> {
        self.state.lock().await.accepted.clone()
    }

    /// Highest seen id and accepted proposal, read atomically
    pub async fn ballot(&self) -> (ProposalId, Option<Proposal>) {
        let state = self.state.lock().await;
        (state.highest_seen.unwrap_or(0), state.accepted.clone())
    }

    /// Read the local store directly, outside of consensus
    pub async fn execute_get(&self, key: Key) -> Option<String> {
        self.state.lock().await.store.execute_get(key)
    }

    pub async fn store_len(&self) -> usize {
        self.state.lock().await.store.len()
    }

    fn simulate_crash(&self, probability: f64, phase: &str) -> Result<()> {
        if Faults::trips(probability) {
            tracing::warn!("Replica {}: simulated failure on {}", self.id, phase);
            return Err(Error::ReplicaUnreachable {
                replica: self.id,
                reason: format!("simulated crash during {}", phase),
            });
        }
        Ok(())
    }

    async fn lock_state(&self) -> Result<MutexGuard<'_, AcceptorState>> {
        tokio::time::timeout(self.call_timeout, self.state.lock())
            .await
            .map_err(|_| Error::ReplicaUnreachable {
                replica: self.id,
                reason: format!("no answer within {:?}", self.call_timeout),
            })
    }
}

#[async_trait]
impl Acceptor for PaxosReplica {
    fn id(&self) -> ReplicaId {
        self.id
    }

    async fn prepare(&self, proposal: Proposal) -> Result<Promise> {
        tracing::debug!("Replica {}: received prepare {}", self.id, proposal.id);
        self.simulate_crash(self.faults.prepare, "prepare")?;

        let mut state = self.lock_state().await?;
        let Some(highest) = state.highest_seen else {
            state.highest_seen = Some(proposal.id);
            return Ok(Promise::promised(proposal));
        };

        if proposal.id <= highest {
            return Ok(Promise::rejected());
        }

        state.highest_seen = Some(proposal.id);
        match &state.accepted {
            Some(prior) => Ok(Promise::accepted(prior.clone())),
            None => Ok(Promise::promised(proposal)),
        }
    }

    async fn accept(&self, proposal: Proposal) -> Result<bool> {
        tracing::debug!("Replica {}: received accept {}", self.id, proposal.id);
        self.simulate_crash(self.faults.accept, "accept")?;

        let mut state = self.lock_state().await?;
        if state.highest_seen != Some(proposal.id) {
            return Ok(false);
        }
        state.accepted = Some(proposal);
        Ok(true)
    }

    async fn learn(&self, proposal: Proposal) -> Result<String> {
        tracing::debug!("Replica {}: received learn {}", self.id, proposal.id);

        let mut state = self.lock_state().await?;
        let result = state.store.apply(&proposal.operation);
        state.accepted = None;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Operation, PromiseStatus};
    use std::sync::Arc;

    fn replica() -> PaxosReplica {
        let cluster = ClusterConfig::local(3, 6001);
        PaxosReplica::new(ReplicaId(1), &cluster, &PaxosConfig::default())
            .unwrap()
            .with_faults(Faults::none())
    }

    fn proposal(id: ProposalId) -> Proposal {
        Proposal::new(id, Operation::put(1, format!("v{}", id)))
    }

    #[test]
    fn test_unknown_replica_rejected() {
        let cluster = ClusterConfig::local(3, 6001);
        let result = PaxosReplica::new(ReplicaId(9), &cluster, &PaxosConfig::default());
        assert!(matches!(result, Err(Error::UnknownReplica(ReplicaId(9)))));
    }

    #[tokio::test]
    async fn test_first_prepare_promises() {
        let replica = replica();
        assert_eq!(replica.highest_seen_id().await, 0);

        let promise = replica.prepare(proposal(5)).await.unwrap();
        assert_eq!(promise.status, PromiseStatus::Promised);
        assert_eq!(promise.proposal.unwrap().id, 5);
        assert_eq!(replica.highest_seen_id().await, 5);
    }

    #[tokio::test]
    async fn test_stale_prepare_rejected_without_state_change() {
        let replica = replica();
        replica.prepare(proposal(5)).await.unwrap();

        for stale in [5, 3] {
            let promise = replica.prepare(proposal(stale)).await.unwrap();
            assert_eq!(promise, Promise::rejected());
        }
        assert_eq!(replica.highest_seen_id().await, 5);
    }

    #[tokio::test]
    async fn test_prepare_reports_prior_accepted() {
        let replica = replica();
        replica.prepare(proposal(1)).await.unwrap();
        assert!(replica.accept(proposal(1)).await.unwrap());

        let promise = replica.prepare(proposal(2)).await.unwrap();
        assert_eq!(promise.status, PromiseStatus::Accepted);
        assert_eq!(promise.proposal, Some(proposal(1)));
        assert_eq!(replica.highest_seen_id().await, 2);
    }

    #[tokio::test]
    async fn test_accept_requires_matching_id() {
        let replica = replica();
        // Nothing promised yet
        assert!(!replica.accept(proposal(1)).await.unwrap());

        replica.prepare(proposal(4)).await.unwrap();
        assert!(!replica.accept(proposal(3)).await.unwrap());
        assert!(replica.accept(proposal(4)).await.unwrap());
        assert_eq!(replica.accepted_proposal().await, Some(proposal(4)));

        // A higher prepare supersedes the accepted round
        replica.prepare(proposal(6)).await.unwrap();
        assert!(!replica.accept(proposal(4)).await.unwrap());
    }

    #[tokio::test]
    async fn test_learn_applies_and_resets() {
        let replica = replica();
        replica.prepare(proposal(1)).await.unwrap();
        replica.accept(proposal(1)).await.unwrap();

        let result = replica.learn(proposal(1)).await.unwrap();
        assert_eq!(result, "Key 1 was successfully inserted");
        assert_eq!(replica.execute_get(1).await.as_deref(), Some("v1"));
        assert!(replica.accepted_proposal().await.is_none());
    }

    #[tokio::test]
    async fn test_learn_is_idempotent() {
        let replica = replica();
        let put = proposal(1);
        replica.learn(put.clone()).await.unwrap();
        replica.learn(put).await.unwrap();
        assert_eq!(replica.execute_get(1).await.as_deref(), Some("v1"));
        assert_eq!(replica.store_len().await, 1);

        let del = Proposal::new(2, Operation::delete(1));
        assert_eq!(
            replica.learn(del.clone()).await.unwrap(),
            "Key 1 successfully deleted"
        );
        assert_eq!(
            replica.learn(del).await.unwrap(),
            "Key 1 not found. DELETE request aborted."
        );
        assert_eq!(replica.store_len().await, 0);
    }

    #[tokio::test]
    async fn test_learn_get_missing_key() {
        let replica = replica();
        let get = Proposal::new(1, Operation::get(42));
        assert_eq!(
            replica.learn(get).await.unwrap(),
            "Key 42 not found. GET request aborted."
        );
        assert_eq!(replica.store_len().await, 0);
    }

    #[tokio::test]
    async fn test_faults_only_hit_prepare_and_accept() {
        let replica = replica().with_faults(Faults::flaky(1.0));
        assert!(matches!(
            replica.prepare(proposal(1)).await,
            Err(Error::ReplicaUnreachable { .. })
        ));
        assert!(matches!(
            replica.accept(proposal(1)).await,
            Err(Error::ReplicaUnreachable { .. })
        ));
        assert!(replica.learn(proposal(1)).await.is_ok());
        // A crashed prepare leaves no trace
        assert_eq!(replica.highest_seen_id().await, 0);
    }

    #[tokio::test]
    async fn test_accepted_never_above_highest_seen() {
        let replica = Arc::new(replica());
        let mut handles = Vec::new();
        for id in 1..=40u64 {
            let replica = replica.clone();
            handles.push(tokio::spawn(async move {
                let p = proposal(id);
                if replica.prepare(p.clone()).await.unwrap().is_vote() {
                    replica.accept(p).await.unwrap();
                }
                let (highest, accepted) = replica.ballot().await;
                if let Some(accepted) = accepted {
                    assert!(accepted.id <= highest);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Id 40 can never be rejected, so it ends up as the highest seen
        let (highest, accepted) = replica.ballot().await;
        assert_eq!(highest, 40);
        if let Some(accepted) = accepted {
            assert!(accepted.id <= highest);
        }
    }
}
