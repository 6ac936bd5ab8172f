//! Paxos proposer
//!
//! Runs prepare → accept → learn for a single proposal. Every phase fans out
//! on the worker pool and joins before the next one starts. The quorum is
//! computed over the replicas that resolved at the start of the round.

use crate::cluster::{quorum_size, resolve_reachable, Directory, ReplicaId, TaskOutcome, WorkerPool};
use crate::common::{
    ClusterConfig, Error, Key, Operation, PaxosConfig, PromiseStatus, Proposal, ProposalIdGenerator,
    Protocol, Result,
};
use crate::coordinator::{ReplicationCoordinator, CONSENSUS_NOT_REACHED};
use crate::paxos::Acceptor;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

type Acceptors = Vec<(ReplicaId, Arc<dyn Acceptor>)>;

pub struct PaxosCoordinator {
    cluster: ClusterConfig,
    directory: Arc<dyn Directory<dyn Acceptor>>,
    ids: ProposalIdGenerator,
    pool: WorkerPool,
    call_timeout: Duration,
}

impl PaxosCoordinator {
    pub fn new(
        cluster: ClusterConfig,
        directory: Arc<dyn Directory<dyn Acceptor>>,
        config: &PaxosConfig,
    ) -> Result<Self> {
        cluster.validate()?;
        let pool = WorkerPool::new(cluster.len());
        Ok(Self {
            cluster,
            directory,
            ids: ProposalIdGenerator::new(),
            pool,
            call_timeout: config.call_timeout(),
        })
    }

    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Wrap `operation` in a proposal with a fresh id
    pub fn create_proposal(&self, operation: Operation) -> Proposal {
        self.ids.create_proposal(operation)
    }

    /// Drive `proposal` through all three phases.
    ///
    /// Returns the learned result text, or `QuorumNotReached` if prepare or
    /// accept fell short. Unreachable replicas are dropped from later phases.
    pub async fn execute_operation(&self, proposal: Proposal) -> Result<String> {
        let mut acceptors = resolve_reachable(&*self.directory, &self.cluster).await;
        let quorum = quorum_size(acceptors.len());
        if acceptors.is_empty() {
            tracing::warn!("No reachable replicas for proposal {}", proposal.id);
            return Err(Error::QuorumNotReached {
                phase: "prepare",
                votes: 0,
                quorum,
            });
        }

        let failed = self.prepare_phase(&acceptors, &proposal, quorum).await?;
        acceptors.retain(|(id, _)| !failed.contains(id));

        let failed = self.accept_phase(&acceptors, &proposal, quorum).await?;
        acceptors.retain(|(id, _)| !failed.contains(id));

        self.learn_phase(&acceptors, &proposal, quorum).await
    }

    async fn prepare_phase(
        &self,
        acceptors: &Acceptors,
        proposal: &Proposal,
        quorum: usize,
    ) -> Result<HashSet<ReplicaId>> {
        let outcomes = self
            .pool
            .fan_out(
                Some(self.call_timeout),
                acceptors.iter().map(|(_, acceptor)| {
                    let acceptor = acceptor.clone();
                    let proposal = proposal.clone();
                    async move { acceptor.prepare(proposal).await }
                }),
            )
            .await;

        let mut promised = 0;
        let mut failed = HashSet::new();
        for ((id, _), outcome) in acceptors.iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Completed(Ok(promise)) => match promise.status {
                    PromiseStatus::Promised => {
                        promised += 1;
                        tracing::info!("Replica {} has PROMISED proposal {}", id, proposal.operation);
                    }
                    PromiseStatus::Accepted => {
                        promised += 1;
                        if let Some(prior) = &promise.proposal {
                            tracing::warn!(
                                "Replica {} still holds accepted proposal {} ({}) while promising {}",
                                id,
                                prior.id,
                                prior.operation,
                                proposal.id
                            );
                        }
                    }
                    PromiseStatus::Rejected => {
                        tracing::info!("Replica {} has REJECTED proposal {}", id, proposal.operation);
                    }
                },
                TaskOutcome::Completed(Err(e)) => {
                    tracing::warn!("Replica {} is down: {}", id, e);
                    failed.insert(*id);
                }
                TaskOutcome::TimedOut | TaskOutcome::Cancelled => {
                    tracing::warn!(
                        "Replica {} is NOT RESPONDING to proposal {}",
                        id,
                        proposal.operation
                    );
                    failed.insert(*id);
                }
            }
        }

        if promised < quorum {
            tracing::info!(
                "Proposal {} failed prepare: {}/{} promises",
                proposal.id,
                promised,
                quorum
            );
            return Err(Error::QuorumNotReached {
                phase: "prepare",
                votes: promised,
                quorum,
            });
        }
        Ok(failed)
    }

    async fn accept_phase(
        &self,
        acceptors: &Acceptors,
        proposal: &Proposal,
        quorum: usize,
    ) -> Result<HashSet<ReplicaId>> {
        let outcomes = self
            .pool
            .fan_out(
                Some(self.call_timeout),
                acceptors.iter().map(|(_, acceptor)| {
                    let acceptor = acceptor.clone();
                    let proposal = proposal.clone();
                    async move { acceptor.accept(proposal).await }
                }),
            )
            .await;

        let mut accepted = 0;
        let mut failed = HashSet::new();
        for ((id, _), outcome) in acceptors.iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Completed(Ok(true)) => {
                    accepted += 1;
                    tracing::info!("Replica {} has ACCEPTED proposal {}", id, proposal.operation);
                }
                TaskOutcome::Completed(Ok(false)) => {
                    tracing::info!("Replica {} refused to accept proposal {}", id, proposal.id);
                }
                TaskOutcome::Completed(Err(e)) => {
                    tracing::warn!("Replica {} is down: {}", id, e);
                    failed.insert(*id);
                }
                TaskOutcome::TimedOut | TaskOutcome::Cancelled => {
                    tracing::warn!(
                        "Replica {} is NOT RESPONDING to proposal {}",
                        id,
                        proposal.operation
                    );
                    failed.insert(*id);
                }
            }
        }

        if accepted < quorum {
            tracing::info!(
                "Proposal {} failed accept: {}/{} accepts",
                proposal.id,
                accepted,
                quorum
            );
            return Err(Error::QuorumNotReached {
                phase: "accept",
                votes: accepted,
                quorum,
            });
        }
        Ok(failed)
    }

    /// The result comes from the first replica, in cluster order, that answers.
    async fn learn_phase(
        &self,
        acceptors: &Acceptors,
        proposal: &Proposal,
        quorum: usize,
    ) -> Result<String> {
        let outcomes = self
            .pool
            .fan_out(
                Some(self.call_timeout),
                acceptors.iter().map(|(_, acceptor)| {
                    let acceptor = acceptor.clone();
                    let proposal = proposal.clone();
                    async move { acceptor.learn(proposal).await }
                }),
            )
            .await;

        let mut result = None;
        for ((id, _), outcome) in acceptors.iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Completed(Ok(text)) => {
                    if result.is_none() {
                        result = Some(text);
                    } else if result.as_deref() != Some(text.as_str()) {
                        tracing::warn!(
                            "Replica {} diverged on proposal {}: {}",
                            id,
                            proposal.id,
                            text
                        );
                    }
                }
                TaskOutcome::Completed(Err(e)) => {
                    tracing::warn!("Replica {} failed to learn {}: {}", id, proposal.id, e);
                }
                TaskOutcome::TimedOut | TaskOutcome::Cancelled => {
                    tracing::warn!("Replica {} did not confirm learn {}", id, proposal.id);
                }
            }
        }

        result.ok_or(Error::QuorumNotReached {
            phase: "learn",
            votes: 0,
            quorum,
        })
    }

    async fn submit(&self, operation: Operation) -> Result<String> {
        let proposal = self.create_proposal(operation);
        tracing::info!("Proposal {}: {}", proposal.id, proposal.operation);
        match self.execute_operation(proposal).await {
            Err(Error::QuorumNotReached { .. }) => Ok(CONSENSUS_NOT_REACHED.to_string()),
            other => other,
        }
    }
}

#[async_trait]
impl ReplicationCoordinator for PaxosCoordinator {
    fn protocol(&self) -> Protocol {
        Protocol::Paxos
    }

    async fn get(&self, key: Key) -> Result<String> {
        self.submit(Operation::get(key)).await
    }

    async fn put(&self, key: Key, value: String) -> Result<String> {
        self.submit(Operation::put(key, value)).await
    }

    async fn delete(&self, key: Key) -> Result<String> {
        self.submit(Operation::delete(key)).await
    }

    fn shutdown(&self) {
        tracing::info!("Paxos coordinator shutting down");
        self.pool.shutdown();
    }

    fn is_shut_down(&self) -> bool {
        self.pool.is_shut_down()
    }
}
