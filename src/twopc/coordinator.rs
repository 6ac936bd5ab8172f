//! Two-phase commit coordinator

use crate::cluster::{Directory, ReplicaId, TaskOutcome, WorkerPool};
use crate::common::store::{deleted_message, inserted_message, not_found_message};
use crate::common::{ClusterConfig, Error, Key, Method, Operation, Protocol, Result, TwoPcConfig};
use crate::coordinator::{ReplicationCoordinator, TWO_PC_ABORTED};
use crate::twopc::{ClientId, Participant};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of one two-phase run. Never partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Committed,
    Aborted,
}

impl TxnStatus {
    pub fn is_committed(&self) -> bool {
        matches!(self, TxnStatus::Committed)
    }

    /// Status code reported to callers
    pub fn code(&self) -> u16 {
        match self {
            TxnStatus::Committed => 200,
            TxnStatus::Aborted => 400,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Prepare,
    Commit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Commit => write!(f, "commit"),
        }
    }
}

pub struct TwoPcCoordinator {
    cluster: ClusterConfig,
    directory: Arc<dyn Directory<dyn Participant>>,
    pool: WorkerPool,
    retry_backoff: Duration,
}

impl TwoPcCoordinator {
    pub fn new(
        cluster: ClusterConfig,
        directory: Arc<dyn Directory<dyn Participant>>,
        config: &TwoPcConfig,
    ) -> Result<Self> {
        cluster.validate()?;
        let pool = WorkerPool::new(config.workers.unwrap_or(cluster.len()));
        Ok(Self {
            cluster,
            directory,
            pool,
            retry_backoff: config.retry_backoff(),
        })
    }

    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Run prepare and commit against every replica, then fan out the
    /// mutation (PUT/DEL) without waiting for it.
    pub async fn two_phase_protocol(&self, operation: &Operation) -> TxnStatus {
        let status = self.vote(operation).await;
        if status.is_committed() {
            self.apply_everywhere(operation);
        }
        status
    }

    /// Prepare then commit under a fresh client id
    async fn vote(&self, operation: &Operation) -> TxnStatus {
        let client = Uuid::new_v4();
        tracing::info!("2PC {} started for {}", client, operation);

        for phase in [Phase::Prepare, Phase::Commit] {
            if let Err(e) = self.run_phase(phase, operation, client).await {
                tracing::warn!("2PC {} aborted in {} phase: {}", client, phase, e);
                return self.finish(client, TxnStatus::Aborted);
            }
            tracing::info!("2PC {}: all replicas confirmed {}", client, phase);
        }
        self.finish(client, TxnStatus::Committed)
    }

    fn finish(&self, client: ClientId, status: TxnStatus) -> TxnStatus {
        tracing::info!(code = status.code(), "2PC {} finished: {:?}", client, status);
        status
    }

    fn apply_everywhere(&self, operation: &Operation) {
        match operation {
            Operation::Get { .. } => {}
            Operation::Put { key, value } => {
                let (key, value) = (*key, value.clone());
                self.broadcast(move |participant| {
                    let value = value.clone();
                    async move { participant.execute_put(key, value).await }
                });
            }
            Operation::Del { key } => {
                let key = *key;
                self.broadcast(move |participant| async move {
                    participant.execute_delete(key).await
                });
            }
        }
    }

    /// Every replica must confirm; a refusal gets one re-check after the backoff.
    async fn run_phase(&self, phase: Phase, operation: &Operation, client: ClientId) -> Result<()> {
        let ids = self.cluster.ids();
        let tasks = ids.iter().map(|id| {
            let id = *id;
            let directory = self.directory.clone();
            let operation = operation.clone();
            let backoff = self.retry_backoff;
            async move {
                let first = confirm(&*directory, id, phase, &operation, client).await;
                if first.is_ok() {
                    return first;
                }
                tracing::info!("Replica {} did not confirm {}, retrying in {:?}", id, phase, backoff);
                tokio::time::sleep(backoff).await;
                confirm(&*directory, id, phase, &operation, client).await
            }
        });

        // No deadline: a replica that never answers stalls the phase.
        let outcomes = self.pool.fan_out(None, tasks).await;

        let mut first_error = None;
        for (id, outcome) in ids.iter().zip(outcomes) {
            let result = match outcome {
                TaskOutcome::Completed(result) => result,
                TaskOutcome::TimedOut | TaskOutcome::Cancelled => Err(Error::ReplicaUnreachable {
                    replica: *id,
                    reason: format!("{} call cancelled", phase),
                }),
            };
            if let Err(e) = result {
                tracing::warn!("Replica {} failed {}: {}", id, phase, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn broadcast<F, Fut>(&self, mutation: F)
    where
        F: Fn(Arc<dyn Participant>) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        for id in self.cluster.ids() {
            let directory = self.directory.clone();
            let mutation = mutation.clone();
            self.pool.spawn_detached(async move {
                let Some(participant) = directory.resolve(id).await else {
                    tracing::warn!("Replica {} unreachable for post-commit mutation", id);
                    return;
                };
                if let Err(e) = mutation(participant).await {
                    tracing::warn!("Replica {} failed post-commit mutation: {}", id, e);
                }
            });
        }
    }

    /// Read `key` from the first replica, in cluster order, that answers
    async fn read_first(&self, key: Key) -> Result<Option<String>> {
        let mut last_error = Error::EmptyCluster;
        for id in self.cluster.ids() {
            let Some(participant) = self.directory.resolve(id).await else {
                last_error = Error::ReplicaUnreachable {
                    replica: id,
                    reason: "not resolvable".into(),
                };
                continue;
            };
            match participant.execute_get(key).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!("Replica {} failed read of {}: {}", id, key, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

async fn confirm(
    directory: &dyn Directory<dyn Participant>,
    id: ReplicaId,
    phase: Phase,
    operation: &Operation,
    client: ClientId,
) -> Result<()> {
    let Some(participant) = directory.resolve(id).await else {
        return Err(Error::ReplicaUnreachable {
            replica: id,
            reason: "not resolvable".into(),
        });
    };

    let confirmed = match phase {
        Phase::Prepare => {
            participant
                .confirm_prepare(operation.method(), operation.key(), client)
                .await?
        }
        Phase::Commit => {
            participant
                .confirm_commit(
                    operation.method(),
                    operation.key(),
                    operation.value().map(str::to_string),
                    client,
                )
                .await?
        }
    };

    if confirmed {
        Ok(())
    } else {
        Err(Error::LockConflict { replica: id })
    }
}

#[async_trait]
impl ReplicationCoordinator for TwoPcCoordinator {
    fn protocol(&self) -> Protocol {
        Protocol::Twopc
    }

    async fn get(&self, key: Key) -> Result<String> {
        if !self.two_phase_protocol(&Operation::get(key)).await.is_committed() {
            return Ok(TWO_PC_ABORTED.to_string());
        }
        Ok(self
            .read_first(key)
            .await?
            .unwrap_or_else(|| not_found_message(key, Method::Get)))
    }

    async fn put(&self, key: Key, value: String) -> Result<String> {
        match self.two_phase_protocol(&Operation::put(key, value)).await {
            TxnStatus::Committed => Ok(inserted_message(key)),
            TxnStatus::Aborted => Ok(TWO_PC_ABORTED.to_string()),
        }
    }

    /// The existence check is a best-effort read taken after commit and
    /// before the delete is fanned out. A committed delete is always fanned
    /// out, even when no replica answers the read.
    async fn delete(&self, key: Key) -> Result<String> {
        let operation = Operation::delete(key);
        if !self.vote(&operation).await.is_committed() {
            return Ok(TWO_PC_ABORTED.to_string());
        }

        let existed = match self.read_first(key).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!("Existence of {} unknown before delete: {}", key, e);
                false
            }
        };
        self.apply_everywhere(&operation);

        if existed {
            Ok(deleted_message(key))
        } else {
            Ok(not_found_message(key, Method::Del))
        }
    }

    fn shutdown(&self) {
        tracing::info!("2PC coordinator shutting down");
        self.pool.shutdown();
    }

    fn is_shut_down(&self) -> bool {
        self.pool.is_shut_down()
    }
}
