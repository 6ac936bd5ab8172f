//! Two-phase commit participant
//!
//! One lock per replica, not per key: while a client holds it, every other
//! client is refused whatever key it targets. A lock whose commit never
//! arrives stays held; there is no lease and no rollback.

use crate::cluster::ReplicaId;
use crate::common::{ClusterConfig, Error, Key, KeyValueStore, Method, Result};
use crate::twopc::{ClientId, Participant};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct ParticipantState {
    lock_holder: Option<ClientId>,
    store: KeyValueStore,
}

pub struct TwoPcReplica {
    id: ReplicaId,
    state: Mutex<ParticipantState>,
}

impl TwoPcReplica {
    pub fn new(id: ReplicaId, cluster: &ClusterConfig) -> Result<Self> {
        if !cluster.contains(id) {
            return Err(Error::UnknownReplica(id));
        }
        Ok(Self {
            id,
            state: Mutex::new(ParticipantState::default()),
        })
    }

    pub async fn lock_holder(&self) -> Option<ClientId> {
        self.state.lock().await.lock_holder
    }

    pub async fn store_len(&self) -> usize {
        self.state.lock().await.store.len()
    }
}

#[async_trait]
impl Participant for TwoPcReplica {
    fn id(&self) -> ReplicaId {
        self.id
    }

    async fn confirm_prepare(&self, method: Method, key: Key, client: ClientId) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.lock_holder {
            None => {
                state.lock_holder = Some(client);
                tracing::debug!(
                    "Replica {}: prepared {}({}) for client {}",
                    self.id,
                    method,
                    key,
                    client
                );
                Ok(true)
            }
            Some(holder) => {
                tracing::debug!(
                    "Replica {}: busy with client {}, refusing {}",
                    self.id,
                    holder,
                    client
                );
                Ok(false)
            }
        }
    }

    async fn confirm_commit(
        &self,
        method: Method,
        key: Key,
        _value: Option<String>,
        client: ClientId,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.lock_holder == Some(client) {
            state.lock_holder = None;
            tracing::debug!(
                "Replica {}: committed {}({}) for client {}",
                self.id,
                method,
                key,
                client
            );
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn execute_get(&self, key: Key) -> Result<Option<String>> {
        Ok(self.state.lock().await.store.execute_get(key))
    }

    async fn execute_put(&self, key: Key, value: String) -> Result<()> {
        self.state.lock().await.store.execute_put(key, value);
        Ok(())
    }

    async fn execute_delete(&self, key: Key) -> Result<()> {
        self.state.lock().await.store.execute_delete(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn replica() -> TwoPcReplica {
        TwoPcReplica::new(ReplicaId(1), &ClusterConfig::local(5, 6001)).unwrap()
    }

    #[tokio::test]
    async fn test_second_client_refused_until_commit() {
        let replica = replica();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(replica.confirm_prepare(Method::Put, 1, a).await.unwrap());
        // Different key, still refused: the lock covers the whole replica
        assert!(!replica.confirm_prepare(Method::Put, 2, b).await.unwrap());
        assert_eq!(replica.lock_holder().await, Some(a));

        assert!(replica
            .confirm_commit(Method::Put, 1, Some("x".into()), a)
            .await
            .unwrap());
        assert!(replica.confirm_prepare(Method::Put, 2, b).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_by_wrong_client_keeps_lock() {
        let replica = replica();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        replica.confirm_prepare(Method::Del, 1, a).await.unwrap();
        assert!(!replica.confirm_commit(Method::Del, 1, None, b).await.unwrap());
        assert_eq!(replica.lock_holder().await, Some(a));
    }

    #[tokio::test]
    async fn test_commit_without_prepare_refused() {
        let replica = replica();
        assert!(!replica
            .confirm_commit(Method::Get, 1, None, Uuid::new_v4())
            .await
            .unwrap());
        assert!(replica.lock_holder().await.is_none());
    }

    #[tokio::test]
    async fn test_mutations_bypass_lock() {
        let replica = replica();
        replica
            .confirm_prepare(Method::Put, 1, Uuid::new_v4())
            .await
            .unwrap();

        replica.execute_put(1, "abc".into()).await.unwrap();
        assert_eq!(replica.execute_get(1).await.unwrap().as_deref(), Some("abc"));
        replica.execute_delete(1).await.unwrap();
        replica.execute_delete(1).await.unwrap();
        assert_eq!(replica.store_len().await, 0);
    }
}
