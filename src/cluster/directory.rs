//! Replica directory: resolves stable replica ids to live handles

use crate::cluster::ReplicaId;
use crate::common::ClusterConfig;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Resolves a replica id to a handle, or `None` if the replica is down for
/// this round. A later round may resolve it again.
#[async_trait]
pub trait Directory<T: ?Sized + Send + Sync>: Send + Sync {
    async fn resolve(&self, id: ReplicaId) -> Option<Arc<T>>;
}

/// Resolve every cluster member, skipping (and logging) the ones that are down.
/// Result is in cluster order.
pub async fn resolve_reachable<T>(
    directory: &dyn Directory<T>,
    cluster: &ClusterConfig,
) -> Vec<(ReplicaId, Arc<T>)>
where
    T: ?Sized + Send + Sync,
{
    let mut reachable = Vec::with_capacity(cluster.len());
    for id in cluster.ids() {
        match directory.resolve(id).await {
            Some(handle) => reachable.push((id, handle)),
            None => tracing::warn!("Replica {} is down", id),
        }
    }
    reachable
}

/// In-process directory. Handles are registered once; `mark_down` hides a
/// replica from lookups without touching its state.
pub struct StaticDirectory<T: ?Sized> {
    handles: Mutex<BTreeMap<ReplicaId, Arc<T>>>,
    down: Mutex<BTreeSet<ReplicaId>>,
}

impl<T: ?Sized> StaticDirectory<T> {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(BTreeMap::new()),
            down: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn register(&self, id: ReplicaId, handle: Arc<T>) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);
    }

    pub fn mark_down(&self, id: ReplicaId) {
        self.down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    pub fn mark_up(&self, id: ReplicaId) {
        self.down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn is_down(&self, id: ReplicaId) -> bool {
        self.down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    fn lookup(&self, id: ReplicaId) -> Option<Arc<T>> {
        if self.is_down(id) {
            return None;
        }
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

impl<T: ?Sized> Default for StaticDirectory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: ?Sized + Send + Sync> Directory<T> for StaticDirectory<T> {
    async fn resolve(&self, id: ReplicaId) -> Option<Arc<T>> {
        self.lookup(id)
    }
}

/// Directory over HTTP endpoints from the cluster config.
///
/// A replica resolves only if its `/health` endpoint answers within the
/// probe timeout. Protocol modules turn the probed base URL into a handle.
#[derive(Clone)]
pub struct HttpDirectory {
    cluster: ClusterConfig,
    http: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpDirectory {
    pub fn new(cluster: ClusterConfig) -> Self {
        Self {
            cluster,
            http: reqwest::Client::new(),
            probe_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self, id: ReplicaId) -> Option<String> {
        self.cluster
            .endpoint(id)
            .map(|endpoint| format!("http://{}", endpoint.addr))
    }

    /// Base URL of the replica if it is up
    pub async fn probe(&self, id: ReplicaId) -> Option<String> {
        let base = self.base_url(id)?;
        let response = self
            .http
            .get(format!("{}/health", base))
            .timeout(self.probe_timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Some(base),
            Ok(resp) => {
                tracing::debug!("Replica {} health probe returned {}", id, resp.status());
                None
            }
            Err(e) => {
                tracing::debug!("Replica {} health probe failed: {}", id, e);
                None
            }
        }
    }
}
