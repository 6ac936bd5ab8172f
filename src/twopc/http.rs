//! HTTP transport for two-phase commit replicas

use crate::cluster::{Directory, HttpDirectory, RemoteEndpoint, ReplicaId};
use crate::common::{Key, Method, Result};
use crate::twopc::{ClientId, Participant};
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

type ReplicaState = Arc<dyn Participant>;

/// Body of prepare and commit votes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub method: Method,
    pub key: Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub client_id: ClientId,
}

/// Internal API served by each 2PC replica
pub fn replica_router(replica: Arc<dyn Participant>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/twopc/prepare", post(prepare))
        .route("/twopc/commit", post(commit))
        .route(
            "/twopc/store/:key",
            get(read_key).put(write_key).delete(remove_key),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(replica)
}

async fn health(State(replica): State<ReplicaState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "replica": replica.id() }))
}

async fn prepare(State(replica): State<ReplicaState>, Json(req): Json<VoteRequest>) -> Response {
    reply(
        replica
            .confirm_prepare(req.method, req.key, req.client_id)
            .await,
    )
}

async fn commit(State(replica): State<ReplicaState>, Json(req): Json<VoteRequest>) -> Response {
    reply(
        replica
            .confirm_commit(req.method, req.key, req.value, req.client_id)
            .await,
    )
}

async fn read_key(State(replica): State<ReplicaState>, Path(key): Path<Key>) -> Response {
    reply(replica.execute_get(key).await)
}

async fn write_key(
    State(replica): State<ReplicaState>,
    Path(key): Path<Key>,
    Json(value): Json<String>,
) -> Response {
    reply(replica.execute_put(key, value).await)
}

async fn remove_key(State(replica): State<ReplicaState>, Path(key): Path<Key>) -> Response {
    reply(replica.execute_delete(key).await)
}

fn reply<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => (e.to_http_status(), e.to_string()).into_response(),
    }
}

/// 2PC replica reached over HTTP
pub struct RemoteTwoPcReplica {
    endpoint: RemoteEndpoint,
}

impl RemoteTwoPcReplica {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Participant for RemoteTwoPcReplica {
    fn id(&self) -> ReplicaId {
        self.endpoint.id()
    }

    async fn confirm_prepare(&self, method: Method, key: Key, client: ClientId) -> Result<bool> {
        let req = VoteRequest {
            method,
            key,
            value: None,
            client_id: client,
        };
        self.endpoint.post("/twopc/prepare", &req).await
    }

    async fn confirm_commit(
        &self,
        method: Method,
        key: Key,
        value: Option<String>,
        client: ClientId,
    ) -> Result<bool> {
        let req = VoteRequest {
            method,
            key,
            value,
            client_id: client,
        };
        self.endpoint.post("/twopc/commit", &req).await
    }

    async fn execute_get(&self, key: Key) -> Result<Option<String>> {
        self.endpoint.get(&format!("/twopc/store/{}", key)).await
    }

    async fn execute_put(&self, key: Key, value: String) -> Result<()> {
        self.endpoint
            .put(&format!("/twopc/store/{}", key), &value)
            .await
    }

    async fn execute_delete(&self, key: Key) -> Result<()> {
        self.endpoint.delete(&format!("/twopc/store/{}", key)).await
    }
}

#[async_trait]
impl Directory<dyn Participant> for HttpDirectory {
    async fn resolve(&self, id: ReplicaId) -> Option<Arc<dyn Participant>> {
        let base = self.probe(id).await?;
        let endpoint = RemoteEndpoint::new(id, base, self.client().clone());
        Some(Arc::new(RemoteTwoPcReplica::new(endpoint)))
    }
}
