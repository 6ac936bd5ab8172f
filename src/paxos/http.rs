//! HTTP transport for Paxos replicas

use crate::cluster::{Directory, HttpDirectory, RemoteEndpoint, ReplicaId};
use crate::common::{Promise, Proposal, Result};
use crate::paxos::Acceptor;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

type ReplicaState = Arc<dyn Acceptor>;

/// Internal API served by each Paxos replica
pub fn replica_router(replica: Arc<dyn Acceptor>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/paxos/prepare", post(prepare))
        .route("/paxos/accept", post(accept))
        .route("/paxos/learn", post(learn))
        .layer(TraceLayer::new_for_http())
        .with_state(replica)
}

async fn health(State(replica): State<ReplicaState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "replica": replica.id() }))
}

async fn prepare(State(replica): State<ReplicaState>, Json(proposal): Json<Proposal>) -> Response {
    reply(replica.prepare(proposal).await)
}

async fn accept(State(replica): State<ReplicaState>, Json(proposal): Json<Proposal>) -> Response {
    reply(replica.accept(proposal).await)
}

async fn learn(State(replica): State<ReplicaState>, Json(proposal): Json<Proposal>) -> Response {
    reply(replica.learn(proposal).await)
}

fn reply<T: serde::Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => (e.to_http_status(), e.to_string()).into_response(),
    }
}

/// Paxos replica reached over HTTP
pub struct RemotePaxosReplica {
    endpoint: RemoteEndpoint,
}

impl RemotePaxosReplica {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Acceptor for RemotePaxosReplica {
    fn id(&self) -> ReplicaId {
        self.endpoint.id()
    }

    async fn prepare(&self, proposal: Proposal) -> Result<Promise> {
        self.endpoint.post("/paxos/prepare", &proposal).await
    }

    async fn accept(&self, proposal: Proposal) -> Result<bool> {
        self.endpoint.post("/paxos/accept", &proposal).await
    }

    async fn learn(&self, proposal: Proposal) -> Result<String> {
        self.endpoint.post("/paxos/learn", &proposal).await
    }
}

#[async_trait]
impl Directory<dyn Acceptor> for HttpDirectory {
    async fn resolve(&self, id: ReplicaId) -> Option<Arc<dyn Acceptor>> {
        let base = self.probe(id).await?;
        let endpoint = RemoteEndpoint::new(id, base, self.client().clone());
        Some(Arc::new(RemotePaxosReplica::new(endpoint)))
    }
}
