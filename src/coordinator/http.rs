//! HTTP API for the coordinator
//!
//! Keys are integers. Every answer is the plain-text result of the
//! operation, including protocol-level failures such as a missed quorum.

use crate::common::{Key, Result};
use crate::coordinator::ReplicationCoordinator;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct CoordState {
    pub coordinator: Arc<dyn ReplicationCoordinator>,
}

pub fn create_router(state: CoordState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
        .merge(kv_routes(state))
}

/// Client key routes. Every replica mounts them too, forwarding to the
/// shared coordinator.
pub fn kv_routes(state: CoordState) -> Router {
    Router::new()
        .route("/kv/:key", get(get_key).put(put_key).delete(delete_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "healthy",
        "protocol": state.coordinator.protocol(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_key(State(state): State<CoordState>, Path(key): Path<Key>) -> impl IntoResponse {
    respond("GET", key, state.coordinator.get(key).await)
}

async fn put_key(
    State(state): State<CoordState>,
    Path(key): Path<Key>,
    value: String,
) -> impl IntoResponse {
    respond("PUT", key, state.coordinator.put(key, value).await)
}

async fn delete_key(State(state): State<CoordState>, Path(key): Path<Key>) -> impl IntoResponse {
    respond("DELETE", key, state.coordinator.delete(key).await)
}

fn respond(method: &str, key: Key, result: Result<String>) -> (StatusCode, String) {
    match result {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            tracing::error!("{} {} failed: {}", method, key, e);
            (e.to_http_status(), e.to_string())
        }
    }
}
