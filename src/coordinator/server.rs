//! Coordinator server
//!
//! Boots every replica of the configured cluster in this process, each on
//! its own HTTP endpoint, then serves the client API on `bind_addr`.

use crate::cluster::{Directory, HttpDirectory, ReplicaId};
use crate::common::{Config, Protocol, Result};
use crate::coordinator::http::{create_router, kv_routes, CoordState};
use crate::coordinator::ReplicationCoordinator;
use crate::paxos::{self, Acceptor, PaxosCoordinator, PaxosReplica};
use crate::twopc::{self, Participant, TwoPcCoordinator, TwoPcReplica};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct Server {
    config: Config,
    coordinator: Arc<dyn ReplicationCoordinator>,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let coordinator = build_coordinator(&config)?;
        Ok(Self {
            config,
            coordinator,
        })
    }

    /// Coordinator shared by the client API and every replica's `/kv` routes
    pub fn coordinator(&self) -> Arc<dyn ReplicationCoordinator> {
        self.coordinator.clone()
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting coordinator ({})", self.config.protocol);
        tracing::info!("  HTTP API: {}", listener.local_addr()?);
        tracing::info!("  Replicas: {}", self.config.cluster.len());

        let replicas = start_replicas(&self.config, self.coordinator.clone()).await?;
        let router = create_router(CoordState {
            coordinator: self.coordinator.clone(),
        });

        tracing::info!("✓ Coordinator ready");

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        self.coordinator.shutdown();
        for handle in replicas {
            handle.abort();
        }

        if let Err(e) = result {
            tracing::error!("HTTP server error: {}", e);
            return Err(e.into());
        }
        tracing::info!("Coordinator stopped");
        Ok(())
    }
}

/// Coordinator for the configured protocol, reaching replicas over HTTP
pub fn build_coordinator(config: &Config) -> Result<Arc<dyn ReplicationCoordinator>> {
    let directory = HttpDirectory::new(config.cluster.clone());
    let coordinator: Arc<dyn ReplicationCoordinator> = match config.protocol {
        Protocol::Paxos => {
            let directory: Arc<dyn Directory<dyn Acceptor>> = Arc::new(directory);
            Arc::new(PaxosCoordinator::new(
                config.cluster.clone(),
                directory,
                &config.paxos,
            )?)
        }
        Protocol::Twopc => {
            let directory: Arc<dyn Directory<dyn Participant>> = Arc::new(directory);
            Arc::new(TwoPcCoordinator::new(
                config.cluster.clone(),
                directory,
                &config.twopc,
            )?)
        }
    };
    Ok(coordinator)
}

/// Router of the local replica `id`, for the configured protocol, with the
/// client key routes forwarding to `coordinator`
pub fn replica_app(
    config: &Config,
    id: ReplicaId,
    coordinator: Arc<dyn ReplicationCoordinator>,
) -> Result<Router> {
    let router = match config.protocol {
        Protocol::Paxos => {
            let replica = PaxosReplica::new(id, &config.cluster, &config.paxos)?;
            paxos::replica_router(Arc::new(replica))
        }
        Protocol::Twopc => {
            let replica = TwoPcReplica::new(id, &config.cluster)?;
            twopc::replica_router(Arc::new(replica))
        }
    };
    Ok(router.merge(kv_routes(CoordState { coordinator })))
}

/// Bind and serve every replica endpoint of the cluster
pub async fn start_replicas(
    config: &Config,
    coordinator: Arc<dyn ReplicationCoordinator>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(config.cluster.len());
    for endpoint in &config.cluster.replicas {
        let router = replica_app(config, endpoint.id, coordinator.clone())?;
        let listener = TcpListener::bind(endpoint.addr).await?;
        tracing::info!("  Replica {} listening on {}", endpoint.id, endpoint.addr);
        handles.push(spawn_replica(endpoint.id, listener, router));
    }
    Ok(handles)
}

pub fn spawn_replica(id: ReplicaId, listener: TcpListener, router: Router) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("Replica {} server error: {}", id, e);
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
