//! Configuration for quorumkv deployments

use crate::cluster::ReplicaId;
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "quorumkv.toml";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Replication protocol used by this deployment
    #[serde(default)]
    pub protocol: Protocol,

    /// Bind address for the client-facing HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub paxos: PaxosConfig,

    #[serde(default)]
    pub twopc: TwoPcConfig,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
            cluster: ClusterConfig::default(),
            paxos: PaxosConfig::default(),
            twopc: TwoPcConfig::default(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file layered with `QUORUMKV_*` env vars.
    ///
    /// Nested keys use a double underscore, e.g. `QUORUMKV_PAXOS__CALL_TIMEOUT_MS`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("QUORUMKV")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;

        let p = self.paxos.failure_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidConfig(format!(
                "paxos.failure_probability {} outside [0, 1]",
                p
            )));
        }

        if self.paxos.call_timeout_ms == 0 {
            return Err(Error::InvalidConfig("paxos.call_timeout_ms must be > 0".into()));
        }

        Ok(())
    }
}

/// Replication protocol, selected at deployment time
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Paxos,
    Twopc,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Paxos => write!(f, "paxos"),
            Protocol::Twopc => write!(f, "twopc"),
        }
    }
}

/// One replica endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaEndpoint {
    pub id: ReplicaId,
    pub addr: SocketAddr,
}

/// Fixed cluster membership. Immutable once a coordinator is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub replicas: Vec<ReplicaEndpoint>,
}

/// Size of the reference deployment
pub const DEFAULT_CLUSTER_SIZE: u32 = 5;

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::local(DEFAULT_CLUSTER_SIZE, 6001)
    }
}

impl ClusterConfig {
    /// `size` replicas on 127.0.0.1, ids 1..=size, consecutive ports
    pub fn local(size: u32, base_port: u16) -> Self {
        let replicas = (1..=size)
            .map(|id| ReplicaEndpoint {
                id: ReplicaId(id),
                addr: SocketAddr::from(([127, 0, 0, 1], base_port + (id - 1) as u16)),
            })
            .collect();
        Self { replicas }
    }

    pub fn ids(&self) -> Vec<ReplicaId> {
        self.replicas.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn contains(&self, id: ReplicaId) -> bool {
        self.replicas.iter().any(|r| r.id == id)
    }

    pub fn endpoint(&self, id: ReplicaId) -> Option<&ReplicaEndpoint> {
        self.replicas.iter().find(|r| r.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replicas.is_empty() {
            return Err(Error::EmptyCluster);
        }
        let mut seen = HashSet::new();
        for replica in &self.replicas {
            if !seen.insert(replica.id) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate replica id {}",
                    replica.id
                )));
            }
        }
        Ok(())
    }
}

/// Paxos coordinator and acceptor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaxosConfig {
    /// Bound on each prepare/accept/learn call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Chance that a replica plays dead on prepare/accept
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,
}

fn default_call_timeout() -> u64 {
    20_000
}
fn default_failure_probability() -> f64 {
    0.01
}

impl Default for PaxosConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            failure_probability: default_failure_probability(),
        }
    }
}

impl PaxosConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Two-phase commit coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoPcConfig {
    /// Wait before re-checking a replica that refused to confirm
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Worker pool size; defaults to the replica count
    #[serde(default)]
    pub workers: Option<usize>,
}

fn default_retry_backoff() -> u64 {
    2_000
}

impl Default for TwoPcConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff(),
            workers: None,
        }
    }
}

impl TwoPcConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
