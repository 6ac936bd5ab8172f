//! Error types for quorumkv

use crate::cluster::ReplicaId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Replica Errors ===
    #[error("Replica {replica} unreachable: {reason}")]
    ReplicaUnreachable { replica: ReplicaId, reason: String },

    #[error("Replica {replica} is locked by another client")]
    LockConflict { replica: ReplicaId },

    // === Coordination Errors ===
    #[error("Consensus not reached in {phase} phase: {votes}/{quorum} votes")]
    QuorumNotReached {
        phase: &'static str,
        votes: usize,
        quorum: usize,
    },

    #[error("Cluster has no replicas")]
    EmptyCluster,

    #[error("Unknown replica: {0}")]
    UnknownReplica(ReplicaId),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ReplicaUnreachable { .. }
                | Error::QuorumNotReached { .. }
                | Error::LockConflict { .. }
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::UnknownReplica(_) => StatusCode::NOT_FOUND,
            Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::LockConflict { .. } => StatusCode::CONFLICT,
            Error::ReplicaUnreachable { .. }
            | Error::QuorumNotReached { .. }
            | Error::EmptyCluster => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
