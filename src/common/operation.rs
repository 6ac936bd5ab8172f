//! Operation, proposal and promise types shared by both protocols

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Store key
pub type Key = i64;

/// Proposal id (ballot number). Generated ids start at 1.
pub type ProposalId = u64;

/// Request method of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Del,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Put => write!(f, "PUT"),
            Method::Del => write!(f, "DELETE"),
        }
    }
}

/// A requested mutation (or read) against the store.
///
/// Only `Put` carries a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum Operation {
    Get { key: Key },
    Put { key: Key, value: String },
    Del { key: Key },
}

impl Operation {
    pub fn get(key: Key) -> Self {
        Operation::Get { key }
    }

    pub fn put(key: Key, value: impl Into<String>) -> Self {
        Operation::Put {
            key,
            value: value.into(),
        }
    }

    pub fn delete(key: Key) -> Self {
        Operation::Del { key }
    }

    pub fn method(&self) -> Method {
        match self {
            Operation::Get { .. } => Method::Get,
            Operation::Put { .. } => Method::Put,
            Operation::Del { .. } => Method::Del,
        }
    }

    pub fn key(&self) -> Key {
        match self {
            Operation::Get { key } | Operation::Put { key, .. } | Operation::Del { key } => *key,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Operation::Put { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Put { key, value } => write!(f, "PUT({}, {})", key, value),
            other => write!(f, "{}({})", other.method(), other.key()),
        }
    }
}

/// A uniquely numbered bid for the cluster to agree on one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub operation: Operation,
}

impl Proposal {
    pub fn new(id: ProposalId, operation: Operation) -> Self {
        Self { id, operation }
    }
}

/// Acceptor answer to a prepare request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PromiseStatus {
    Promised,
    Accepted,
    Rejected,
}

/// Reply to `prepare`. When the status is `Accepted` the proposal is the
/// one the acceptor accepted earlier, not the one being prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promise {
    pub status: PromiseStatus,
    pub proposal: Option<Proposal>,
}

impl Promise {
    pub fn promised(proposal: Proposal) -> Self {
        Self {
            status: PromiseStatus::Promised,
            proposal: Some(proposal),
        }
    }

    pub fn accepted(prior: Proposal) -> Self {
        Self {
            status: PromiseStatus::Accepted,
            proposal: Some(prior),
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: PromiseStatus::Rejected,
            proposal: None,
        }
    }

    /// Counts toward the prepare quorum
    pub fn is_vote(&self) -> bool {
        matches!(
            self.status,
            PromiseStatus::Promised | PromiseStatus::Accepted
        )
    }
}

/// Hands out strictly increasing proposal ids for the lifetime of a coordinator.
#[derive(Debug)]
pub struct ProposalIdGenerator {
    next: Mutex<ProposalId>,
}

impl ProposalIdGenerator {
    pub fn new() -> Self {
        Self {
            next: Mutex::new(1),
        }
    }

    pub fn next_id(&self) -> ProposalId {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let id = *next;
        *next += 1;
        id
    }

    pub fn create_proposal(&self, operation: Operation) -> Proposal {
        Proposal::new(self.next_id(), operation)
    }
}

impl Default for ProposalIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
