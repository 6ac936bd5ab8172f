//! Common utilities and types shared across quorumkv

pub mod config;
pub mod error;
pub mod operation;
pub mod store;

pub use config::{ClusterConfig, Config, PaxosConfig, Protocol, ReplicaEndpoint, TwoPcConfig};
pub use error::{Error, Result};
pub use operation::{
    Key, Method, Operation, Promise, PromiseStatus, Proposal, ProposalId, ProposalIdGenerator,
};
pub use store::KeyValueStore;
