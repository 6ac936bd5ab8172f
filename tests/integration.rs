//! Integration tests for quorumkv

use quorumkv::cluster::{ReplicaId, StaticDirectory};
use quorumkv::common::{ClusterConfig, Operation, PaxosConfig, Proposal, TwoPcConfig};
use quorumkv::paxos::{Acceptor, Faults, PaxosCoordinator, PaxosReplica};
use quorumkv::twopc::{Participant, TwoPcCoordinator, TwoPcReplica, TxnStatus};
use quorumkv::ReplicationCoordinator;
use std::sync::Arc;
use std::time::Duration;

struct PaxosCluster {
    replicas: Vec<Arc<PaxosReplica>>,
    coordinator: PaxosCoordinator,
}

fn paxos_cluster(size: u32, faulty: &[u32]) -> PaxosCluster {
    let cluster = ClusterConfig::local(size, 6001);
    let config = PaxosConfig::default();
    let directory: Arc<StaticDirectory<dyn Acceptor>> = Arc::new(StaticDirectory::new());

    let mut replicas = Vec::new();
    for id in cluster.ids() {
        let faults = if faulty.contains(&id.0) {
            Faults::down_on_prepare()
        } else {
            Faults::none()
        };
        let replica = Arc::new(
            PaxosReplica::new(id, &cluster, &config)
                .unwrap()
                .with_faults(faults),
        );
        directory.register(id, replica.clone());
        replicas.push(replica);
    }

    let coordinator = PaxosCoordinator::new(cluster, directory, &config).unwrap();
    PaxosCluster {
        replicas,
        coordinator,
    }
}

struct TwoPcCluster {
    replicas: Vec<Arc<TwoPcReplica>>,
    directory: Arc<StaticDirectory<dyn Participant>>,
    coordinator: TwoPcCoordinator,
}

fn twopc_cluster(size: u32) -> TwoPcCluster {
    let cluster = ClusterConfig::local(size, 6001);
    let directory: Arc<StaticDirectory<dyn Participant>> = Arc::new(StaticDirectory::new());

    let mut replicas = Vec::new();
    for id in cluster.ids() {
        let replica = Arc::new(TwoPcReplica::new(id, &cluster).unwrap());
        directory.register(id, replica.clone());
        replicas.push(replica);
    }

    let config = TwoPcConfig {
        retry_backoff_ms: 10,
        workers: None,
    };
    let coordinator = TwoPcCoordinator::new(cluster, directory.clone(), &config).unwrap();
    TwoPcCluster {
        replicas,
        directory,
        coordinator,
    }
}

#[tokio::test]
async fn test_paxos_put_then_get() {
    let c = paxos_cluster(5, &[]);

    assert_eq!(
        c.coordinator.put(1, "abc".into()).await.unwrap(),
        "Key 1 was successfully inserted"
    );
    assert_eq!(c.coordinator.get(1).await.unwrap(), "abc");

    for replica in &c.replicas {
        assert_eq!(replica.execute_get(1).await.as_deref(), Some("abc"));
        assert!(replica.accepted_proposal().await.is_none());
    }
}

#[tokio::test]
async fn test_twopc_unreachable_replica_aborts_without_mutation() {
    let c = twopc_cluster(5);
    c.directory.mark_down(ReplicaId(3));

    let status = c
        .coordinator
        .two_phase_protocol(&Operation::put(1, "abc"))
        .await;
    assert_eq!(status, TxnStatus::Aborted);
    assert_eq!(status.code(), 400);

    tokio::time::sleep(Duration::from_millis(50)).await;
    for replica in &c.replicas {
        assert_eq!(replica.store_len().await, 0);
    }
}

#[tokio::test]
async fn test_paxos_two_of_five_down_still_commits() {
    let c = paxos_cluster(5, &[1, 2]);

    assert_eq!(
        c.coordinator.put(1, "abc".into()).await.unwrap(),
        "Key 1 was successfully inserted"
    );
    assert_eq!(c.coordinator.get(1).await.unwrap(), "abc");

    // Faulty replicas never got past prepare
    assert_eq!(c.replicas[0].store_len().await, 0);
    assert_eq!(c.replicas[1].store_len().await, 0);
    for replica in &c.replicas[2..] {
        assert_eq!(replica.execute_get(1).await.as_deref(), Some("abc"));
    }
}

#[tokio::test]
async fn test_paxos_three_of_five_down_has_no_consensus() {
    let c = paxos_cluster(5, &[1, 2, 3]);
    assert_eq!(
        c.coordinator.put(1, "abc".into()).await.unwrap(),
        "Consensus not reached"
    );
    for replica in &c.replicas {
        assert_eq!(replica.store_len().await, 0);
    }
}

#[tokio::test]
async fn test_delete_absent_key() {
    let c = paxos_cluster(5, &[]);
    assert_eq!(
        c.coordinator.delete(42).await.unwrap(),
        "Key 42 not found. DELETE request aborted."
    );
    assert_eq!(
        c.coordinator.get(42).await.unwrap(),
        "Key 42 not found. GET request aborted."
    );

    let t = twopc_cluster(5);
    assert_eq!(
        t.coordinator.delete(42).await.unwrap(),
        "Key 42 not found. DELETE request aborted."
    );
    for replica in &t.replicas {
        assert_eq!(replica.execute_get(42).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_learn_is_idempotent() {
    let cluster = ClusterConfig::local(3, 6001);
    let replica = PaxosReplica::new(ReplicaId(1), &cluster, &PaxosConfig::default())
        .unwrap()
        .with_faults(Faults::none());

    let put = Proposal::new(1, Operation::put(7, "x"));
    replica.learn(put.clone()).await.unwrap();
    let snapshot = (replica.store_len().await, replica.execute_get(7).await);
    replica.learn(put).await.unwrap();
    assert_eq!(
        (replica.store_len().await, replica.execute_get(7).await),
        snapshot
    );

    let delete = Proposal::new(2, Operation::delete(7));
    assert_eq!(
        replica.learn(delete.clone()).await.unwrap(),
        "Key 7 successfully deleted"
    );
    assert_eq!(
        replica.learn(delete).await.unwrap(),
        "Key 7 not found. DELETE request aborted."
    );
    assert_eq!(replica.store_len().await, 0);
}

#[tokio::test]
async fn test_protocols_are_interchangeable() {
    let paxos = paxos_cluster(3, &[]);
    let twopc = twopc_cluster(3);
    let strategies = [
        &paxos.coordinator as &dyn ReplicationCoordinator,
        &twopc.coordinator as &dyn ReplicationCoordinator,
    ];

    for coordinator in strategies {
        assert_eq!(
            coordinator.put(5, "v".into()).await.unwrap(),
            "Key 5 was successfully inserted"
        );
    }
}
