//! Replica failure and recovery scenarios

use quorumkv::cluster::{ReplicaId, StaticDirectory};
use quorumkv::common::{ClusterConfig, Method, Operation, PaxosConfig, TwoPcConfig};
use quorumkv::paxos::{Acceptor, Faults, PaxosCoordinator, PaxosReplica};
use quorumkv::twopc::{Participant, TwoPcCoordinator, TwoPcReplica, TxnStatus};
use quorumkv::ReplicationCoordinator;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_paxos_replica_rejoins_with_its_state() {
    let cluster = ClusterConfig::local(3, 6001);
    let config = PaxosConfig::default();
    let directory: Arc<StaticDirectory<dyn Acceptor>> = Arc::new(StaticDirectory::new());
    let mut replicas = Vec::new();
    for id in cluster.ids() {
        let replica = Arc::new(
            PaxosReplica::new(id, &cluster, &config)
                .unwrap()
                .with_faults(Faults::none()),
        );
        directory.register(id, replica.clone());
        replicas.push(replica);
    }
    let coordinator = PaxosCoordinator::new(cluster, directory.clone(), &config).unwrap();

    coordinator.put(1, "before".into()).await.unwrap();

    // Replica 3 misses the next write; quorum is taken over the two reachable
    directory.mark_down(ReplicaId(3));
    coordinator.put(2, "during".into()).await.unwrap();
    assert_eq!(replicas[2].execute_get(2).await, None);

    directory.mark_up(ReplicaId(3));
    assert_eq!(replicas[2].execute_get(1).await.as_deref(), Some("before"));
    assert_eq!(coordinator.get(2).await.unwrap(), "during");

    // Its ballot caught up with the round it rejoined
    assert_eq!(
        replicas[2].highest_seen_id().await,
        replicas[0].highest_seen_id().await
    );
}

#[tokio::test]
async fn test_twopc_aborted_run_leaks_locks() {
    let cluster = ClusterConfig::local(3, 6001);
    let directory: Arc<StaticDirectory<dyn Participant>> = Arc::new(StaticDirectory::new());
    let mut replicas = Vec::new();
    for id in cluster.ids() {
        let replica = Arc::new(TwoPcReplica::new(id, &cluster).unwrap());
        directory.register(id, replica.clone());
        replicas.push(replica);
    }
    let config = TwoPcConfig {
        retry_backoff_ms: 5,
        workers: None,
    };
    let coordinator = TwoPcCoordinator::new(cluster, directory, &config).unwrap();

    // A client that prepared and vanished
    let ghost = Uuid::new_v4();
    assert!(replicas[0]
        .confirm_prepare(Method::Put, 1, ghost)
        .await
        .unwrap());

    let status = coordinator
        .two_phase_protocol(&Operation::put(1, "abc"))
        .await;
    assert_eq!(status, TxnStatus::Aborted);
    assert_eq!(replicas[0].lock_holder().await, Some(ghost));

    // No rollback: the aborted run left its own locks on the other replicas
    let orphan = replicas[1].lock_holder().await;
    assert!(orphan.is_some());
    assert_ne!(orphan, Some(ghost));
    assert_eq!(replicas[2].lock_holder().await, orphan);

    // Releasing the first lock is not enough
    assert!(replicas[0]
        .confirm_commit(Method::Put, 1, None, ghost)
        .await
        .unwrap());
    let status = coordinator
        .two_phase_protocol(&Operation::put(1, "abc"))
        .await;
    assert_eq!(status, TxnStatus::Aborted);
    for replica in &replicas {
        assert_eq!(replica.store_len().await, 0);
    }
}

#[tokio::test]
async fn test_concurrent_proposals_respect_ballots() {
    let cluster = ClusterConfig::local(5, 6001);
    let config = PaxosConfig::default();
    let directory: Arc<StaticDirectory<dyn Acceptor>> = Arc::new(StaticDirectory::new());
    let mut replicas = Vec::new();
    for id in cluster.ids() {
        let replica = Arc::new(
            PaxosReplica::new(id, &cluster, &config)
                .unwrap()
                .with_faults(Faults::flaky(0.2)),
        );
        directory.register(id, replica.clone());
        replicas.push(replica);
    }
    let coordinator = Arc::new(PaxosCoordinator::new(cluster, directory, &config).unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator.put(i % 4, format!("v{}", i)).await
        }));
    }
    for handle in handles {
        let text = handle.await.unwrap().unwrap();
        assert!(
            text.ends_with("was successfully inserted") || text == "Consensus not reached",
            "unexpected result: {}",
            text
        );
    }

    for replica in &replicas {
        let (highest, accepted) = replica.ballot().await;
        if let Some(accepted) = accepted {
            assert!(accepted.id <= highest);
        }
        assert!(highest <= 20);
    }
}
