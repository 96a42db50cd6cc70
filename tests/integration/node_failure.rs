//! Integration test: node failure.
//!
//! Kill, wipe and corrupt nodes; verify reads survive up to `p` losses and
//! fail cleanly beyond that.

use std::time::{Duration, Instant};

use ecache_client::{ClientConfig, ClientError};
use ecache_integration_tests::{LocalCluster, test_config, test_data_seeded};
use ecache_net::NodeHealth;

/// Longer than the test config's suspension window.
const SETTLE: Duration = Duration::from_millis(300);

#[tokio::test]
#[ntest::timeout(20000)]
async fn test_any_single_node_down() {
    let mut c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;
    client.set("foo", b"Hello infinity!").await.unwrap();

    for i in 0..3 {
        c.kill(i).await;
        assert_eq!(
            client.get("foo").await.unwrap(),
            b"Hello infinity!",
            "node {i} down"
        );
        c.restart(i).await;
        tokio::time::sleep(SETTLE).await;
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_two_nodes_down_is_insufficient() {
    let mut c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;
    client.set("foo", b"Hello infinity!").await.unwrap();

    let placement = client.placement("foo").unwrap();
    c.kill(c.index_of(placement[0].as_str())).await;
    c.kill(c.index_of(placement[1].as_str())).await;

    match client.get("foo").await {
        Err(ClientError::InsufficientShards { needed: 2, found: 1 }) => {}
        other => panic!("expected InsufficientShards, got {other:?}"),
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(20000)]
async fn test_k4_m2_survives_two_kills() {
    let mut c = LocalCluster::start(6).await;
    let client = c.client(4, 2).await;

    let mut values = Vec::new();
    for i in 0..20u64 {
        let key = format!("obj-{i:03}");
        let data = test_data_seeded(2000 + i as usize * 50, i);
        client.set(&key, &data).await.unwrap();
        values.push((key, data));
    }

    c.kill(2).await;
    c.kill(4).await;
    for (key, expected) in &values {
        assert_eq!(&client.get(key).await.unwrap(), expected, "{key}");
    }

    c.kill(5).await;
    for (key, _) in &values {
        assert!(
            matches!(
                client.get(key).await,
                Err(ClientError::InsufficientShards { needed: 4, found: 3 })
            ),
            "{key} should be unreadable with three nodes down"
        );
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_default_quorum_needs_every_node() {
    let mut c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;
    c.kill(1).await;

    match client.set("k", b"v").await {
        Err(ClientError::WriteQuorum { needed: 3, acked }) => assert!(acked <= 2),
        other => panic!("expected WriteQuorum, got {other:?}"),
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_relaxed_quorum_write_during_outage() {
    let mut c = LocalCluster::start(3).await;
    let client = c
        .client_with(ClientConfig {
            write_quorum: Some(2),
            ..test_config(2, 1)
        })
        .await;
    client.set("k", b"old").await.unwrap();

    let down = c.index_of(client.placement("k").unwrap()[2].as_str());
    c.kill(down).await;
    client.set("k", b"new").await.unwrap();
    c.restart(down).await;
    tokio::time::sleep(SETTLE).await;

    // The restarted node still holds a chunk of the old write.
    assert_eq!(client.get("k").await.unwrap(), b"new");
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_wiped_nodes() {
    let c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;
    client.set("k", b"in memory only").await.unwrap();
    let placement = client.placement("k").unwrap();

    c.wipe(c.index_of(placement[0].as_str()));
    assert_eq!(client.get("k").await.unwrap(), b"in memory only");

    c.wipe(c.index_of(placement[1].as_str()));
    assert!(matches!(
        client.get("k").await,
        Err(ClientError::InsufficientShards { needed: 2, found: 1 })
    ));

    c.wipe(c.index_of(placement[2].as_str()));
    assert!(matches!(client.get("k").await, Err(ClientError::KeyNotFound(_))));
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_silently_corrupted_chunks() {
    let c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;
    let data = test_data_seeded(10_000, 42);
    client.set("k", &data).await.unwrap();
    let placement = client.placement("k").unwrap();

    let corrupt = |index: usize| {
        let store = c.store(c.index_of(placement[index].as_str()));
        let mut chunk = store.get("k", index as u16).unwrap();
        let mut payload = chunk.payload.to_vec();
        payload[17] ^= 0x55;
        chunk.payload = payload.into();
        store.insert_unchecked(chunk);
    };

    corrupt(1);
    assert_eq!(client.get("k").await.unwrap(), data);

    corrupt(2);
    assert!(matches!(
        client.get("k").await,
        Err(ClientError::InsufficientShards { needed: 2, found: 1 })
    ));
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_dead_node_does_not_stall_reads() {
    let mut c = LocalCluster::start(3).await;
    let client = c
        .client_with(ClientConfig {
            op_timeout_ms: 30_000,
            ..test_config(2, 1)
        })
        .await;
    client.set("k", b"quick").await.unwrap();

    c.kill(0).await;
    let started = Instant::now();
    assert_eq!(client.get("k").await.unwrap(), b"quick");
    assert!(started.elapsed() < Duration::from_secs(2));
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_health_tracks_outage_and_recovery() {
    let mut c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;
    client.set("k", b"v1").await.unwrap();
    assert!(client.health().iter().all(|(_, h)| h.is_healthy()));

    c.kill(1).await;
    assert!(client.set("k", b"v2").await.is_err());
    let node = client.nodes()[1].clone();
    let health = client
        .health()
        .into_iter()
        .find(|(addr, _)| *addr == node)
        .map(|(_, h)| h)
        .unwrap();
    assert!(
        matches!(health, NodeHealth::Unhealthy { .. } | NodeHealth::Suspended { .. }),
        "{health}"
    );

    c.restart(1).await;
    tokio::time::sleep(SETTLE).await;
    client.set("k", b"v3").await.unwrap();
    assert!(client.health().iter().all(|(_, h)| h.is_healthy()));
    assert_eq!(client.get("k").await.unwrap(), b"v3");
    c.shutdown().await;
}
