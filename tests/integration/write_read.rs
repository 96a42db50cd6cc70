//! Integration test: write/read over real TCP.
//!
//! Every node healthy. Values of many sizes, several redundancy settings,
//! several clients sharing one cluster.

use std::sync::Arc;

use ecache_client::{ClientConfig, ClientError};
use ecache_integration_tests::{LocalCluster, test_config, test_data_seeded};

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_example_value_roundtrip() {
    let c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;

    client.set("foo", b"Hello infinity!").await.unwrap();
    assert_eq!(client.get("foo").await.unwrap(), b"Hello infinity!");

    // One chunk per node: d + p == n.
    for i in 0..3 {
        assert_eq!(c.store(i).stats().chunks, 1, "node {i}");
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(20000)]
async fn test_many_sizes_and_redundancies() {
    let c = LocalCluster::start(6).await;
    for (d, p) in [(1, 0), (2, 1), (3, 0), (4, 2), (2, 4)] {
        let client = c.client(d, p).await;
        for (i, size) in [0usize, 1, 7, 100, 4095, 4096, 65_537].into_iter().enumerate() {
            let key = format!("size/{d}/{p}/{size}");
            let data = test_data_seeded(size, i as u64);
            client.set(&key, &data).await.unwrap();
            assert_eq!(client.get(&key).await.unwrap(), data, "{key}");
        }
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_large_value() {
    let c = LocalCluster::start(6).await;
    let client = c.client_with(ClientConfig {
        chunk_size_hint: 256 * 1024,
        ..test_config(4, 2)
    })
    .await;

    let data = test_data_seeded(1 << 20, 7);
    client.set("big", &data).await.unwrap();
    assert_eq!(client.get("big").await.unwrap(), data);
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_overwrite_returns_latest() {
    let c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;

    client.set("k", &test_data_seeded(5000, 1)).await.unwrap();
    client.set("k", b"short").await.unwrap();
    assert_eq!(client.get("k").await.unwrap(), b"short");
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_missing_key() {
    let c = LocalCluster::start(3).await;
    let client = c.client(2, 1).await;

    match client.get("never-written").await {
        Err(ClientError::KeyNotFound(key)) => assert_eq!(key, "never-written"),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_clients_with_same_node_list_share_data() {
    let c = LocalCluster::start(5).await;
    let writer = c.client(3, 2).await;
    let reader = c.client(3, 2).await;

    for i in 0..20 {
        let key = format!("shared-{i}");
        writer.set(&key, &test_data_seeded(300 + i, i as u64)).await.unwrap();
    }
    for i in 0..20 {
        let key = format!("shared-{i}");
        assert_eq!(reader.placement(&key).unwrap(), writer.placement(&key).unwrap());
        assert_eq!(
            reader.get(&key).await.unwrap(),
            test_data_seeded(300 + i, i as u64)
        );
    }
    c.shutdown().await;
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_chunks_land_on_placement_nodes() {
    let c = LocalCluster::start(7).await;
    let client = c.client(3, 2).await;
    client.set("object", &test_data_seeded(999, 3)).await.unwrap();

    for (index, node) in client.placement("object").unwrap().iter().enumerate() {
        let i = c.index_of(node.as_str());
        let chunk = c.store(i).get("object", index as u16).unwrap();
        assert_eq!(chunk.header.index as usize, index);
        assert!(chunk.verify());
    }
    let total: usize = (0..c.len()).map(|i| c.store(i).stats().chunks).sum();
    assert_eq!(total, 5);
    c.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20000)]
async fn test_concurrent_clients() {
    let c = LocalCluster::start(5).await;
    let client = Arc::new(c.client(3, 2).await);

    let mut tasks = Vec::new();
    for t in 0..8u64 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..10u64 {
                let key = format!("task-{t}-{i}");
                let data = test_data_seeded(1000 + (i as usize) * 37, t * 100 + i);
                client.set(&key, &data).await.unwrap();
                assert_eq!(client.get(&key).await.unwrap(), data);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    c.shutdown().await;
}
