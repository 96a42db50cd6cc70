//! Shared test harness for ecache integration tests.
//!
//! Provides [`LocalCluster`]: N reference cache nodes on loopback ports that
//! can be killed and restarted, plus helpers to build clients against them.

use std::net::SocketAddr;
use std::sync::Arc;

use ecache_client::{Client, ClientConfig};
use ecache_node::{CacheNode, MemoryChunkStore, NodeHandle};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::info;

/// Memory limit for each test node.
const MAX_BYTES: u64 = 256 * 1024 * 1024;

/// A cluster of reference nodes bound to `127.0.0.1`.
///
/// Node `i` keeps its port and its store across [`kill`](Self::kill) and
/// [`restart`](Self::restart), so a restart looks like a network outage
/// ending. Use [`wipe`](Self::wipe) to simulate lost memory.
pub struct LocalCluster {
    addrs: Vec<SocketAddr>,
    stores: Vec<Arc<MemoryChunkStore>>,
    handles: Vec<Option<NodeHandle>>,
}

impl LocalCluster {
    /// Start `n` nodes on OS-assigned ports.
    pub async fn start(n: usize) -> Self {
        let mut addrs = Vec::with_capacity(n);
        let mut stores = Vec::with_capacity(n);
        let mut handles = Vec::with_capacity(n);
        for _ in 0..n {
            let store = Arc::new(MemoryChunkStore::new(MAX_BYTES));
            let handle = spawn_node("127.0.0.1:0".parse().unwrap(), store.clone()).await;
            addrs.push(handle.addr());
            stores.push(store);
            handles.push(Some(handle));
        }
        info!(nodes = n, "local cluster started");
        Self {
            addrs,
            stores,
            handles,
        }
    }

    /// Number of nodes, running or not.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Whether the cluster has no nodes.
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// The ordered node list, as `host:port` strings.
    pub fn addrs(&self) -> Vec<String> {
        self.addrs.iter().map(ToString::to_string).collect()
    }

    /// Index of the node listening on `addr`.
    pub fn index_of(&self, addr: &str) -> usize {
        self.addrs
            .iter()
            .position(|a| a.to_string() == addr)
            .unwrap_or_else(|| panic!("{addr} is not a cluster node"))
    }

    /// Node `i`'s chunk store.
    pub fn store(&self, i: usize) -> &Arc<MemoryChunkStore> {
        &self.stores[i]
    }

    /// Whether node `i` is serving.
    pub fn is_running(&self, i: usize) -> bool {
        self.handles[i].is_some()
    }

    /// Stop node `i`, closing its listener and every open connection.
    pub async fn kill(&mut self, i: usize) {
        if let Some(handle) = self.handles[i].take() {
            handle.shutdown().await.unwrap();
            info!(node = i, addr = %self.addrs[i], "node killed");
        }
    }

    /// Bring node `i` back on its old port with its old store.
    pub async fn restart(&mut self, i: usize) {
        if self.handles[i].is_none() {
            let handle = spawn_node(self.addrs[i], self.stores[i].clone()).await;
            self.handles[i] = Some(handle);
            info!(node = i, addr = %self.addrs[i], "node restarted");
        }
    }

    /// Drop everything node `i` stores.
    pub fn wipe(&self, i: usize) {
        self.stores[i].clear();
    }

    /// A client with `d` data and `p` parity chunks dialed to every node.
    pub async fn client(&self, d: usize, p: usize) -> Client {
        self.client_with(test_config(d, p)).await
    }

    /// A client with an explicit config dialed to every node.
    pub async fn client_with(&self, config: ClientConfig) -> Client {
        let mut client = Client::with_config(config).unwrap();
        client.dial(&self.addrs()).await.unwrap();
        client
    }

    /// Stop every running node.
    pub async fn shutdown(mut self) {
        for i in 0..self.len() {
            self.kill(i).await;
        }
    }
}

async fn spawn_node(addr: SocketAddr, store: Arc<MemoryChunkStore>) -> NodeHandle {
    CacheNode::bind(addr, store).await.unwrap().spawn().unwrap()
}

/// Client config with short timeouts, suited to loopback clusters.
pub fn test_config(d: usize, p: usize) -> ClientConfig {
    ClientConfig {
        op_timeout_ms: 2_000,
        reconnect_backoff_ms: 10,
        unhealthy_retry_after_ms: 200,
        ..ClientConfig::with_redundancy(d, p)
    }
}

/// Deterministic pseudo-random bytes.
pub fn test_data_seeded(size: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; size];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}
