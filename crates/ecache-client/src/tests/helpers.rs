//! Shared test utilities for ecache-client tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ecache_net::{NetError, Transport};
use ecache_types::{Chunk, NodeAddr};

use crate::{Client, ClientConfig};

type NodeStore = HashMap<(String, u16), Chunk>;

/// In-memory transport with per-node fault injection.
///
/// Every node address gets its own chunk map. Faults:
/// - `down`: requests fail with a connect error.
/// - `delay`: requests sleep first; a delay beyond the request timeout
///   turns into a timeout error.
/// - `fail_next`: the next N requests fail with a transient error.
/// - `corrupt_reads`: fetched payloads come back with a flipped byte.
/// - `reject_puts`: puts are refused.
#[derive(Default)]
pub struct MockTransport {
    stores: Mutex<HashMap<NodeAddr, NodeStore>>,
    down: Mutex<HashSet<NodeAddr>>,
    delays: Mutex<HashMap<NodeAddr, Duration>>,
    flaky: Mutex<HashMap<NodeAddr, u32>>,
    corrupt: Mutex<HashSet<NodeAddr>>,
    reject: Mutex<HashSet<NodeAddr>>,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, node: &NodeAddr, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(node.clone());
        } else {
            set.remove(node);
        }
    }

    pub fn set_delay(&self, node: &NodeAddr, delay: Duration) {
        self.delays.lock().unwrap().insert(node.clone(), delay);
    }

    pub fn fail_next(&self, node: &NodeAddr, count: u32) {
        self.flaky.lock().unwrap().insert(node.clone(), count);
    }

    pub fn corrupt_reads(&self, node: &NodeAddr) {
        self.corrupt.lock().unwrap().insert(node.clone());
    }

    pub fn reject_puts(&self, node: &NodeAddr) {
        self.reject.lock().unwrap().insert(node.clone());
    }

    /// Place a chunk on a node directly, under an arbitrary slot.
    pub fn insert(&self, node: &NodeAddr, key: &str, index: u16, chunk: Chunk) {
        self.stores
            .lock()
            .unwrap()
            .entry(node.clone())
            .or_default()
            .insert((key.to_string(), index), chunk);
    }

    /// Forget everything a node stored, as after a restart.
    pub fn wipe(&self, node: &NodeAddr) {
        self.stores.lock().unwrap().remove(node);
    }

    pub fn stored(&self, node: &NodeAddr, key: &str, index: u16) -> Option<Chunk> {
        self.stores
            .lock()
            .unwrap()
            .get(node)
            .and_then(|store| store.get(&(key.to_string(), index)).cloned())
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    async fn gate(&self, addr: &NodeAddr, timeout: Duration) -> Result<(), NetError> {
        if self.down.lock().unwrap().contains(addr) {
            return Err(NetError::Connect {
                addr: addr.clone(),
                reason: "node is down".into(),
            });
        }

        let flaky = {
            let mut flaky = self.flaky.lock().unwrap();
            match flaky.get_mut(addr) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if flaky {
            return Err(NetError::ConnectionClosed);
        }

        let delay = self.delays.lock().unwrap().get(addr).copied();
        if let Some(delay) = delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(NetError::Timeout {
                    addr: addr.clone(),
                    after: timeout,
                });
            }
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self, addr: &NodeAddr, timeout: Duration) -> Result<(), NetError> {
        self.gate(addr, timeout).await
    }

    async fn put_chunk(
        &self,
        addr: &NodeAddr,
        chunk: &Chunk,
        timeout: Duration,
    ) -> Result<(), NetError> {
        self.gate(addr, timeout).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.reject.lock().unwrap().contains(addr) {
            return Err(NetError::Rejected {
                addr: addr.clone(),
                reason: "out of memory".into(),
            });
        }
        self.insert(addr, &chunk.header.key, chunk.header.index, chunk.clone());
        Ok(())
    }

    async fn get_chunk(
        &self,
        addr: &NodeAddr,
        key: &str,
        index: u16,
        timeout: Duration,
    ) -> Result<Option<Chunk>, NetError> {
        self.gate(addr, timeout).await?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        let mut chunk = self.stored(addr, key, index);
        if self.corrupt.lock().unwrap().contains(addr)
            && let Some(chunk) = chunk.as_mut()
        {
            let mut payload = chunk.payload.to_vec();
            if let Some(byte) = payload.first_mut() {
                *byte ^= 0xFF;
            } else {
                payload.push(0);
            }
            chunk.payload = payload.into();
        }
        Ok(chunk)
    }

    async fn ping(&self, addr: &NodeAddr, timeout: Duration) -> Result<Duration, NetError> {
        self.gate(addr, timeout).await?;
        Ok(Duration::ZERO)
    }
}

/// Generate deterministic, non-repeating test data.
pub fn test_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// `n` distinct node addresses.
pub fn node_list(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("10.0.0.{}:6378", i + 1)).collect()
}

/// A client dialed against `n` mock nodes.
pub async fn mock_client(config: ClientConfig, n: usize) -> (Client, Arc<MockTransport>) {
    let mock = MockTransport::new();
    let client = dialed_client(config, n, mock.clone()).await;
    (client, mock)
}

/// A client dialed against `n` nodes of an existing mock.
pub async fn dialed_client(config: ClientConfig, n: usize, mock: Arc<MockTransport>) -> Client {
    let mut client = Client::with_transport(config, mock).unwrap();
    client.dial(&node_list(n)).await.unwrap();
    client
}

/// Config with the given redundancy and a short timeout.
pub fn config(d: usize, p: usize) -> ClientConfig {
    ClientConfig {
        op_timeout_ms: 2_000,
        ..ClientConfig::with_redundancy(d, p)
    }
}
