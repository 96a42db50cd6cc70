//! TCP connection manager.
//!
//! [`TcpTransport`] keeps a small pool of idle connections per node:
//! - Each request checks out its own connection (opening one on demand),
//!   so concurrent requests to one node never share a stream.
//! - Connections go back to the pool after a clean round-trip, up to
//!   `max_idle_per_node`. A connection that saw any error is dropped.
//! - Transport failures drive the node through [`NodeHealth`] states:
//!   reconnect with exponential backoff, then a fail-fast window.
//!
//! The transport never resends a request. Retry policy belongs to callers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ecache_types::{Chunk, NodeAddr};
use tokio::io::BufStream;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::Transport;
use crate::error::NetError;
use crate::framing::{read_message, write_message};
use crate::health::{HealthState, NodeHealth};
use crate::message::CacheMessage;

/// Default per-connection read/write buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Tuning knobs for [`TcpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Connect attempts made when a request hits an unhealthy node.
    pub reconnect_attempts: u32,
    /// Sleep before the second reconnect attempt; doubled after each one.
    pub reconnect_backoff: Duration,
    /// Fail-fast window after reconnecting has failed.
    pub unhealthy_retry_after: Duration,
    /// Maximum idle connections kept per node.
    pub max_idle_per_node: usize,
    /// Read and write buffer size of each connection.
    pub buffer_size: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(50),
            unhealthy_retry_after: Duration::from_secs(1),
            max_idle_per_node: 4,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// One open, idle-or-in-use connection to a node.
struct Connection {
    stream: BufStream<TcpStream>,
}

impl Connection {
    async fn roundtrip(&mut self, message: &CacheMessage) -> Result<CacheMessage, NetError> {
        write_message(&mut self.stream, message).await?;
        read_message(&mut self.stream).await
    }
}

#[derive(Default)]
struct NodeSlot {
    idle: Vec<Connection>,
    health: HealthState,
}

/// Connection manager over plain TCP.
pub struct TcpTransport {
    config: TcpConfig,
    nodes: Mutex<HashMap<NodeAddr, NodeSlot>>,
}

impl TcpTransport {
    /// Create a transport with the given tuning.
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// The tuning this transport was built with.
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Number of idle pooled connections to `addr`.
    pub fn idle_connections(&self, addr: &NodeAddr) -> usize {
        self.nodes
            .lock()
            .expect("node table lock poisoned")
            .get(addr)
            .map_or(0, |slot| slot.idle.len())
    }

    fn with_slot<T>(&self, addr: &NodeAddr, f: impl FnOnce(&mut NodeSlot) -> T) -> T {
        let mut nodes = self.nodes.lock().expect("node table lock poisoned");
        f(nodes.entry(addr.clone()).or_default())
    }

    // -------------------------------------------------------------------
    // Connection management
    // -------------------------------------------------------------------

    async fn open(
        &self,
        addr: &NodeAddr,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Connection, NetError> {
        let stream = match timeout_at(deadline, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(NetError::Connect {
                    addr: addr.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(NetError::Timeout {
                    addr: addr.clone(),
                    after: timeout,
                });
            }
        };
        stream.set_nodelay(true)?;
        debug!(node = %addr, "opened connection");

        let size = self.config.buffer_size.max(1);
        Ok(Connection {
            stream: BufStream::with_capacity(size, size, stream),
        })
    }

    /// Take a connection to `addr`, reconnecting first if the node is unhealthy.
    async fn checkout(
        &self,
        addr: &NodeAddr,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Connection, NetError> {
        // Some(pooled) on a healthy node, None when a reconnect is due.
        let pooled = self.with_slot(addr, |slot| {
            if let Some(retry_in) = slot.health.suspended_for(Instant::now()) {
                return Err(NetError::Unavailable {
                    addr: addr.clone(),
                    retry_in,
                });
            }
            if !slot.health.is_healthy() {
                // Pooled streams to a failed node are not trusted.
                slot.idle.clear();
                return Ok(None);
            }
            Ok(Some(slot.idle.pop()))
        })?;

        match pooled {
            Some(Some(conn)) => Ok(conn),
            Some(None) => match self.open(addr, deadline, timeout).await {
                Ok(conn) => Ok(conn),
                Err(e) => {
                    self.mark_failed(addr, &e);
                    Err(e)
                }
            },
            None => self.reconnect(addr, deadline, timeout).await,
        }
    }

    async fn reconnect(
        &self,
        addr: &NodeAddr,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Connection, NetError> {
        let attempts = self.config.reconnect_attempts.max(1);
        let mut backoff = self.config.reconnect_backoff;
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.open(addr, deadline, timeout).await {
                Ok(conn) => {
                    self.with_slot(addr, |slot| slot.health.record_success());
                    info!(node = %addr, attempt, "reconnected to node");
                    return Ok(conn);
                }
                Err(e) => {
                    debug!(node = %addr, attempt, error = %e, "reconnect attempt failed");
                    last_err = Some(e);
                }
            }

            if attempt == attempts || Instant::now() + backoff >= deadline {
                break;
            }
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }

        let window = self.config.unhealthy_retry_after;
        self.with_slot(addr, |slot| slot.health.suspend(Instant::now(), window));
        warn!(node = %addr, retry_after = ?window, "could not reconnect, suspending node");

        Err(last_err.unwrap_or_else(|| NetError::Connect {
            addr: addr.clone(),
            reason: "no connect attempt made".into(),
        }))
    }

    fn checkin(&self, addr: &NodeAddr, conn: Connection) {
        let max_idle = self.config.max_idle_per_node;
        self.with_slot(addr, |slot| {
            if slot.health.is_healthy() && slot.idle.len() < max_idle {
                slot.idle.push(conn);
            }
        });
    }

    fn mark_failed(&self, addr: &NodeAddr, error: &NetError) {
        if !error.is_transient() {
            return;
        }
        let was_healthy = self.with_slot(addr, |slot| {
            let was_healthy = slot.health.is_healthy();
            slot.health.record_failure();
            slot.idle.clear();
            was_healthy
        });
        if was_healthy {
            warn!(node = %addr, %error, "node marked unhealthy");
        }
    }

    /// Send one request and wait for its response.
    async fn request(
        &self,
        addr: &NodeAddr,
        message: &CacheMessage,
        timeout: Duration,
    ) -> Result<CacheMessage, NetError> {
        let deadline = Instant::now() + timeout;
        let mut conn = self.checkout(addr, deadline, timeout).await?;

        let result = match timeout_at(deadline, conn.roundtrip(message)).await {
            Ok(result) => result,
            Err(_) => Err(NetError::Timeout {
                addr: addr.clone(),
                after: timeout,
            }),
        };

        match result {
            Ok(response) => {
                self.checkin(addr, conn);
                Ok(response)
            }
            Err(e) => {
                debug!(node = %addr, request = message.kind(), error = %e, "request failed");
                self.mark_failed(addr, &e);
                Err(e)
            }
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(TcpConfig::default())
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, addr: &NodeAddr, timeout: Duration) -> Result<(), NetError> {
        let deadline = Instant::now() + timeout;
        let conn = self.checkout(addr, deadline, timeout).await?;
        self.checkin(addr, conn);
        Ok(())
    }

    async fn put_chunk(
        &self,
        addr: &NodeAddr,
        chunk: &Chunk,
        timeout: Duration,
    ) -> Result<(), NetError> {
        let request = CacheMessage::PutChunk {
            header: chunk.header.clone(),
            payload: chunk.payload.clone(),
        };

        match self.request(addr, &request, timeout).await? {
            CacheMessage::PutAck {
                key, index, ok, reason,
            } if key == chunk.header.key && index == chunk.header.index => {
                if ok {
                    debug!(node = %addr, key = %key, index, size = chunk.payload.len(), "stored chunk");
                    Ok(())
                } else {
                    Err(NetError::Rejected {
                        addr: addr.clone(),
                        reason: reason.unwrap_or_else(|| "no reason given".into()),
                    })
                }
            }
            CacheMessage::Error { message } => Err(NetError::Remote(message)),
            other => Err(NetError::UnexpectedResponse(format!(
                "expected PutAck for {}/{}, got {other:?}",
                chunk.header.key, chunk.header.index
            ))),
        }
    }

    async fn get_chunk(
        &self,
        addr: &NodeAddr,
        key: &str,
        index: u16,
        timeout: Duration,
    ) -> Result<Option<Chunk>, NetError> {
        let request = CacheMessage::GetChunk {
            key: key.to_string(),
            index,
        };

        match self.request(addr, &request, timeout).await? {
            CacheMessage::ChunkResponse {
                key: resp_key,
                index: resp_index,
                chunk,
            } if resp_key == key && resp_index == index => {
                debug!(node = %addr, key, index, found = chunk.is_some(), "fetched chunk");
                Ok(chunk)
            }
            CacheMessage::Error { message } => Err(NetError::Remote(message)),
            other => Err(NetError::UnexpectedResponse(format!(
                "expected ChunkResponse for {key}/{index}, got {other:?}"
            ))),
        }
    }

    async fn ping(&self, addr: &NodeAddr, timeout: Duration) -> Result<Duration, NetError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let started = Instant::now();

        match self.request(addr, &CacheMessage::Ping { timestamp }, timeout).await? {
            CacheMessage::Pong { timestamp: echoed } if echoed == timestamp => {
                Ok(started.elapsed())
            }
            other => Err(NetError::UnexpectedResponse(format!(
                "expected Pong, got {other:?}"
            ))),
        }
    }

    fn health(&self, addr: &NodeAddr) -> NodeHealth {
        let now = Instant::now();
        self.nodes
            .lock()
            .expect("node table lock poisoned")
            .get(addr)
            .map_or(NodeHealth::Healthy, |slot| slot.health.snapshot(now))
    }

    fn close(&self) {
        let mut nodes = self.nodes.lock().expect("node table lock poisoned");
        let dropped: usize = nodes.values().map(|slot| slot.idle.len()).sum();
        nodes.clear();
        debug!(dropped, "closed pooled connections");
    }
}
