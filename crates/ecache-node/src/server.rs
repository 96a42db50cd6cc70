//! TCP server for the cache node.

use std::net::SocketAddr;
use std::sync::Arc;

use ecache_net::framing::{read_message, write_message};
use ecache_net::{CacheMessage, NetError};
use ecache_types::{Chunk, NodeAddr};
use tokio::io::BufStream;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::NodeError;
use crate::store::MemoryChunkStore;

/// A bound, not yet serving, cache node.
pub struct CacheNode {
    listener: TcpListener,
    store: Arc<MemoryChunkStore>,
}

impl CacheNode {
    /// Bind a listener on `addr` in front of `store`.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        store: Arc<MemoryChunkStore>,
    ) -> Result<Self, NodeError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, store })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.listener.local_addr()?)
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<MemoryChunkStore> {
        &self.store
    }

    /// Accept and serve connections until `shutdown` flips to `true` or its
    /// sender is dropped. Open connections are closed on the way out.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), NodeError> {
        let addr = self.local_addr()?;
        let stats = self.store.stats();
        info!(%addr, max_bytes = stats.max_bytes, "cache node listening");

        let mut conns = JoinSet::new();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(%addr, error = %e, "accept failed");
                            continue;
                        }
                    };
                    debug!(%peer, "connection accepted");
                    let store = self.store.clone();
                    conns.spawn(async move {
                        if let Err(e) = handle_connection(stream, &store).await {
                            debug!(%peer, error = %e, "connection closed with error");
                        }
                    });
                }
                Some(_) = conns.join_next(), if !conns.is_empty() => {}
            }
        }

        let open = conns.len();
        conns.shutdown().await;
        info!(%addr, open_connections = open, "cache node stopped");
        Ok(())
    }

    /// Serve on a background task.
    pub fn spawn(self) -> Result<NodeHandle, NodeError> {
        let addr = self.local_addr()?;
        let store = self.store.clone();
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.serve(rx));
        Ok(NodeHandle {
            addr,
            store,
            shutdown,
            task,
        })
    }
}

/// A node serving on a background task.
pub struct NodeHandle {
    addr: SocketAddr,
    store: Arc<MemoryChunkStore>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), NodeError>>,
}

impl NodeHandle {
    /// The bound socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The bound address as a client node address.
    pub fn node_addr(&self) -> NodeAddr {
        NodeAddr::from(self.addr)
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<MemoryChunkStore> {
        &self.store
    }

    /// Stop accepting, close every connection and wait for the server task.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(NodeError::Io(std::io::Error::other(e))),
        }
    }
}

/// Serve one connection: strictly one response per request, in order.
async fn handle_connection(stream: TcpStream, store: &MemoryChunkStore) -> Result<(), NodeError> {
    stream.set_nodelay(true)?;
    let mut stream = BufStream::new(stream);
    loop {
        let request = match read_message(&mut stream).await {
            Ok(request) => request,
            Err(NetError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let response = respond(store, request);
        write_message(&mut stream, &response).await?;
    }
}

fn respond(store: &MemoryChunkStore, request: CacheMessage) -> CacheMessage {
    match request {
        CacheMessage::PutChunk { header, payload } => {
            let (key, index) = (header.key.clone(), header.index);
            match store.put(Chunk { header, payload }) {
                Ok(()) => CacheMessage::PutAck {
                    key,
                    index,
                    ok: true,
                    reason: None,
                },
                Err(e) => {
                    warn!(key = %key, index, error = %e, "refusing chunk");
                    CacheMessage::PutAck {
                        key,
                        index,
                        ok: false,
                        reason: Some(e.to_string()),
                    }
                }
            }
        }
        CacheMessage::GetChunk { key, index } => {
            let chunk = store.get(&key, index);
            debug!(key = %key, index, found = chunk.is_some(), "chunk lookup");
            CacheMessage::ChunkResponse { key, index, chunk }
        }
        CacheMessage::Ping { timestamp } => CacheMessage::Pong { timestamp },
        other => CacheMessage::Error {
            message: format!("unexpected request {}", other.kind()),
        },
    }
}
