//! [`Client`]: the public facade of the cache client.

use std::sync::Arc;

use ecache_erasure::ErasureEncoder;
use ecache_net::{NetError, NodeHealth, TcpTransport, Transport};
use ecache_placement::PlacementResolver;
use ecache_types::{NodeAddr, Redundancy, parse_node_list};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::op::OpContext;
use crate::{read, write};

/// An erasure-coded cache client session.
///
/// Values are split into `d` data chunks plus `p` parity chunks and spread
/// over a fixed node list. Any `d` chunks of a write reconstruct it, so a
/// value survives up to `p` unavailable nodes.
///
/// `set` and `get` take `&self`; a dialed client can be shared across tasks
/// behind an `Arc`.
pub struct Client {
    config: ClientConfig,
    redundancy: Redundancy,
    write_quorum: usize,
    encoder: ErasureEncoder,
    transport: Arc<dyn Transport>,
    placement: Option<PlacementResolver>,
}

impl Client {
    /// Create a client with `d` data and `p` parity chunks.
    ///
    /// `chunk_size_hint` is the expected chunk size in bytes, used to size
    /// connection buffers; `0` picks the default.
    pub fn new(
        data_chunks: usize,
        parity_chunks: usize,
        chunk_size_hint: usize,
    ) -> Result<Self, ClientError> {
        Self::with_config(ClientConfig {
            chunk_size_hint,
            ..ClientConfig::with_redundancy(data_chunks, parity_chunks)
        })
    }

    /// Create a client from a full configuration, talking TCP.
    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(TcpTransport::new(config.tcp_config()));
        Self::with_transport(config, transport)
    }

    /// Create a client over a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let redundancy = config.validate()?;
        Ok(Self {
            write_quorum: config.write_quorum(),
            encoder: ErasureEncoder::new(redundancy),
            redundancy,
            config,
            transport,
            placement: None,
        })
    }

    /// Connect to an ordered list of `host:port` addresses.
    ///
    /// The list order determines placement, so every client that should
    /// see the same data must dial the same list in the same order.
    pub async fn dial<S: AsRef<str>>(&mut self, addresses: &[S]) -> Result<(), ClientError> {
        let nodes = addresses
            .iter()
            .map(|addr| NodeAddr::parse(addr.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.dial_nodes(nodes).await
    }

    /// Connect to a comma-separated `host:port` list.
    pub async fn dial_str(&mut self, addresses: &str) -> Result<(), ClientError> {
        let nodes = parse_node_list(addresses)?;
        self.dial_nodes(nodes).await
    }

    /// Connect to an already parsed node list.
    ///
    /// Fails with [`ClientError::Config`] if the list is shorter than
    /// `d + p` or names the same node twice.
    pub async fn dial_nodes(&mut self, nodes: Vec<NodeAddr>) -> Result<(), ClientError> {
        let total = self.redundancy.total();
        if nodes.len() < total {
            return Err(ClientError::Config(format!(
                "{} nodes cannot hold {total} chunks on distinct nodes ({})",
                nodes.len(),
                self.redundancy
            )));
        }

        let placement = PlacementResolver::new(nodes)?;
        let timeout = self.config.op_timeout();
        let transport = self.transport.as_ref();

        let mut attempts: FuturesUnordered<_> = placement
            .nodes()
            .iter()
            .map(|node| async move { (node, transport.connect(node, timeout).await) })
            .collect();

        let mut reachable = 0usize;
        let mut first_error: Option<NetError> = None;
        while let Some((node, result)) = attempts.next().await {
            match result {
                Ok(()) => reachable += 1,
                Err(e) => {
                    warn!(node = %node, error = %e, "node unreachable at dial");
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(attempts);

        if reachable < total
            && !self.config.allow_partial_dial
            && let Some(e) = first_error
        {
            return Err(ClientError::Network(e));
        }

        info!(
            nodes = placement.len(),
            reachable,
            redundancy = %self.redundancy,
            write_quorum = self.write_quorum,
            "dialed cluster"
        );
        self.placement = Some(placement);
        Ok(())
    }

    /// Store `value` under `key`, overwriting any previous value.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), ClientError> {
        let placement = self.resolver()?;
        let ctx = self.op_context();
        write::write_value(&ctx, placement, &self.encoder, self.write_quorum, key, value).await
    }

    /// Fetch the value stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, ClientError> {
        let placement = self.resolver()?;
        let ctx = self.op_context();
        read::read_value(&ctx, placement, key).await
    }

    /// The `d + p` nodes holding `key`'s chunks, in chunk order.
    pub fn placement(&self, key: &str) -> Result<Vec<NodeAddr>, ClientError> {
        Ok(self.resolver()?.placement(key, self.redundancy.total()))
    }

    /// The dialed node list, empty before `dial`.
    pub fn nodes(&self) -> &[NodeAddr] {
        self.placement
            .as_ref()
            .map(PlacementResolver::nodes)
            .unwrap_or_default()
    }

    /// The `(d, p)` parameters of this session.
    pub fn redundancy(&self) -> Redundancy {
        self.redundancy
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Health of every dialed node as seen by the connection manager.
    pub fn health(&self) -> Vec<(NodeAddr, NodeHealth)> {
        self.nodes()
            .iter()
            .map(|node| (node.clone(), self.transport.health(node)))
            .collect()
    }

    /// Drop pooled connections. The client dials lazily again on next use.
    pub fn close(&self) {
        self.transport.close();
    }

    fn resolver(&self) -> Result<&PlacementResolver, ClientError> {
        self.placement
            .as_ref()
            .ok_or_else(|| ClientError::Config("not dialed".into()))
    }

    fn op_context(&self) -> OpContext<'_> {
        OpContext::new(
            self.transport.as_ref(),
            self.redundancy,
            self.config.chunk_retries,
            self.config.op_timeout(),
        )
    }
}
