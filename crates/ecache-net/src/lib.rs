//! Wire protocol and connection management for ecache.
//!
//! - [`CacheMessage`]: the request/response protocol (postcard-serialized,
//!   length-prefixed frames, see [`framing`]).
//! - [`Transport`]: the seam the client talks through. [`TcpTransport`] is
//!   the production implementation; tests substitute mocks.
//! - [`NodeHealth`]: per-node health as seen by the connection manager.

mod error;
pub mod framing;
mod health;
mod message;
mod transport;

use std::time::Duration;

use ecache_types::{Chunk, NodeAddr};

pub use error::NetError;
pub use health::NodeHealth;
pub use message::CacheMessage;
pub use transport::{DEFAULT_BUFFER_SIZE, TcpConfig, TcpTransport};

/// Maximum frame size: 64 MiB.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Per-node request primitives used by the client.
///
/// Every call runs under the caller's `timeout`. Implementations report
/// failures and never retry on their own.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Make sure a connection to `addr` can be established.
    async fn connect(&self, addr: &NodeAddr, timeout: Duration) -> Result<(), NetError>;

    /// Store a chunk on `addr`. Succeeds only once the node acknowledged it.
    async fn put_chunk(
        &self,
        addr: &NodeAddr,
        chunk: &Chunk,
        timeout: Duration,
    ) -> Result<(), NetError>;

    /// Fetch chunk `index` of `key` from `addr`. `None` means the node does
    /// not hold it.
    async fn get_chunk(
        &self,
        addr: &NodeAddr,
        key: &str,
        index: u16,
        timeout: Duration,
    ) -> Result<Option<Chunk>, NetError>;

    /// Round-trip a ping to `addr`.
    async fn ping(&self, addr: &NodeAddr, timeout: Duration) -> Result<Duration, NetError>;

    /// Current health of `addr` as tracked by this transport.
    fn health(&self, _addr: &NodeAddr) -> NodeHealth {
        NodeHealth::Healthy
    }

    /// Drop any pooled connections.
    fn close(&self) {}
}
