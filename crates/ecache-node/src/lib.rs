//! Reference cache node.
//!
//! A node is plain storage: it keeps whatever chunks it is sent, keyed by
//! `(key, index)`, and hands them back on request. It knows nothing about
//! erasure coding or the other nodes. Two parts:
//!
//! - [`MemoryChunkStore`]: bounded in-memory chunk map.
//! - [`CacheNode`]: TCP server speaking the `ecache-net` wire protocol.

mod error;
mod server;
mod store;

pub use error::NodeError;
pub use server::{CacheNode, NodeHandle};
pub use store::{MemoryChunkStore, StoreStats};
