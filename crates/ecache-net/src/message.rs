//! Protocol messages exchanged between clients and cache nodes.
//!
//! Every message travels as one frame: a 4-byte big-endian length followed
//! by the postcard encoding of a [`CacheMessage`]. Requests and responses
//! alternate strictly on a connection.

use bytes::Bytes;
use ecache_types::{Chunk, ChunkHeader};
use serde::{Deserialize, Serialize};

/// Protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheMessage {
    /// Store a chunk under `(header.key, header.index)`, replacing any
    /// previous chunk at that slot. Answered with [`CacheMessage::PutAck`].
    PutChunk {
        /// Chunk tag.
        header: ChunkHeader,
        /// Chunk bytes.
        payload: Bytes,
    },

    /// Result of a [`CacheMessage::PutChunk`].
    PutAck {
        /// Key of the stored chunk.
        key: String,
        /// Index of the stored chunk.
        index: u16,
        /// Whether the chunk was stored.
        ok: bool,
        /// Why the chunk was refused, when `ok` is false.
        reason: Option<String>,
    },

    /// Fetch the chunk stored under `(key, index)`.
    GetChunk {
        /// Requested key.
        key: String,
        /// Requested chunk index.
        index: u16,
    },

    /// Response to a [`CacheMessage::GetChunk`].
    ChunkResponse {
        /// Requested key.
        key: String,
        /// Requested chunk index.
        index: u16,
        /// The stored chunk, or `None` if the node does not hold it.
        chunk: Option<Chunk>,
    },

    /// Liveness probe.
    Ping {
        /// Sender's clock in millis since the epoch.
        timestamp: u64,
    },

    /// Answer to [`CacheMessage::Ping`].
    Pong {
        /// Timestamp copied from the ping.
        timestamp: u64,
    },

    /// The node could not handle a request.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl CacheMessage {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PutChunk { .. } => "PutChunk",
            Self::PutAck { .. } => "PutAck",
            Self::GetChunk { .. } => "GetChunk",
            Self::ChunkResponse { .. } => "ChunkResponse",
            Self::Ping { .. } => "Ping",
            Self::Pong { .. } => "Pong",
            Self::Error { .. } => "Error",
        }
    }
}
