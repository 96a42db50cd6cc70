//! Error types for the cache node.

use ecache_net::NetError;

/// Errors that can occur while storing chunks or serving connections.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The store has reached its capacity limit.
    #[error("store capacity exceeded: need {needed} bytes, only {available} available")]
    CapacityExceeded {
        /// Bytes needed for the operation.
        needed: u64,
        /// Bytes currently available.
        available: u64,
    },

    /// The chunk payload does not match its checksum.
    #[error("chunk {key}/{index} failed checksum verification")]
    ChecksumMismatch {
        /// Key of the refused chunk.
        key: String,
        /// Index of the refused chunk.
        index: u16,
    },

    /// Binding or accepting failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection broke or sent an unreadable frame.
    #[error("network error: {0}")]
    Net(#[from] NetError),
}
