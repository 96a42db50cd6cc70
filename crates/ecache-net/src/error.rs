//! Error types for network operations.

use std::time::Duration;

use ecache_types::NodeAddr;

/// Errors that can occur while talking to a cache node.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Could not open a TCP connection to the node.
    #[error("failed to connect to {addr}: {reason}")]
    Connect {
        /// The node that could not be reached.
        addr: NodeAddr,
        /// Last connect error.
        reason: String,
    },

    /// The node is inside its fail-fast window after a failed reconnect.
    #[error("node {addr} is unavailable, next reconnect in {retry_in:?}")]
    Unavailable {
        /// The suspended node.
        addr: NodeAddr,
        /// Time left before the next reconnect is attempted.
        retry_in: Duration,
    },

    /// A socket read or write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The request did not complete within its deadline.
    #[error("request to {addr} timed out after {after:?}")]
    Timeout {
        /// The node that did not answer in time.
        addr: NodeAddr,
        /// The deadline that expired.
        after: Duration,
    },

    /// The peer closed the connection at a frame boundary.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Encoding or decoding a message failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A frame exceeded [`MAX_MESSAGE_SIZE`](crate::MAX_MESSAGE_SIZE).
    #[error("message too large: {len} bytes (max {max})")]
    MessageTooLarge {
        /// Size of the offending frame.
        len: usize,
        /// The configured limit.
        max: usize,
    },

    /// The node refused to store a chunk.
    #[error("node {addr} rejected the chunk: {reason}")]
    Rejected {
        /// The node that refused.
        addr: NodeAddr,
        /// The reason it gave.
        reason: String,
    },

    /// The node answered with a message that does not fit the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The node reported an error while handling the request.
    #[error("remote error: {0}")]
    Remote(String),
}

impl NetError {
    /// Whether retrying the same request may succeed.
    ///
    /// Connection-level failures are transient. Rejections, protocol
    /// violations and fail-fast refusals are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io(_) | Self::Timeout { .. } | Self::ConnectionClosed
        )
    }
}

impl From<postcard::Error> for NetError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
