//! Error types for client operations.

use ecache_erasure::ErasureError;
use ecache_net::NetError;
use ecache_types::TypesError;

/// Errors surfaced by [`Client`](crate::Client) operations.
///
/// Callers always get either a fully reconstructed value or one of these;
/// partial or unverified data is never returned.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid parameters or a call made in the wrong state.
    #[error("configuration error: {0}")]
    Config(String),

    /// A node was unreachable and reconnecting did not help.
    #[error("network error: {0}")]
    Network(#[from] NetError),

    /// The value could not be chunked or encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Chunks were inconsistent with each other or failed verification.
    #[error("corrupt chunk{}: {reason}", index.map(|i| format!(" {i}")).unwrap_or_default())]
    CorruptShard {
        /// The offending chunk index, when a single chunk is to blame.
        index: Option<usize>,
        /// What was inconsistent.
        reason: String,
    },

    /// Fewer nodes acknowledged a write than the write quorum requires.
    #[error("write quorum not met: needed {needed} acks, got {acked}")]
    WriteQuorum {
        /// Acknowledgements required (W).
        needed: usize,
        /// Acknowledgements received.
        acked: usize,
    },

    /// Fewer than `d` valid chunks of one write could be fetched.
    #[error("insufficient chunks: need {needed}, found {found}")]
    InsufficientShards {
        /// Valid chunks required (d).
        needed: usize,
        /// Valid chunks found for the best-supported write.
        found: usize,
    },

    /// No node holds any chunk of the key.
    #[error("key not found: {0}")]
    KeyNotFound(String),
}

impl From<ErasureError> for ClientError {
    fn from(e: ErasureError) -> Self {
        match e {
            ErasureError::InsufficientShards { needed, got } => Self::InsufficientShards {
                needed,
                found: got,
            },
            ErasureError::CorruptShard { index, reason } => Self::CorruptShard { index, reason },
            ErasureError::Encoding(msg) => Self::Encoding(msg),
            ErasureError::ReedSolomon(e) => Self::Encoding(e.to_string()),
        }
    }
}

impl From<TypesError> for ClientError {
    fn from(e: TypesError) -> Self {
        Self::Config(e.to_string())
    }
}
