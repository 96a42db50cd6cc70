//! Error types for chunking and erasure coding.

/// Errors that can occur during chunking, encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum ErasureError {
    /// The Reed-Solomon library returned an error.
    #[error("reed-solomon error: {0}")]
    ReedSolomon(#[from] reed_solomon_simd::Error),

    /// The input could not be split or encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Not enough distinct chunks were provided for decoding.
    #[error("not enough chunks: need {needed}, got {got}")]
    InsufficientShards {
        /// Minimum distinct chunks required (d).
        needed: usize,
        /// Distinct chunks actually provided.
        got: usize,
    },

    /// The supplied chunks are inconsistent with each other or with the code.
    #[error("corrupt chunk{}: {reason}", index.map(|i| format!(" {i}")).unwrap_or_default())]
    CorruptShard {
        /// The offending chunk index, when a single chunk is to blame.
        index: Option<usize>,
        /// What was inconsistent.
        reason: String,
    },
}

impl ErasureError {
    pub(crate) fn corrupt(index: usize, reason: impl Into<String>) -> Self {
        Self::CorruptShard {
            index: Some(index),
            reason: reason.into(),
        }
    }
}
