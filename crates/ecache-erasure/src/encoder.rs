//! Value encoder: value → `d + p` tagged chunks.

use bytes::Bytes;
use ecache_types::{Checksum, Chunk, ChunkHeader, Redundancy, ValueId};
use tracing::debug;

use crate::chunker;
use crate::coder::Coder;
use crate::error::ErasureError;

/// Splits values into `d` data chunks and computes `p` parity chunks.
///
/// Encoding is deterministic: the same key and value always produce the
/// same chunk bytes, so a retried write stores identical data.
#[derive(Debug, Clone, Copy)]
pub struct ErasureEncoder {
    coder: Coder,
}

impl ErasureEncoder {
    /// Create an encoder for the given redundancy parameters.
    pub fn new(redundancy: Redundancy) -> Self {
        Self {
            coder: Coder::new(redundancy),
        }
    }

    /// The code family in use.
    pub fn coder(&self) -> Coder {
        self.coder
    }

    /// Encode `value` under `key` into its full shard set.
    ///
    /// Returns data chunks at indices `0..d` followed by parity chunks at
    /// `d..d+p`.
    pub fn encode(&self, key: &str, value: &[u8]) -> Result<Vec<Chunk>, ErasureError> {
        let redundancy = self.coder.redundancy();
        let blocks = chunker::split(value, redundancy.data_chunks)?;
        let parity = self.coder.parity(&blocks.blocks)?;
        let value_id = ValueId::from_data(value);

        let chunks: Vec<Chunk> = blocks
            .blocks
            .into_iter()
            .chain(parity)
            .enumerate()
            .map(|(index, block)| {
                let payload = Bytes::from(block);
                Chunk {
                    header: ChunkHeader {
                        key: key.to_string(),
                        index: index as u16,
                        data_chunks: redundancy.data_chunks as u16,
                        parity_chunks: redundancy.parity_chunks as u16,
                        payload_len: value.len() as u64,
                        checksum: Checksum::from_data(&payload),
                        value_id,
                    },
                    payload,
                }
            })
            .collect();

        debug!(
            key,
            %redundancy,
            value_len = value.len(),
            block_len = blocks.block_len,
            "encoded value into chunks"
        );

        Ok(chunks)
    }
}
