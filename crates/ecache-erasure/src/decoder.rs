//! Value decoder: any `d` chunks of a shard set → the original value.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use ecache_types::{Chunk, Redundancy, ValueId};
use tracing::debug;

use crate::chunker;
use crate::coder::Coder;
use crate::error::ErasureError;

/// Decode the original value from a subset of its chunks.
///
/// `chunks` must hold at least `d` distinct indices of one shard set. Every
/// chunk is checked before use: its checksum, its index range, its length
/// and its header agreement with the other chunks. The reconstructed value
/// is finally checked against the recorded [`ValueId`].
///
/// # Errors
///
/// Returns [`ErasureError::InsufficientShards`] if fewer than `d` distinct
/// chunks are provided, or [`ErasureError::CorruptShard`] if the chunks are
/// inconsistent with each other or with the code.
pub fn decode(redundancy: Redundancy, chunks: &[Chunk]) -> Result<Vec<u8>, ErasureError> {
    let d = redundancy.data_chunks;
    let Some(first) = chunks.first() else {
        return Err(ErasureError::InsufficientShards { needed: d, got: 0 });
    };

    let coder = Coder::new(redundancy);
    let value_id = first.header.value_id;
    let (payload_len, block_len) = recorded_lengths(first, d, chunks)?;

    let mut present: BTreeMap<usize, &[u8]> = BTreeMap::new();
    for chunk in chunks {
        let index = chunk.index();
        let header = &chunk.header;

        if header.redundancy() != redundancy {
            return Err(ErasureError::corrupt(
                index,
                format!("encoded with {}, expected {redundancy}", header.redundancy()),
            ));
        }
        if header.value_id != value_id || header.payload_len != first.header.payload_len {
            return Err(ErasureError::corrupt(
                index,
                "chunk belongs to a different write",
            ));
        }
        if index >= redundancy.total() {
            return Err(ErasureError::corrupt(index, "index out of range"));
        }
        if !chunk.verify() {
            return Err(ErasureError::corrupt(index, "checksum mismatch"));
        }
        let expected = coder.expected_len(index, block_len);
        if chunk.payload.len() != expected {
            return Err(ErasureError::corrupt(
                index,
                format!("length {} does not match expected {expected}", chunk.payload.len()),
            ));
        }

        match present.entry(index) {
            Entry::Vacant(slot) => {
                slot.insert(chunk.payload.as_ref());
            }
            Entry::Occupied(slot) if *slot.get() != chunk.payload.as_ref() => {
                return Err(ErasureError::corrupt(
                    index,
                    "duplicate index with different contents",
                ));
            }
            Entry::Occupied(_) => {}
        }
    }

    if present.len() < d {
        return Err(ErasureError::InsufficientShards {
            needed: d,
            got: present.len(),
        });
    }

    let blocks = coder.reconstruct(&present, block_len)?;
    let value = chunker::join(&blocks, payload_len)?;

    if ValueId::from_data(&value) != value_id {
        return Err(ErasureError::CorruptShard {
            index: None,
            reason: "reconstructed value does not match its recorded digest".into(),
        });
    }

    debug!(
        %redundancy,
        chunks = present.len(),
        value_len = value.len(),
        "decoded value from chunks"
    );

    Ok(value)
}

/// The value length recorded in `first` and the data block length it implies.
///
/// Every block is at most one byte shorter than the longest received payload,
/// so a recorded length implying longer blocks cannot belong to these chunks.
fn recorded_lengths(
    first: &Chunk,
    d: usize,
    chunks: &[Chunk],
) -> Result<(usize, usize), ErasureError> {
    let too_long = || {
        ErasureError::corrupt(
            first.index(),
            format!(
                "recorded value length {} does not fit the chunk payloads",
                first.header.payload_len
            ),
        )
    };
    let payload_len = usize::try_from(first.header.payload_len).map_err(|_| too_long())?;
    let block_len = chunker::block_len(payload_len, d);
    let longest = chunks.iter().map(|c| c.payload.len()).max().unwrap_or(0);
    if block_len > longest {
        return Err(too_long());
    }
    Ok((payload_len, block_len))
}
