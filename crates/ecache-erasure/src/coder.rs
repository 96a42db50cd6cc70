//! Erasure code families.
//!
//! [`Coder`] is selected once from the redundancy parameters:
//! - [`Coder::Striped`] when `p = 0`: the data blocks are the whole shard set.
//! - [`Coder::ReedSolomon`] when `p ≥ 1`: systematic Reed-Solomon over
//!   GF(2^16) via `reed-solomon-simd`; any `d` of the `d + p` blocks recover
//!   the data.
//!
//! `reed-solomon-simd` only accepts even, non-zero shard sizes. Parity is
//! computed over data blocks zero-extended to the next even length, so
//! parity blocks may be one byte longer than data blocks. Zero-length data
//! blocks produce zero-length parity without touching the library.

use std::collections::BTreeMap;

use ecache_types::Redundancy;
use tracing::debug;

use crate::error::ErasureError;

/// An erasure code family bound to fixed `(d, p)` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coder {
    /// Plain striping with no parity.
    Striped {
        /// Number of data blocks.
        data: usize,
    },
    /// Systematic Reed-Solomon.
    ReedSolomon {
        /// Number of data blocks.
        data: usize,
        /// Number of parity blocks.
        parity: usize,
    },
}

impl Coder {
    /// Pick the code family for the given redundancy.
    pub fn new(redundancy: Redundancy) -> Self {
        if redundancy.parity_chunks == 0 {
            Self::Striped {
                data: redundancy.data_chunks,
            }
        } else {
            Self::ReedSolomon {
                data: redundancy.data_chunks,
                parity: redundancy.parity_chunks,
            }
        }
    }

    /// The `(d, p)` parameters this coder was built with.
    pub fn redundancy(&self) -> Redundancy {
        match *self {
            Self::Striped { data } => Redundancy {
                data_chunks: data,
                parity_chunks: 0,
            },
            Self::ReedSolomon { data, parity } => Redundancy {
                data_chunks: data,
                parity_chunks: parity,
            },
        }
    }

    /// Length of every parity block for data blocks of `block_len` bytes.
    pub fn parity_len(&self, block_len: usize) -> usize {
        match self {
            Self::Striped { .. } => 0,
            Self::ReedSolomon { .. } => round_up_even(block_len),
        }
    }

    /// Expected length of the block at `index` for data blocks of `block_len` bytes.
    pub fn expected_len(&self, index: usize, block_len: usize) -> usize {
        if index < self.redundancy().data_chunks {
            block_len
        } else {
            self.parity_len(block_len)
        }
    }

    /// Compute the `p` parity blocks for `d` equal-length data blocks.
    pub fn parity(&self, blocks: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, ErasureError> {
        let Redundancy {
            data_chunks: d,
            parity_chunks: p,
        } = self.redundancy();

        if blocks.len() != d {
            return Err(ErasureError::Encoding(format!(
                "expected {d} data blocks, got {}",
                blocks.len()
            )));
        }
        let block_len = blocks.first().map_or(0, Vec::len);
        if blocks.iter().any(|b| b.len() != block_len) {
            return Err(ErasureError::Encoding(
                "data blocks differ in length".into(),
            ));
        }

        match self {
            Self::Striped { .. } => Ok(Vec::new()),
            Self::ReedSolomon { .. } if block_len == 0 => Ok(vec![Vec::new(); p]),
            Self::ReedSolomon { .. } => {
                let even_len = round_up_even(block_len);
                let originals: Vec<Vec<u8>> = blocks.iter().map(|b| pad_to(b, even_len)).collect();
                let recovery = reed_solomon_simd::encode(d, p, &originals)?;
                debug!(d, p, block_len, parity_len = even_len, "computed parity blocks");
                Ok(recovery)
            }
        }
    }

    /// Recover the `d` data blocks from any `d` blocks of the shard set.
    ///
    /// `present` maps block index to block bytes. Lengths must already have
    /// been checked against [`Coder::expected_len`].
    pub fn reconstruct(
        &self,
        present: &BTreeMap<usize, &[u8]>,
        block_len: usize,
    ) -> Result<Vec<Vec<u8>>, ErasureError> {
        let Redundancy {
            data_chunks: d,
            parity_chunks: p,
        } = self.redundancy();

        if present.len() < d {
            return Err(ErasureError::InsufficientShards {
                needed: d,
                got: present.len(),
            });
        }
        if let Some(&index) = present.keys().find(|&&i| i >= d + p) {
            return Err(ErasureError::corrupt(index, "index out of range"));
        }

        // All data blocks present: no decoding needed.
        if (0..d).all(|i| present.contains_key(&i)) {
            return Ok((0..d).map(|i| present[&i].to_vec()).collect());
        }

        // Striped coding cannot get here: with p = 0, `d` present blocks
        // are exactly the data blocks.
        let even_len = round_up_even(block_len);
        let mut originals = Vec::new();
        let mut recovery = Vec::new();
        for (&index, &data) in present {
            if index < d {
                originals.push((index, pad_to(data, even_len)));
            } else {
                recovery.push((index - d, data));
            }
        }

        debug!(
            d,
            p,
            originals = originals.len(),
            recovery = recovery.len(),
            block_len,
            "reconstructing missing data blocks"
        );

        let mut restored = if block_len == 0 {
            Default::default()
        } else {
            reed_solomon_simd::decode(d, p, originals.iter().map(|(i, b)| (*i, b)), recovery)?
        };

        (0..d)
            .map(|i| match present.get(&i) {
                Some(data) => Ok(data.to_vec()),
                None if block_len == 0 => Ok(Vec::new()),
                None => {
                    let mut block = restored.remove(&i).ok_or_else(|| {
                        ErasureError::corrupt(i, "reed-solomon did not restore the block")
                    })?;
                    block.truncate(block_len);
                    Ok(block)
                }
            })
            .collect()
    }
}

/// Round up to the nearest even number.
fn round_up_even(n: usize) -> usize {
    n.saturating_add(n % 2)
}

fn pad_to(block: &[u8], len: usize) -> Vec<u8> {
    let mut padded = Vec::with_capacity(len);
    padded.extend_from_slice(block);
    padded.resize(len, 0);
    padded
}
