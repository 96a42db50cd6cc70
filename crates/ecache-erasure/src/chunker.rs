//! Splitting values into equal-size data blocks and joining them back.

use crate::error::ErasureError;

/// A value split into `d` equal-length blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocks {
    /// The `d` data blocks. The final one is zero-padded.
    pub blocks: Vec<Vec<u8>>,
    /// Length of every block: `ceil(original_len / d)`.
    pub block_len: usize,
    /// Length of the value before padding.
    pub original_len: usize,
}

/// Length of each data block for a value of `len` bytes split `d` ways.
pub fn block_len(len: usize, d: usize) -> usize {
    len.div_ceil(d)
}

/// Split `value` into `d` contiguous blocks of equal length.
///
/// An empty value is valid and yields `d` zero-length blocks.
pub fn split(value: &[u8], d: usize) -> Result<Blocks, ErasureError> {
    if d == 0 {
        return Err(ErasureError::Encoding(
            "cannot split a value into zero blocks".into(),
        ));
    }

    let block_len = block_len(value.len(), d);
    let mut blocks = Vec::with_capacity(d);
    for i in 0..d {
        let start = (i * block_len).min(value.len());
        let end = ((i + 1) * block_len).min(value.len());
        let mut block = Vec::with_capacity(block_len);
        block.extend_from_slice(&value[start..end]);
        block.resize(block_len, 0);
        blocks.push(block);
    }

    Ok(Blocks {
        blocks,
        block_len,
        original_len: value.len(),
    })
}

/// Concatenate data blocks and strip the padding.
pub fn join<B: AsRef<[u8]>>(blocks: &[B], original_len: usize) -> Result<Vec<u8>, ErasureError> {
    let total: usize = blocks.iter().map(|b| b.as_ref().len()).sum();
    if total < original_len {
        return Err(ErasureError::Encoding(format!(
            "blocks hold {total} bytes, value needs {original_len}"
        )));
    }

    let mut value = Vec::with_capacity(total);
    for block in blocks {
        value.extend_from_slice(block.as_ref());
    }
    value.truncate(original_len);
    Ok(value)
}
