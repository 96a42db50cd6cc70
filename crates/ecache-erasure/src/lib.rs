//! Chunking and erasure coding for cache values.
//!
//! This crate provides:
//! - [`chunker`]: splitting a value into `d` equal-length data blocks and
//!   joining them back.
//! - [`ErasureEncoder`]: value → `d` data chunks + `p` parity chunks, each
//!   tagged with a [`ChunkHeader`](ecache_types::ChunkHeader).
//! - [`decode`]: any `d` distinct chunks of one write → the original value.
//!
//! Every chunk carries a BLAKE3 checksum of its payload and the BLAKE3
//! digest of the whole value, so decoding rejects corrupted chunks and
//! chunks from different writes of the same key.

pub mod chunker;
mod coder;
mod decoder;
mod encoder;
mod error;

pub use coder::Coder;
pub use decoder::decode;
pub use encoder::ErasureEncoder;
pub use error::ErasureError;
