//! Shared types for the ecache workspace.
//!
//! This crate defines the types every other crate speaks:
//! digests ([`Checksum`], [`ValueId`]), erasure-coded fragments
//! ([`ChunkHeader`], [`Chunk`]), redundancy parameters ([`Redundancy`]),
//! and node addressing ([`NodeAddr`], [`parse_node_list`]).

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

mod addr;
mod error;

pub use addr::{NodeAddr, parse_node_list};
pub use error::TypesError;

/// Upper bound on `d + p`. Chunk indices must fit a single byte.
pub const MAX_TOTAL_CHUNKS: usize = 256;

// ---------------------------------------------------------------------------
// Digest types
// ---------------------------------------------------------------------------

macro_rules! define_digest {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Compute the digest of arbitrary data with BLAKE3.
            pub fn from_data(data: &[u8]) -> Self {
                Self(blake3::hash(data).into())
            }

            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

define_digest!(
    /// Integrity checksum of a single chunk payload: `blake3(payload)`.
    Checksum
);

define_digest!(
    /// Digest of a whole value: `blake3(value)`.
    ///
    /// Every chunk of one write carries the same `ValueId`, which lets a
    /// reader tell two writes of the same key apart.
    ValueId
);

// ---------------------------------------------------------------------------
// Redundancy
// ---------------------------------------------------------------------------

/// Erasure coding parameters: `d` data chunks plus `p` parity chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Redundancy {
    /// Number of data chunks (`d`).
    pub data_chunks: usize,
    /// Number of parity chunks (`p`).
    pub parity_chunks: usize,
}

impl Redundancy {
    /// Validate and build redundancy parameters.
    pub fn new(data_chunks: usize, parity_chunks: usize) -> Result<Self, TypesError> {
        if data_chunks == 0 {
            return Err(TypesError::InvalidRedundancy(
                "data chunk count must be at least 1".into(),
            ));
        }
        match data_chunks.checked_add(parity_chunks) {
            Some(total) if total <= MAX_TOTAL_CHUNKS => {}
            _ => {
                return Err(TypesError::InvalidRedundancy(format!(
                    "d + p = {data_chunks} + {parity_chunks} exceeds the maximum of {MAX_TOTAL_CHUNKS}"
                )));
            }
        }
        Ok(Self {
            data_chunks,
            parity_chunks,
        })
    }

    /// Total number of chunks per value (`d + p`).
    pub fn total(&self) -> usize {
        self.data_chunks + self.parity_chunks
    }
}

impl fmt::Display for Redundancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d={},p={}", self.data_chunks, self.parity_chunks)
    }
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// The tag carried by every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    /// The key this chunk belongs to.
    pub key: String,
    /// Position in the shard set (0..d data, d..d+p parity).
    pub index: u16,
    /// Number of data chunks the value was split into.
    pub data_chunks: u16,
    /// Number of parity chunks computed for the value.
    pub parity_chunks: u16,
    /// Length of the original, unpadded value in bytes.
    pub payload_len: u64,
    /// Checksum of this chunk's payload.
    pub checksum: Checksum,
    /// Digest of the whole value this chunk was produced from.
    pub value_id: ValueId,
}

impl ChunkHeader {
    /// Redundancy parameters recorded in the header.
    pub fn redundancy(&self) -> Redundancy {
        Redundancy {
            data_chunks: self.data_chunks as usize,
            parity_chunks: self.parity_chunks as usize,
        }
    }
}

/// One erasure-coded fragment of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Tag describing where this fragment belongs.
    pub header: ChunkHeader,
    /// Fragment bytes (a data block or a parity block).
    pub payload: Bytes,
}

impl Chunk {
    /// Recompute the payload checksum and compare it to the header.
    pub fn verify(&self) -> bool {
        Checksum::from_data(&self.payload) == self.header.checksum
    }

    /// Whether this is a parity chunk (index ≥ d).
    pub fn is_parity(&self) -> bool {
        self.header.index >= self.header.data_chunks
    }

    /// Chunk index as a `usize`.
    pub fn index(&self) -> usize {
        self.header.index as usize
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
