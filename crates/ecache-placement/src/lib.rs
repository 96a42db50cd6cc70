//! Deterministic placement of chunks onto cache nodes.
//!
//! A key is hashed to a base offset in `[0, n)` where `n` is the length of
//! the node list. Chunk `i` of that key lives on node `(base + i) mod n`.
//! Placement is a pure function of `(key, index, node list)`, so any client
//! configured with the same ordered node list finds the chunks another
//! client wrote without a directory service.
//!
//! The base offset is the first 8 bytes of `blake3(key)` read as a
//! little-endian `u64`, reduced modulo `n`.

mod resolver;

pub use resolver::{PlacementResolver, key_position};
