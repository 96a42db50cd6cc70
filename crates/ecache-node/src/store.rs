//! In-memory chunk storage.

use std::collections::HashMap;
use std::sync::RwLock;

use ecache_types::Chunk;
use tracing::debug;

use crate::error::NodeError;

/// Size and occupancy of a [`MemoryChunkStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored chunks.
    pub chunks: usize,
    /// Payload bytes currently held.
    pub used_bytes: u64,
    /// Configured capacity in bytes.
    pub max_bytes: u64,
}

#[derive(Default)]
struct Inner {
    chunks: HashMap<(String, u16), Chunk>,
    used: u64,
}

/// Chunk map keyed by `(key, index)`, bounded by total payload bytes.
///
/// A put to an occupied slot replaces the previous chunk; only the size
/// difference counts against capacity.
pub struct MemoryChunkStore {
    inner: RwLock<Inner>,
    max_bytes: u64,
}

impl MemoryChunkStore {
    /// Create an empty store holding at most `max_bytes` of payload.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_bytes,
        }
    }

    /// Store a chunk in its `(key, index)` slot.
    pub fn put(&self, chunk: Chunk) -> Result<(), NodeError> {
        if !chunk.verify() {
            return Err(NodeError::ChecksumMismatch {
                key: chunk.header.key,
                index: chunk.header.index,
            });
        }

        let mut inner = self.inner.write().expect("lock poisoned");
        let slot = (chunk.header.key.clone(), chunk.header.index);
        let size = chunk.payload.len() as u64;
        let existing = inner.chunks.get(&slot).map_or(0, |c| c.payload.len() as u64);
        let used = inner.used - existing;

        if used + size > self.max_bytes {
            return Err(NodeError::CapacityExceeded {
                needed: size,
                available: self.max_bytes.saturating_sub(used),
            });
        }

        debug!(key = %slot.0, index = slot.1, size, "storing chunk");
        inner.chunks.insert(slot, chunk);
        inner.used = used + size;
        Ok(())
    }

    /// The chunk in slot `(key, index)`, if any.
    pub fn get(&self, key: &str, index: u16) -> Option<Chunk> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.chunks.get(&(key.to_string(), index)).cloned()
    }

    /// Drop the chunk in slot `(key, index)`. Returns whether one was held.
    pub fn remove(&self, key: &str, index: u16) -> bool {
        let mut inner = self.inner.write().expect("lock poisoned");
        match inner.chunks.remove(&(key.to_string(), index)) {
            Some(chunk) => {
                inner.used -= chunk.payload.len() as u64;
                true
            }
            None => false,
        }
    }

    /// Drop every chunk.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.chunks.clear();
        inner.used = 0;
    }

    /// Current occupancy.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read().expect("lock poisoned");
        StoreStats {
            chunks: inner.chunks.len(),
            used_bytes: inner.used,
            max_bytes: self.max_bytes,
        }
    }

    /// Store a chunk without verifying it or checking capacity.
    ///
    /// Lets tests plant silently corrupted data on a node.
    pub fn insert_unchecked(&self, chunk: Chunk) {
        let mut inner = self.inner.write().expect("lock poisoned");
        let slot = (chunk.header.key.clone(), chunk.header.index);
        inner.used += chunk.payload.len() as u64;
        if let Some(old) = inner.chunks.insert(slot, chunk) {
            inner.used -= old.payload.len() as u64;
        }
    }
}
