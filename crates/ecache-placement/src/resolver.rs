//! Placement resolver implementation.

use std::collections::HashSet;

use ecache_types::{NodeAddr, TypesError};
use tracing::trace;

/// Maps `(key, chunk index)` to a node of a fixed, ordered node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementResolver {
    nodes: Vec<NodeAddr>,
}

impl PlacementResolver {
    /// Create a resolver over an ordered node list.
    ///
    /// The order matters: two resolvers agree on placement only if they were
    /// built from the same list in the same order. Every address must be
    /// distinct, otherwise chunks of one value could share a node.
    pub fn new(nodes: Vec<NodeAddr>) -> Result<Self, TypesError> {
        if nodes.is_empty() {
            return Err(TypesError::EmptyNodeList);
        }
        let mut seen = HashSet::with_capacity(nodes.len());
        if let Some(dup) = nodes.iter().find(|node| !seen.insert(*node)) {
            return Err(TypesError::DuplicateAddress(dup.to_string()));
        }
        Ok(Self { nodes })
    }

    /// The node list, in configured order.
    pub fn nodes(&self) -> &[NodeAddr] {
        &self.nodes
    }

    /// Number of nodes in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a resolver cannot be built from an empty list.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The offset of chunk 0 for `key` in the node list.
    pub fn base(&self, key: &str) -> usize {
        (key_position(key) % self.nodes.len() as u64) as usize
    }

    /// Position in the node list of chunk `index` of `key`.
    pub fn node_index(&self, key: &str, index: usize) -> usize {
        (self.base(key) + index) % self.nodes.len()
    }

    /// The node holding chunk `index` of `key`.
    pub fn resolve(&self, key: &str, index: usize) -> &NodeAddr {
        &self.nodes[self.node_index(key, index)]
    }

    /// Nodes for chunks `0..total` of `key`, in chunk order.
    ///
    /// The nodes are distinct as long as `total <= self.len()`. Callers are
    /// expected to enforce that; otherwise assignments wrap around.
    pub fn placement(&self, key: &str, total: usize) -> Vec<NodeAddr> {
        let base = self.base(key);
        trace!(key, base, total, nodes = self.nodes.len(), "resolved placement");
        (0..total)
            .map(|i| self.nodes[(base + i) % self.nodes.len()].clone())
            .collect()
    }
}

/// The key's position in hash space: first 8 bytes of `blake3(key)` as a
/// little-endian `u64`.
pub fn key_position(key: &str) -> u64 {
    let hash = blake3::hash(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
