//! Error types for shared type validation.

/// Errors produced while validating shared types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// `d`/`p` outside the supported range.
    #[error("invalid redundancy: {0}")]
    InvalidRedundancy(String),

    /// A node address that is not a `host:port` pair.
    #[error("invalid node address {addr:?}: {reason}")]
    InvalidAddress {
        /// The offending input.
        addr: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The same address appears twice in a node list.
    #[error("duplicate node address: {0}")]
    DuplicateAddress(String),

    /// The address list contained no addresses.
    #[error("empty node list")]
    EmptyNodeList,
}
