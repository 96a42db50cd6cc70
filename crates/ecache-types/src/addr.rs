//! Cache node addressing.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Network address of one cache node, in `host:port` form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddr(String);

impl NodeAddr {
    /// Parse and validate a `host:port` string.
    pub fn parse(s: &str) -> Result<Self, TypesError> {
        let s = s.trim();
        let invalid = |reason: &str| TypesError::InvalidAddress {
            addr: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        port.parse::<u16>().map_err(|_| invalid("port is not a number in 0..=65535"))?;

        Ok(Self(s.to_string()))
    }

    /// The address as a `host:port` string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeAddr {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeAddr {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<NodeAddr> for String {
    fn from(addr: NodeAddr) -> Self {
        addr.0
    }
}

impl From<std::net::SocketAddr> for NodeAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddr({})", self.0)
    }
}

/// Parse a comma-separated `host:port` list into an ordered node list.
///
/// Entries are trimmed. Empty entries and duplicates are rejected, since
/// every chunk of a value must land on a distinct node.
pub fn parse_node_list(list: &str) -> Result<Vec<NodeAddr>, TypesError> {
    if list.trim().is_empty() {
        return Err(TypesError::EmptyNodeList);
    }

    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for entry in list.split(',') {
        let addr = NodeAddr::parse(entry)?;
        if !seen.insert(addr.clone()) {
            return Err(TypesError::DuplicateAddress(addr.0));
        }
        nodes.push(addr);
    }
    Ok(nodes)
}
