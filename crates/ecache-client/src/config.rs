//! Client configuration.
//!
//! [`ClientConfig`] deserializes from a TOML table; every field has a
//! default, so an empty table is valid. Durations are given in milliseconds.

use std::time::Duration;

use ecache_net::{DEFAULT_BUFFER_SIZE, TcpConfig};
use ecache_types::Redundancy;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Bytes added to `chunk_size_hint` to size connection buffers, covering
/// the frame prefix and the chunk header.
const FRAME_OVERHEAD: usize = 512;

/// Smallest connection buffer derived from a size hint.
const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Largest connection buffer derived from a size hint.
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Tunables of a [`Client`](crate::Client) session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Data chunks per value (`d`).
    pub data_chunks: usize,
    /// Parity chunks per value (`p`).
    pub parity_chunks: usize,
    /// Expected chunk size in bytes, used to size I/O buffers. `0` = default.
    pub chunk_size_hint: usize,
    /// Acknowledgements required for a write. `None` = `d + p`.
    pub write_quorum: Option<usize>,
    /// Deadline of one whole `set` or `get`.
    pub op_timeout_ms: u64,
    /// Extra attempts per chunk after a transient network failure.
    pub chunk_retries: u32,
    /// Connect attempts when a request hits an unhealthy node.
    pub reconnect_attempts: u32,
    /// Initial reconnect backoff, doubled per attempt.
    pub reconnect_backoff_ms: u64,
    /// Fail-fast window after reconnecting to a node failed.
    pub unhealthy_retry_after_ms: u64,
    /// Idle connections kept per node.
    pub max_idle_per_node: usize,
    /// Let `dial` succeed with fewer than `d + p` reachable nodes.
    pub allow_partial_dial: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_chunks: 2,
            parity_chunks: 1,
            chunk_size_hint: 0,
            write_quorum: None,
            op_timeout_ms: 10_000,
            chunk_retries: 2,
            reconnect_attempts: 3,
            reconnect_backoff_ms: 50,
            unhealthy_retry_after_ms: 1_000,
            max_idle_per_node: 4,
            allow_partial_dial: false,
        }
    }
}

impl ClientConfig {
    /// Config with the given redundancy and default everything else.
    pub fn with_redundancy(data_chunks: usize, parity_chunks: usize) -> Self {
        Self {
            data_chunks,
            parity_chunks,
            ..Self::default()
        }
    }

    /// Parse a config from a TOML table.
    pub fn from_toml(s: &str) -> Result<Self, ClientError> {
        toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Check every field and return the validated redundancy.
    pub fn validate(&self) -> Result<Redundancy, ClientError> {
        let redundancy = Redundancy::new(self.data_chunks, self.parity_chunks)?;

        if let Some(w) = self.write_quorum
            && !(redundancy.data_chunks..=redundancy.total()).contains(&w)
        {
            return Err(ClientError::Config(format!(
                "write quorum {w} outside {}..={}",
                redundancy.data_chunks,
                redundancy.total()
            )));
        }
        if self.op_timeout_ms == 0 {
            return Err(ClientError::Config("op_timeout_ms must be positive".into()));
        }

        Ok(redundancy)
    }

    /// Effective write quorum.
    pub fn write_quorum(&self) -> usize {
        self.write_quorum
            .unwrap_or(self.data_chunks.saturating_add(self.parity_chunks))
    }

    /// Deadline of one whole operation.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Connection buffer size implied by `chunk_size_hint`.
    pub fn buffer_size(&self) -> usize {
        if self.chunk_size_hint == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.chunk_size_hint
                .saturating_add(FRAME_OVERHEAD)
                .clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)
        }
    }

    /// Connection manager settings.
    pub fn tcp_config(&self) -> TcpConfig {
        TcpConfig {
            reconnect_attempts: self.reconnect_attempts,
            reconnect_backoff: Duration::from_millis(self.reconnect_backoff_ms),
            unhealthy_retry_after: Duration::from_millis(self.unhealthy_retry_after_ms),
            max_idle_per_node: self.max_idle_per_node,
            buffer_size: self.buffer_size(),
        }
    }
}
