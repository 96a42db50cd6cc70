//! Per-operation deadline and per-chunk retry budget.

use std::future::Future;
use std::time::Duration;

use ecache_net::{NetError, Transport};
use ecache_types::{NodeAddr, Redundancy};
use tokio::time::Instant;
use tracing::debug;

/// State shared by every chunk request of one `set` or `get`.
pub(crate) struct OpContext<'a> {
    pub(crate) transport: &'a dyn Transport,
    pub(crate) redundancy: Redundancy,
    pub(crate) chunk_retries: u32,
    pub(crate) op_timeout: Duration,
    pub(crate) deadline: Instant,
}

impl<'a> OpContext<'a> {
    pub(crate) fn new(
        transport: &'a dyn Transport,
        redundancy: Redundancy,
        chunk_retries: u32,
        op_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            redundancy,
            chunk_retries,
            op_timeout,
            deadline: Instant::now() + op_timeout,
        }
    }

    /// Timeout for the next attempt: an equal share of the operation
    /// timeout, clipped to what is left. `None` once the deadline passed.
    pub(crate) fn attempt_timeout(&self) -> Option<Duration> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let share = self.op_timeout / (self.chunk_retries.saturating_add(1));
        Some(share.min(remaining))
    }

    /// Run `request` against `node`, retrying transient failures within the
    /// retry budget and the operation deadline.
    pub(crate) async fn with_retries<T, F, Fut>(
        &self,
        node: &NodeAddr,
        index: usize,
        mut request: F,
    ) -> Result<T, NetError>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<T, NetError>>,
    {
        let mut attempt = 0u32;
        loop {
            let Some(timeout) = self.attempt_timeout() else {
                return Err(NetError::Timeout {
                    addr: node.clone(),
                    after: self.op_timeout,
                });
            };

            match request(timeout).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.chunk_retries => {
                    attempt += 1;
                    debug!(node = %node, index, attempt, error = %e, "retrying chunk request");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
