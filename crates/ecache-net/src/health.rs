//! Per-node health tracking.
//!
//! A node starts `Healthy`. Any transport failure makes it `Unhealthy`,
//! which forces the next request to reconnect with backoff. If that
//! reconnect also fails the node is `Suspended` for a fixed window, during
//! which requests fail immediately.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Externally visible health of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHealth {
    /// Requests go straight to pooled connections.
    Healthy,
    /// The last request failed; the next one reconnects first.
    Unhealthy {
        /// Consecutive failures seen.
        failures: u32,
    },
    /// Reconnect failed; requests fail fast until the window passes.
    Suspended {
        /// Consecutive failures seen.
        failures: u32,
        /// Time left in the fail-fast window.
        retry_in: Duration,
    },
}

impl NodeHealth {
    /// Whether the node is currently considered reachable.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for NodeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Unhealthy { failures } => write!(f, "unhealthy ({failures} failures)"),
            Self::Suspended { failures, retry_in } => {
                write!(f, "suspended ({failures} failures, retry in {retry_in:?})")
            }
        }
    }
}

/// Mutable health record kept by the connection manager.
#[derive(Debug, Clone, Default)]
pub(crate) struct HealthState {
    failures: u32,
    suspended_until: Option<Instant>,
}

impl HealthState {
    pub(crate) fn snapshot(&self, now: Instant) -> NodeHealth {
        match self.suspended_until {
            _ if self.failures == 0 => NodeHealth::Healthy,
            Some(until) if until > now => NodeHealth::Suspended {
                failures: self.failures,
                retry_in: until - now,
            },
            _ => NodeHealth::Unhealthy {
                failures: self.failures,
            },
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.failures == 0
    }

    /// Remaining fail-fast time, if the node is suspended.
    pub(crate) fn suspended_for(&self, now: Instant) -> Option<Duration> {
        self.suspended_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    pub(crate) fn record_success(&mut self) {
        self.failures = 0;
        self.suspended_until = None;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub(crate) fn suspend(&mut self, now: Instant, window: Duration) {
        self.record_failure();
        self.suspended_until = Some(now + window);
    }
}
