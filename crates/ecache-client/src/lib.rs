//! Erasure-coded distributed cache client.
//!
//! A [`Client`] stores arbitrary byte values in a cluster of independent
//! cache nodes. Each value is split into `d` data chunks plus `p` parity
//! chunks, placed deterministically on distinct nodes, and can be read back
//! while up to `p` of those nodes are unavailable.
//!
//! ```no_run
//! # async fn demo() -> Result<(), ecache_client::ClientError> {
//! let mut client = ecache_client::Client::new(2, 1, 0)?;
//! client.dial(&["10.0.0.1:6378", "10.0.0.2:6378", "10.0.0.3:6378"]).await?;
//! client.set("foo", b"Hello infinity!").await?;
//! assert_eq!(client.get("foo").await?, b"Hello infinity!");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod error;
mod op;
mod read;
mod write;

pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;

#[cfg(test)]
mod tests;
