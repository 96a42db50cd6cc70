//! Write path: encode, fan out, wait for the write quorum.

use ecache_erasure::ErasureEncoder;
use ecache_placement::PlacementResolver;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::op::OpContext;

/// Store `value` under `key`.
///
/// All `d + p` chunk writes run concurrently. Returns as soon as
/// `write_quorum` nodes acknowledged, dropping the writes still in flight,
/// or as soon as enough writes failed that the quorum cannot be met.
/// Nothing is rolled back on failure.
pub(crate) async fn write_value(
    ctx: &OpContext<'_>,
    placement: &PlacementResolver,
    encoder: &ErasureEncoder,
    write_quorum: usize,
    key: &str,
    value: &[u8],
) -> Result<(), ClientError> {
    let chunks = encoder.encode(key, value)?;
    let nodes = placement.placement(key, chunks.len());
    let total = chunks.len();

    let mut pending: FuturesUnordered<_> = chunks
        .iter()
        .zip(&nodes)
        .map(|(chunk, node)| async move {
            let result = ctx
                .with_retries(node, chunk.index(), |timeout| {
                    ctx.transport.put_chunk(node, chunk, timeout)
                })
                .await;
            (chunk.index(), node, result)
        })
        .collect();

    let mut acked = 0usize;
    let mut failed = 0usize;
    while acked < write_quorum && total - failed >= write_quorum {
        let next = match timeout_at(ctx.deadline, pending.next()).await {
            Ok(Some(next)) => next,
            Ok(None) => break,
            Err(_) => {
                warn!(key, acked, outstanding = pending.len(), "write deadline reached");
                break;
            }
        };

        match next {
            (index, node, Ok(())) => {
                acked += 1;
                debug!(key, index, node = %node, "chunk acknowledged");
            }
            (index, node, Err(e)) => {
                failed += 1;
                warn!(key, index, node = %node, error = %e, "chunk write failed");
            }
        }
    }

    // Best-effort cancellation of writes beyond the quorum.
    drop(pending);

    if acked >= write_quorum {
        info!(
            key,
            value_len = value.len(),
            acked,
            total,
            redundancy = %ctx.redundancy,
            "set complete"
        );
        Ok(())
    } else {
        Err(ClientError::WriteQuorum {
            needed: write_quorum,
            acked,
        })
    }
}
