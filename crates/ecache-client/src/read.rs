//! Read path: fetch from every placement node, validate, decode.

use std::collections::{BTreeMap, HashMap};

use ecache_erasure::ErasureError;
use ecache_placement::PlacementResolver;
use ecache_types::{Chunk, Redundancy, ValueId};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::op::OpContext;

/// Upper bound on decode attempts triggered by one arriving chunk.
const MAX_SUBSETS_PER_CHUNK: usize = 256;

/// Fetch and reconstruct the value stored under `key`.
///
/// All `d + p` chunk reads run concurrently. Valid chunks are grouped by
/// the write they belong to ([`ValueId`]); once a group holds `d` distinct
/// indices it is decoded and the remaining reads are dropped. A group whose
/// decode fails stays open: each later chunk of that write is tried in
/// every `d`-subset it completes, so up to `p` bad chunks are tolerated.
pub(crate) async fn read_value(
    ctx: &OpContext<'_>,
    placement: &PlacementResolver,
    key: &str,
) -> Result<Vec<u8>, ClientError> {
    let redundancy = ctx.redundancy;
    let d = redundancy.data_chunks;
    let nodes = placement.placement(key, redundancy.total());

    let mut pending: FuturesUnordered<_> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| async move {
            let result = ctx
                .with_retries(node, index, |timeout| {
                    ctx.transport.get_chunk(node, key, index as u16, timeout)
                })
                .await;
            (index, node, result)
        })
        .collect();

    let mut groups: HashMap<ValueId, BTreeMap<usize, Chunk>> = HashMap::new();
    let mut decode_error: Option<ClientError> = None;
    let mut not_found = 0usize;
    let mut returned = 0usize;

    loop {
        if best_group(&groups) + pending.len() < d {
            break;
        }

        let (index, node, result) = match timeout_at(ctx.deadline, pending.next()).await {
            Ok(Some(next)) => next,
            Ok(None) => break,
            Err(_) => {
                warn!(key, outstanding = pending.len(), "read deadline reached");
                break;
            }
        };

        let chunk = match result {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                not_found += 1;
                debug!(key, index, node = %node, "chunk not found");
                continue;
            }
            Err(e) => {
                warn!(key, index, node = %node, error = %e, "chunk read failed");
                continue;
            }
        };
        returned += 1;

        if let Err(reason) = validate(&chunk, key, index, redundancy) {
            warn!(key, index, node = %node, reason, "discarding invalid chunk");
            continue;
        }

        let value_id = chunk.header.value_id;
        let group = groups.entry(value_id).or_default();
        group.insert(index, chunk);
        if group.len() < d {
            continue;
        }

        match decode_including(redundancy, group, index) {
            Ok(value) => {
                info!(
                    key,
                    value_len = value.len(),
                    chunks = group.len(),
                    %value_id,
                    "get complete"
                );
                return Ok(value);
            }
            Err(e) => {
                warn!(key, %value_id, index, error = %e, "decode failed");
                decode_error = Some(e.into());
            }
        }
    }

    if returned == 0 && not_found > redundancy.parity_chunks {
        return Err(ClientError::KeyNotFound(key.to_string()));
    }
    // A full group existed but none of its subsets decoded.
    if let Some(err) = decode_error {
        return Err(err);
    }
    Err(ClientError::InsufficientShards {
        needed: d,
        found: best_group(&groups),
    })
}

/// Size of the largest group of valid chunks from a single write.
fn best_group(groups: &HashMap<ValueId, BTreeMap<usize, Chunk>>) -> usize {
    groups.values().map(BTreeMap::len).max().unwrap_or(0)
}

/// Decode `group` from `d`-subsets that contain the chunk at `newest`.
///
/// Subsets without `newest` were tried when their own last chunk arrived,
/// so across arrivals every `d`-subset of the group is tried once.
fn decode_including(
    redundancy: Redundancy,
    group: &BTreeMap<usize, Chunk>,
    newest: usize,
) -> Result<Vec<u8>, ErasureError> {
    let d = redundancy.data_chunks;
    let Some(latest) = group.get(&newest) else {
        return Err(ErasureError::InsufficientShards {
            needed: d,
            got: group.len(),
        });
    };
    let others: Vec<&Chunk> = group
        .iter()
        .filter(|(i, _)| **i != newest)
        .map(|(_, chunk)| chunk)
        .collect();

    let mut last_error = ErasureError::InsufficientShards {
        needed: d,
        got: group.len(),
    };
    for picked in Combinations::new(others.len(), d - 1).take(MAX_SUBSETS_PER_CHUNK) {
        let mut subset: Vec<Chunk> = picked.iter().map(|&i| others[i].clone()).collect();
        subset.push(latest.clone());
        match ecache_erasure::decode(redundancy, &subset) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// `k`-element index combinations of `0..n`, in lexicographic order.
struct Combinations {
    n: usize,
    next: Option<Vec<usize>>,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            next: (k <= n).then(|| (0..k).collect()),
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let k = current.len();
        let mut following = current.clone();
        // Rightmost position that can still move right.
        if let Some(pos) = (0..k).rev().find(|&i| following[i] < self.n - k + i) {
            following[pos] += 1;
            for i in pos + 1..k {
                following[i] = following[i - 1] + 1;
            }
            self.next = Some(following);
        }
        Some(current)
    }
}

/// Check that a fetched chunk is intact and is the chunk that was asked for.
fn validate(
    chunk: &Chunk,
    key: &str,
    index: usize,
    redundancy: Redundancy,
) -> Result<(), &'static str> {
    let header = &chunk.header;
    if header.key != key {
        return Err("key mismatch");
    }
    if header.index as usize != index {
        return Err("index mismatch");
    }
    if header.redundancy() != redundancy {
        return Err("redundancy mismatch");
    }
    if !chunk.verify() {
        return Err("checksum mismatch");
    }
    Ok(())
}
