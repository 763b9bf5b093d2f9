//! Bounded adjacency deletion.
//!
//! `delete_all_adjacent_edges` repeatedly fetches a bounded page of a
//! source's adjacency, tombstones the edges older than the request
//! timestamp, and loops until a fetch returns nothing eligible. Only edges
//! with `ts < request_ts` are ever deleted, so an edge written concurrently
//! at a later timestamp survives — monotonicity the caller relies on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::codec;
use crate::commit::CommitEngine;
use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::kv::KvStore;
use crate::model::{Direction, Edge, LabelId, OperationTag, VertexId};
use crate::query::{Fetcher, QueryParam};
use crate::retry::{retry_on_failure, Backoff, DeadLetterQueue};
use crate::schema::Label;

/// Deletes every edge from `src` under `label_id`/`dir` whose timestamp
/// predates `request_ts`, processing in bounded batches of
/// `config.delete_all_fetch_size` and stopping once a fetch surfaces no
/// eligible edges. An edge whose own commit retry budget is exhausted is
/// dead-lettered rather than aborting the whole sweep — offline replay picks
/// it up later.
pub async fn delete_all_adjacent_edges<K: KvStore + 'static>(
    fetcher: &Fetcher<K>,
    commit_engine: &CommitEngine<K>,
    label: &Label,
    src: &VertexId,
    label_id: LabelId,
    dir: Direction,
    request_ts: i64,
    config: &Config,
    dead_letters: &DeadLetterQueue<Edge>,
) -> Result<usize> {
    let index_seq = label.first_index()?.seq;
    let mut total_deleted = 0usize;
    let backoff = Backoff {
        base: Duration::from_millis(10),
        max: config.commit_backoff.max,
        jitter_fraction: 0.25,
    };
    let prefix = codec::index_edge_prefix(src, label_id, dir, index_seq)?;

    loop {
        let param = QueryParam {
            src: src.clone(),
            label_id,
            dir,
            index_seq,
            offset: 0,
            limit: config.delete_all_fetch_size,
            min_ts: 0,
            max_ts: request_ts - 1,
        };
        let started = Instant::now();
        let page = fetcher.fetch(&param).await?;

        let eligible: Vec<_> = page
            .iter()
            .filter(|(_, cells)| cells.iter().any(|(q, cell)| q.as_slice() == codec::QUALIFIER_META && cell.timestamp < request_ts))
            .collect();

        if eligible.is_empty() {
            debug!(src_col = src.column_id, label_id, "delete_all converged, no eligible edges remain");
            break;
        }

        let batch_size = eligible.len();
        for (row, _cells) in &eligible {
            let tgt = extract_target_from_row(row, prefix.len())?;

            let identity = crate::model::EdgeIdentity {
                src: src.clone(),
                tgt,
                label_id,
                dir,
            };
            let mut edge = Edge::new(identity, request_ts);
            edge.op = OperationTag::DeleteAll;

            let outcome = retry_on_failure(config.commit_max_attempts, backoff, |_attempt| {
                let engine = commit_engine;
                let edge = edge.clone();
                let label = label.clone();
                async move {
                    let outcome = engine.commit(&edge, &label).await?;
                    if outcome.is_retryable() {
                        Err(GraphError::CommitFailed(outcome))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

            match outcome {
                Ok(()) => total_deleted += 1,
                Err(GraphError::RetryExhausted(attempts)) => {
                    tracing::warn!(attempts, "delete_all dead-lettering an edge after exhausting its retry budget");
                    dead_letters.push(edge);
                }
                Err(other) => return Err(other),
            }
        }

        info!(
            batch_size,
            total_deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "delete_all processed one batch"
        );

        if batch_size < config.delete_all_fetch_size {
            break;
        }
    }

    Ok(total_deleted)
}

/// Index-edge row keys end with the target vertex's encoded row key, after
/// the shared adjacency prefix and the inverted timestamp; this recovers it
/// without needing to carry the target id in the cell value. Assumes the
/// index carries no indexed properties between the prefix and the
/// timestamp, true of the first (default adjacency) index every label
/// declares.
fn extract_target_from_row(row: &[u8], prefix_len: usize) -> Result<VertexId> {
    let tgt_start = prefix_len + 8;
    let tgt_bytes = row
        .get(tgt_start..)
        .ok_or_else(|| GraphError::Corruption("index row key too short for target suffix".into()))?;
    codec::decode_vertex_row_key(tgt_bytes)
}
