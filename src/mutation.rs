//! Builds the physical KV mutations for one logical edge or vertex write.
//!
//! [`MutationBuilder`] is the seam between the logical [`crate::model`] types
//! and the three physical row shapes in [`crate::codec`]. It does not talk to
//! the store itself — [`crate::commit`] sequences these mutations through the
//! lock/CAS protocol or writes them directly, depending on consistency level.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::codec;
use crate::error::Result;
use crate::kv::{Qualifier, Row};
use crate::model::{Direction, Edge, OperationTag, PropSeq, PropValue, Vertex};
use crate::schema::Label;

/// One physical cell write or delete, destined for [`crate::kv::KvStore`].
#[derive(Debug, Clone)]
pub enum Mutation {
    Put {
        row: Row,
        qualifier: Qualifier,
        value: Bytes,
        ts: i64,
    },
    Delete {
        row: Row,
        qualifier: Qualifier,
        ts: i64,
    },
    Increment {
        row: Row,
        qualifier: Qualifier,
        amount: i64,
        /// A one-byte marker distinguishes this from a plain counter
        /// increment: `true` increments the index row's degree counter,
        /// `false` is a bare user-visible count property an application
        /// stores alongside it.
        is_degree: bool,
        /// Selects which of the two KV client connections carries this
        /// increment: `true` for the buffered-flush client, `false` for the
        /// zero-flush-interval client used when a caller waits on the write.
        buffered: bool,
    },
}

/// The previously committed state of one edge identity's snapshot-edge row,
/// read before building this write's mutations so superseded index rows can
/// be retired and the degree delta reflects adjacency membership rather than
/// the caller's [`OperationTag`].
#[derive(Debug, Clone)]
pub struct SnapshotState {
    pub ts: i64,
    pub op: OperationTag,
    pub props: BTreeMap<PropSeq, PropValue>,
    /// The raw encoded bytes last written under [`codec::QUALIFIER_META`];
    /// carried through unchanged so the commit engine can use it as the lock
    /// CAS's expected/candidate value.
    pub raw: Bytes,
}

impl SnapshotState {
    pub fn is_live(&self) -> bool {
        !self.op.is_delete()
    }
}

/// The full set of physical writes one logical edge mutation produces:
/// the index-edge row(s) and the snapshot-edge row, kept separate because
/// the commit engine sequences them differently (index rows go through the
/// lock/CAS dance; the snapshot row is the lock itself).
#[derive(Debug, Clone, Default)]
pub struct EdgeMutate {
    pub index_mutations: Vec<Mutation>,
    pub snapshot_mutations: Vec<Mutation>,
    pub degree_delta: i64,
}

/// Builds physical mutations from logical vertex/edge writes, given a
/// label's schema to know row-key layout and which properties are indexed.
pub struct MutationBuilder;

impl MutationBuilder {
    /// Mutations for a vertex write or delete: the property cells plus, for
    /// `DeleteAll`, tombstones on every indexed property and the
    /// label-membership marker it stops declaring.
    pub fn vertex_mutations(vertex: &Vertex, schema_version: crate::model::SchemaVersion) -> Result<Vec<Mutation>> {
        let row = codec::vertex_row_key(&vertex.id)?;
        let mut out = Vec::new();

        if let Some(blob) = codec::encode_vertex_value(vertex, schema_version)? {
            out.push(Mutation::Put {
                row: row.clone(),
                qualifier: codec::QUALIFIER_META.to_vec(),
                value: blob,
                ts: vertex.ts,
            });
        } else {
            for (seq, value) in &vertex.props {
                let mut buf = Vec::new();
                codec::write_prop_value(&mut buf, value)?;
                if vertex.op.is_delete() {
                    out.push(Mutation::Delete {
                        row: row.clone(),
                        qualifier: codec::vertex_prop_qualifier(*seq),
                        ts: vertex.ts,
                    });
                } else {
                    out.push(Mutation::Put {
                        row: row.clone(),
                        qualifier: codec::vertex_prop_qualifier(*seq),
                        value: Bytes::from(buf),
                        ts: vertex.ts,
                    });
                }
            }
        }

        for label_id in &vertex.belongs_to_labels {
            let qualifier = codec::vertex_belongs_to_qualifier(*label_id)?;
            if vertex.op.is_delete() {
                out.push(Mutation::Delete {
                    row: row.clone(),
                    qualifier,
                    ts: vertex.ts,
                });
            } else {
                out.push(Mutation::Put {
                    row: row.clone(),
                    qualifier,
                    value: Bytes::new(),
                    ts: vertex.ts,
                });
            }
        }

        Ok(out)
    }

    /// Mutations for one direction of an edge write, given the previous
    /// snapshot state for that identity (`None` if it was never written).
    /// A live previous snapshot means this write supersedes an index-edge
    /// row keyed at the old `ts`, which must be deleted explicitly — the new
    /// write's own row key embeds its own `ts`, so it would never otherwise
    /// retire the old one. `degree_delta` follows the shape of the resulting
    /// delta (no-previous-to-live is `+1`, live-to-not-live is `-1`,
    /// anything else is `0`), not the caller's [`OperationTag`].
    pub fn edge_mutations(edge: &Edge, label: &Label, previous: Option<&SnapshotState>) -> Result<EdgeMutate> {
        let mut index_mutations = Vec::new();
        let meta = codec::encode_edge_meta(edge)?;
        let previous_live = previous.filter(|p| p.is_live());

        for index in &label.indices {
            if let Some(prev) = previous_live {
                let old_indexed_props: Vec<_> = index
                    .prop_seqs
                    .iter()
                    .filter_map(|seq| prev.props.get(seq).cloned())
                    .collect();
                let old_row = codec::index_edge_row_key(&edge.identity, index.seq, &old_indexed_props, prev.ts)?;
                index_mutations.push(Mutation::Delete {
                    row: old_row,
                    qualifier: codec::QUALIFIER_META.to_vec(),
                    ts: edge.ts,
                });
            }

            if !edge.op.is_delete() {
                let new_indexed_props: Vec<_> = index
                    .prop_seqs
                    .iter()
                    .filter_map(|seq| edge.props.get(seq).cloned())
                    .collect();
                let new_row = codec::index_edge_row_key(&edge.identity, index.seq, &new_indexed_props, edge.ts)?;
                index_mutations.push(Mutation::Put {
                    row: new_row,
                    qualifier: codec::QUALIFIER_META.to_vec(),
                    value: meta.clone(),
                    ts: edge.ts,
                });
            }
        }

        // The snapshot row itself is never removed: on delete it becomes a
        // tombstone (op = Delete/DeleteAll) rather than an absent cell, so a
        // later fetch still sees when and with what properties the edge was
        // last live.
        let snapshot_row = codec::snapshot_edge_row_key(&edge.identity)?;
        let snapshot_mutations = vec![Mutation::Put {
            row: snapshot_row,
            qualifier: codec::QUALIFIER_META.to_vec(),
            value: meta,
            ts: edge.ts,
        }];

        let new_live = !edge.op.is_delete();
        let had_live_previous = previous_live.is_some();
        let degree_delta = match (had_live_previous, new_live) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        };

        Ok(EdgeMutate {
            index_mutations,
            snapshot_mutations,
            degree_delta,
        })
    }

    /// The degree-counter increment mutation for an edge's first index row,
    /// keyed by the adjacency prefix shared across all edges in that
    /// `(src, label, direction)` bucket.
    pub fn degree_increment(edge: &Edge, label: &Label, amount: i64, buffered: bool) -> Result<Mutation> {
        let index = label.first_index()?;
        let row = codec::index_edge_prefix(&edge.identity.src, edge.identity.label_id, edge.identity.dir, index.seq)?;
        Ok(Mutation::Increment {
            row,
            qualifier: codec::QUALIFIER_DEGREE.to_vec(),
            amount,
            is_degree: true,
            buffered,
        })
    }
}

/// Produces the reversed-direction counterpart of an edge, for writing the
/// mirrored `in`/`out` row pair.
pub fn mirrored(edge: &Edge) -> Edge {
    let mut mirror = edge.clone();
    mirror.identity = edge.identity.reversed();
    mirror
}
