//! Physical row-key and qualifier encoding.
//!
//! Three physical row shapes sit on top of [`crate::kv::KvStore`]: vertex
//! rows, index-edge rows, and snapshot-edge rows. Encoding is versioned by
//! [`SchemaVersion`] because V3 moves properties out of the row-key and
//! drops composite-qualifier packing that V1/V2 rely on.

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{GraphError, Result};
use crate::model::{
    ColumnId, Direction, Edge, EdgeIdentity, InnerVal, LabelId, OperationTag, PropSeq, PropValue,
    SchemaVersion, Vertex, VertexId, LABEL_PROP_KEY_BASE,
};

/// Inverts a timestamp so that lexicographic row-key order yields
/// most-recent-first scan order, matching the store's native sort.
pub fn invert_ts(ts: i64) -> i64 {
    i64::MAX - ts
}

fn write_inner_val(buf: &mut Vec<u8>, v: &InnerVal) -> Result<()> {
    match v {
        InnerVal::Long(n) => {
            buf.push(0);
            buf.write_i64::<BigEndian>(*n)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
        }
        InnerVal::Str(s) => {
            buf.push(1);
            buf.write_u16::<BigEndian>(s.len() as u16)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
            buf.extend_from_slice(s.as_bytes());
        }
        InnerVal::Composite(parts) => {
            buf.push(2);
            buf.push(parts.len() as u8);
            for part in parts {
                write_inner_val(buf, part)?;
            }
        }
    }
    Ok(())
}

fn read_inner_val(buf: &[u8], pos: &mut usize) -> Result<InnerVal> {
    let tag = *buf
        .get(*pos)
        .ok_or_else(|| GraphError::Corruption("truncated inner_val tag".into()))?;
    *pos += 1;
    match tag {
        0 => {
            let bytes = buf
                .get(*pos..*pos + 8)
                .ok_or_else(|| GraphError::Corruption("truncated inner_val long".into()))?;
            *pos += 8;
            Ok(InnerVal::Long(i64::from_be_bytes(bytes.try_into().unwrap())))
        }
        1 => {
            let len_bytes = buf
                .get(*pos..*pos + 2)
                .ok_or_else(|| GraphError::Corruption("truncated inner_val str len".into()))?;
            let len = u16::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
            *pos += 2;
            let s = buf
                .get(*pos..*pos + len)
                .ok_or_else(|| GraphError::Corruption("truncated inner_val str".into()))?;
            *pos += len;
            Ok(InnerVal::Str(
                String::from_utf8(s.to_vec()).map_err(|e| GraphError::Corruption(e.to_string()))?,
            ))
        }
        2 => {
            let count = *buf
                .get(*pos)
                .ok_or_else(|| GraphError::Corruption("truncated inner_val composite count".into()))?
                as usize;
            *pos += 1;
            let mut parts = Vec::with_capacity(count);
            for _ in 0..count {
                parts.push(read_inner_val(buf, pos)?);
            }
            Ok(InnerVal::Composite(parts))
        }
        other => Err(GraphError::Corruption(format!("unknown inner_val tag {other}"))),
    }
}

/// The row key identifying a vertex's physical row.
pub fn vertex_row_key(id: &VertexId) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(16);
    buf.write_u32::<BigEndian>(id.column_id)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    write_inner_val(&mut buf, &id.inner_id)?;
    Ok(buf)
}

/// Inverse of [`vertex_row_key`]: recovers a `VertexId` from its encoded
/// bytes, used to read the target id back out of an index-edge row key.
pub fn decode_vertex_row_key(bytes: &[u8]) -> Result<VertexId> {
    let col_bytes = bytes
        .get(0..4)
        .ok_or_else(|| GraphError::Corruption("truncated vertex row key column_id".into()))?;
    let column_id = u32::from_be_bytes(col_bytes.try_into().unwrap());
    let mut pos = 4usize;
    let inner_id = read_inner_val(bytes, &mut pos)?;
    Ok(VertexId { column_id, inner_id })
}

/// The row key identifying a snapshot-edge row: one per `(src, label,
/// direction, tgt)` tuple, the authoritative state for that edge.
pub fn snapshot_edge_row_key(identity: &EdgeIdentity) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(32);
    buf.extend_from_slice(&vertex_row_key(&identity.src)?);
    buf.write_u32::<BigEndian>(identity.label_id)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    buf.push(identity.dir.tag());
    buf.extend_from_slice(&vertex_row_key(&identity.tgt)?);
    Ok(buf)
}

/// The row key identifying an index-edge row under a given index: ordered by
/// `src`, index id, the indexed property tuple, inverted timestamp, then
/// `tgt` — so a range scan from the row prefix yields adjacency in the
/// index's declared order, most-recent first.
pub fn index_edge_row_key(
    identity: &EdgeIdentity,
    index_seq: u8,
    indexed_props: &[PropValue],
    ts: i64,
) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(48);
    buf.extend_from_slice(&vertex_row_key(&identity.src)?);
    buf.write_u32::<BigEndian>(identity.label_id)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    buf.push(identity.dir.tag());
    buf.push(index_seq);
    for prop in indexed_props {
        write_prop_value(&mut buf, prop)?;
    }
    buf.write_i64::<BigEndian>(invert_ts(ts))
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    buf.extend_from_slice(&vertex_row_key(&identity.tgt)?);
    Ok(buf)
}

/// Prefix of an index-edge row key shared by every edge for one `(src,
/// label, direction, index)` adjacency — the starting point for a degree
/// scan or a bounded adjacency range scan.
pub fn index_edge_prefix(src: &VertexId, label_id: LabelId, dir: Direction, index_seq: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&vertex_row_key(src)?);
    buf.write_u32::<BigEndian>(label_id)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    buf.push(dir.tag());
    buf.push(index_seq);
    Ok(buf)
}

pub(crate) fn write_prop_value(buf: &mut Vec<u8>, v: &PropValue) -> Result<()> {
    match v {
        PropValue::Bool(b) => {
            buf.push(0);
            buf.push(*b as u8);
        }
        PropValue::Long(n) => {
            buf.push(1);
            // XOR the sign bit so two's-complement big-endian longs sort
            // correctly as unsigned byte strings.
            buf.write_i64::<BigEndian>(n ^ i64::MIN)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
        }
        PropValue::Double(d) => {
            buf.push(2);
            buf.write_f64::<BigEndian>(*d)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
        }
        PropValue::Str(s) => {
            buf.push(3);
            buf.write_u16::<BigEndian>(s.len() as u16)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
            buf.extend_from_slice(s.as_bytes());
        }
        PropValue::Bytes(b) => {
            buf.push(4);
            buf.write_u16::<BigEndian>(b.len() as u16)
                .map_err(|e| GraphError::Serialization(e.to_string()))?;
            buf.extend_from_slice(b);
        }
    }
    Ok(())
}

/// Qualifier for a vertex row's regular property cell.
pub fn vertex_prop_qualifier(seq: PropSeq) -> Vec<u8> {
    vec![seq]
}

/// Qualifier marking that a vertex belongs to (is a valid source endpoint
/// for) the given label — lives past [`LABEL_PROP_KEY_BASE`] so it can never
/// collide with a property's `PropSeq`.
pub fn vertex_belongs_to_qualifier(label_id: LabelId) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(6);
    buf.write_u16::<BigEndian>(LABEL_PROP_KEY_BASE)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    buf.write_u32::<BigEndian>(label_id)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Qualifier for the lock-ts CAS sentinel cell on a snapshot-edge row.
pub const QUALIFIER_LOCK_TS: &[u8] = b"L";
/// Qualifier for the op-tag + version cell on a snapshot-edge row.
pub const QUALIFIER_META: &[u8] = b"M";
/// Qualifier prefix for a property cell on a snapshot-edge row (V1/V2); one
/// property per qualifier, `seq` appended.
pub fn snapshot_edge_prop_qualifier(seq: PropSeq) -> Vec<u8> {
    vec![b'P', seq]
}
/// Qualifier for the degree counter cell on an index-edge row's first row.
pub const QUALIFIER_DEGREE: &[u8] = b"D";

/// Serializes a vertex's meta + properties into the single value blob stored
/// under [`QUALIFIER_META`]-adjacent property qualifiers is not used; V3
/// instead collapses everything into one value cell. This returns that one
/// blob for V3, or `None` for V1/V2 where each property gets its own cell.
pub fn encode_vertex_value(vertex: &Vertex, version: SchemaVersion) -> Result<Option<Bytes>> {
    if version != SchemaVersion::V3 {
        return Ok(None);
    }
    let mut buf = Vec::new();
    buf.push(vertex.op.as_byte());
    buf.push(vertex.props.len() as u8);
    for (seq, value) in &vertex.props {
        buf.push(*seq);
        write_prop_value(&mut buf, value)?;
    }
    Ok(Some(Bytes::from(buf)))
}

pub fn decode_vertex_value(bytes: &[u8]) -> Result<(OperationTag, BTreeMap<PropSeq, PropValue>)> {
    let mut pos = 0usize;
    let op = OperationTag::from_byte(
        *bytes
            .get(pos)
            .ok_or_else(|| GraphError::Corruption("truncated vertex value op".into()))?,
    )?;
    pos += 1;
    let count = *bytes
        .get(pos)
        .ok_or_else(|| GraphError::Corruption("truncated vertex value count".into()))? as usize;
    pos += 1;
    let mut props = BTreeMap::new();
    for _ in 0..count {
        let seq = *bytes
            .get(pos)
            .ok_or_else(|| GraphError::Corruption("truncated vertex prop seq".into()))?;
        pos += 1;
        let value = read_prop_value(bytes, &mut pos)?;
        props.insert(seq, value);
    }
    Ok((op, props))
}

fn read_prop_value(buf: &[u8], pos: &mut usize) -> Result<PropValue> {
    let tag = *buf
        .get(*pos)
        .ok_or_else(|| GraphError::Corruption("truncated prop_value tag".into()))?;
    *pos += 1;
    match tag {
        0 => {
            let b = *buf
                .get(*pos)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value bool".into()))?;
            *pos += 1;
            Ok(PropValue::Bool(b != 0))
        }
        1 => {
            let bytes = buf
                .get(*pos..*pos + 8)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value long".into()))?;
            *pos += 8;
            let raw = i64::from_be_bytes(bytes.try_into().unwrap());
            Ok(PropValue::Long(raw ^ i64::MIN))
        }
        2 => {
            let bytes = buf
                .get(*pos..*pos + 8)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value double".into()))?;
            *pos += 8;
            Ok(PropValue::Double(f64::from_be_bytes(bytes.try_into().unwrap())))
        }
        3 => {
            let len_bytes = buf
                .get(*pos..*pos + 2)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value str len".into()))?;
            let len = u16::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
            *pos += 2;
            let s = buf
                .get(*pos..*pos + len)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value str".into()))?;
            *pos += len;
            Ok(PropValue::Str(
                String::from_utf8(s.to_vec()).map_err(|e| GraphError::Corruption(e.to_string()))?,
            ))
        }
        4 => {
            let len_bytes = buf
                .get(*pos..*pos + 2)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value bytes len".into()))?;
            let len = u16::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
            *pos += 2;
            let b = buf
                .get(*pos..*pos + len)
                .ok_or_else(|| GraphError::Corruption("truncated prop_value bytes".into()))?;
            *pos += len;
            Ok(PropValue::Bytes(b.to_vec()))
        }
        other => Err(GraphError::Corruption(format!("unknown prop_value tag {other}"))),
    }
}

/// Encodes an edge's meta + properties into the snapshot row's value blob,
/// written once under [`QUALIFIER_META`] regardless of schema version — only
/// the row-key layout differs by version, not the snapshot value shape.
pub fn encode_edge_meta(edge: &Edge) -> Result<Bytes> {
    let mut buf = Vec::new();
    buf.push(edge.op.as_byte());
    buf.write_i64::<BigEndian>(edge.ts)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    buf.push(edge.props.len() as u8);
    for (seq, value) in &edge.props {
        buf.push(*seq);
        write_prop_value(&mut buf, value)?;
    }
    Ok(Bytes::from(buf))
}

pub fn decode_edge_meta(bytes: &[u8]) -> Result<(OperationTag, i64, BTreeMap<PropSeq, PropValue>)> {
    let mut pos = 0usize;
    let op = OperationTag::from_byte(
        *bytes
            .get(pos)
            .ok_or_else(|| GraphError::Corruption("truncated edge meta op".into()))?,
    )?;
    pos += 1;
    let ts_bytes = bytes
        .get(pos..pos + 8)
        .ok_or_else(|| GraphError::Corruption("truncated edge meta ts".into()))?;
    let ts = i64::from_be_bytes(ts_bytes.try_into().unwrap());
    pos += 8;
    let count = *bytes
        .get(pos)
        .ok_or_else(|| GraphError::Corruption("truncated edge meta prop count".into()))? as usize;
    pos += 1;
    let mut props = BTreeMap::new();
    for _ in 0..count {
        let seq = *bytes
            .get(pos)
            .ok_or_else(|| GraphError::Corruption("truncated edge meta prop seq".into()))?;
        pos += 1;
        let value = read_prop_value(bytes, &mut pos)?;
        props.insert(seq, value);
    }
    Ok((op, ts, props))
}
