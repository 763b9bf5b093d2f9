//! Data models for graph entities.
//!
//! This module defines the logical shapes the [`crate::codec`] maps to and
//! from KV rows: vertices, edge identities, and the property values they
//! carry. Nothing here knows about physical row-key layout.

use std::collections::BTreeMap;

/// Identifies a schema column a vertex belongs to.
pub type ColumnId = u32;

/// Identifies a label (an edge type) in the schema catalog.
pub type LabelId = u32;

/// Sequence number of a property within a label's or column's meta list.
/// Regular vertex-property qualifiers are this value as a single byte;
/// see [`LABEL_PROP_KEY_BASE`] for the label-membership qualifier space.
pub type PropSeq = u8;

/// Qualifier offset at which label-membership markers on a vertex row begin,
/// so they never collide with a regular property's `PropSeq` qualifier.
pub const LABEL_PROP_KEY_BASE: u16 = 128;

/// A typed value for a vertex's `inner_id`.
///
/// Vertices are addressed by `(column_id, inner_id)`; `inner_id` may be a
/// plain scalar or, for compound keys, a tuple of scalars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InnerVal {
    Long(i64),
    Str(String),
    Composite(Vec<InnerVal>),
}

/// A property value stored on a vertex or edge.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Long(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl PropValue {
    /// Orders two property values of the same variant; used when packing
    /// indexed property tuples into an index-edge row-key.
    pub fn partial_cmp_value(&self, other: &PropValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (PropValue::Bool(a), PropValue::Bool(b)) => a.partial_cmp(b),
            (PropValue::Long(a), PropValue::Long(b)) => a.partial_cmp(b),
            (PropValue::Double(a), PropValue::Double(b)) => a.partial_cmp(b),
            (PropValue::Str(a), PropValue::Str(b)) => a.partial_cmp(b),
            (PropValue::Bytes(a), PropValue::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Direction of an edge relative to its source vertex.
///
/// An edge physically exists as two mirrored rows, one per direction; this
/// enum selects which mirror a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    pub fn flip(self) -> Direction {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Direction::Out => 0,
            Direction::In => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Direction> {
        match tag {
            0 => Some(Direction::Out),
            1 => Some(Direction::In),
            _ => None,
        }
    }
}

/// The operation an entity's row was last written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationTag {
    Insert,
    Update,
    Delete,
    DeleteAll,
    InsertBulk,
}

impl OperationTag {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            OperationTag::Insert => 0,
            OperationTag::Update => 1,
            OperationTag::Delete => 2,
            OperationTag::DeleteAll => 3,
            OperationTag::InsertBulk => 4,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Result<OperationTag, crate::error::GraphError> {
        match byte {
            0 => Ok(OperationTag::Insert),
            1 => Ok(OperationTag::Update),
            2 => Ok(OperationTag::Delete),
            3 => Ok(OperationTag::DeleteAll),
            4 => Ok(OperationTag::InsertBulk),
            other => Err(crate::error::GraphError::Corruption(format!(
                "unknown operation tag byte {other}"
            ))),
        }
    }

    pub fn is_delete(self) -> bool {
        matches!(self, OperationTag::Delete | OperationTag::DeleteAll)
    }
}

/// Numeric tag selecting a codec variant. V3 changes where properties live
/// and what participates in the row-key (see [`crate::codec`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    V1,
    V2,
    V3,
}

/// Per-label consistency regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    Strong,
    Weak,
}

/// Identifies a vertex by its schema column and typed inner id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexId {
    pub column_id: ColumnId,
    pub inner_id: InnerVal,
}

impl VertexId {
    pub fn new(column_id: ColumnId, inner_id: InnerVal) -> Self {
        Self {
            column_id,
            inner_id,
        }
    }
}

/// A vertex: identity, version, operation tag, properties, and the labels it
/// participates in as a source (its "belongs-to" set).
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub ts: i64,
    pub op: OperationTag,
    pub props: BTreeMap<PropSeq, PropValue>,
    pub belongs_to_labels: Vec<LabelId>,
}

impl Vertex {
    pub fn new(id: VertexId, ts: i64) -> Self {
        Self {
            id,
            ts,
            op: OperationTag::Insert,
            props: BTreeMap::new(),
            belongs_to_labels: Vec::new(),
        }
    }
}

/// The identity of an edge: endpoints, label, and the direction this
/// particular row represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeIdentity {
    pub src: VertexId,
    pub tgt: VertexId,
    pub label_id: LabelId,
    pub dir: Direction,
}

impl EdgeIdentity {
    /// The identity of the mirrored row on the other side of this edge.
    pub fn reversed(&self) -> EdgeIdentity {
        EdgeIdentity {
            src: self.tgt.clone(),
            tgt: self.src.clone(),
            label_id: self.label_id,
            dir: self.dir.flip(),
        }
    }
}

/// A logical edge carrying its identity, version, operation tag, and
/// properties. This is the unit the [`crate::commit`] engine and
/// [`crate::mutation`] builder operate on.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub identity: EdgeIdentity,
    pub ts: i64,
    pub op: OperationTag,
    pub props: BTreeMap<PropSeq, PropValue>,
}

impl Edge {
    pub fn new(identity: EdgeIdentity, ts: i64) -> Self {
        Self {
            identity,
            ts,
            op: OperationTag::Insert,
            props: BTreeMap::new(),
        }
    }
}
