//! Schema catalog shim.
//!
//! The core never embeds a schema store: it is written entirely against the
//! narrow [`SchemaCatalog`] trait below, matching the consumed interface in
//! the external-interfaces section of the design. [`InMemoryCatalog`] is a
//! plain registry for this crate's own tests and doctests, not a production
//! catalog client — wiring a real one means implementing the trait.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::model::{ColumnId, ConsistencyLevel, LabelId, PropSeq, SchemaVersion};

/// A schema column, scoped to a service, as looked up by [`SchemaCatalog::find_service_column`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceColumn {
    pub service_id: u32,
    pub column_name: String,
    pub schema_version: SchemaVersion,
    pub meta_map: HashMap<PropSeq, String>,
}

/// One property slot declared on a label, as looked up by [`SchemaCatalog::label_meta`].
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMeta {
    pub seq: PropSeq,
    pub name: String,
    pub type_name: String,
    pub default: Option<String>,
}

/// An index declared on a label: the ordered tuple of property sequences
/// that determine index-edge row-key ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub seq: u8,
    pub name: String,
    pub prop_seqs: Vec<PropSeq>,
}

/// A label (edge type), as looked up by [`SchemaCatalog::find_label`].
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub id: LabelId,
    pub indices: Vec<IndexDef>,
    pub metas: Vec<LabelMeta>,
    pub src_column: ColumnId,
    pub tgt_column: ColumnId,
    pub cluster: String,
    pub hbase_table: String,
    pub consistency_level: ConsistencyLevel,
    pub schema_version: SchemaVersion,
}

impl Label {
    /// The first declared index, whose first row carries the degree counter.
    pub fn first_index(&self) -> Result<&IndexDef> {
        self.indices
            .first()
            .ok_or(GraphError::InvalidArgument(format!(
                "label {} declares no indices",
                self.id
            )))
    }
}

/// Read-mostly schema lookups the core consumes. Implementations are
/// expected to cache locally against a remote catalog and refresh out of
/// band; this crate does not prescribe invalidation policy.
pub trait SchemaCatalog: Send + Sync {
    fn find_service_column(&self, id: ColumnId) -> Result<ServiceColumn>;
    fn find_label(&self, id: LabelId) -> Result<Label>;
    fn label_meta(&self, label_id: LabelId, seq: PropSeq) -> Result<LabelMeta>;
}

/// An in-memory [`SchemaCatalog`] for tests and examples.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    columns: HashMap<ColumnId, ServiceColumn>,
    labels: HashMap<LabelId, Label>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, id: ColumnId, column: ServiceColumn) -> Self {
        self.columns.insert(id, column);
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.insert(label.id, label);
        self
    }
}

impl SchemaCatalog for InMemoryCatalog {
    fn find_service_column(&self, id: ColumnId) -> Result<ServiceColumn> {
        self.columns
            .get(&id)
            .cloned()
            .ok_or(GraphError::NotFound("service column"))
    }

    fn find_label(&self, id: LabelId) -> Result<Label> {
        self.labels
            .get(&id)
            .cloned()
            .ok_or(GraphError::NotFound("label"))
    }

    fn label_meta(&self, label_id: LabelId, seq: PropSeq) -> Result<LabelMeta> {
        let label = self.find_label(label_id)?;
        label
            .metas
            .iter()
            .find(|meta| meta.seq == seq)
            .cloned()
            .ok_or(GraphError::NotFound("label meta"))
    }
}
