//! # kvgraph
//!
//! A property-graph storage layer written directly against a wide-column
//! KV store. Vertices and edges are not stored relationally — every logical
//! entity maps onto one or more physical KV rows, and adjacency is modeled
//! as index rows ordered for efficient range scans.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use kvgraph::kv::InMemoryKv;
//! use kvgraph::schema::{InMemoryCatalog, IndexDef, Label};
//! use kvgraph::model::{ConsistencyLevel, SchemaVersion, InnerVal, VertexId};
//! use kvgraph::{Config, GraphClient};
//!
//! # async fn run() -> kvgraph::Result<()> {
//! let label = Label {
//!     id: 1,
//!     indices: vec![IndexDef { seq: 0, name: "default".into(), prop_seqs: vec![] }],
//!     metas: vec![],
//!     src_column: 1,
//!     tgt_column: 1,
//!     cluster: "default".into(),
//!     hbase_table: "edges".into(),
//!     consistency_level: ConsistencyLevel::Strong,
//!     schema_version: SchemaVersion::V2,
//! };
//! let catalog = Arc::new(InMemoryCatalog::new().with_label(label));
//! let store = Arc::new(InMemoryKv::new());
//! let client = GraphClient::new(store, catalog, Config::default());
//!
//! let a = VertexId::new(1, InnerVal::Long(1));
//! let b = VertexId::new(1, InnerVal::Long(2));
//! client.upsert_edge(a, b, 1, 100, Default::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`model`] — logical vertex/edge types, carried by nothing physical.
//! - [`schema`] — the narrow catalog interface consumed for label/column lookups.
//! - [`kv`] — the wide-column store trait and an in-memory reference impl.
//! - [`codec`] — physical row-key and qualifier encoding.
//! - [`mutation`] — logical writes to physical [`kv`] mutations.
//! - [`commit`] — the strong-consistency lock/CAS protocol and the eventual-consistency direct-write path.
//! - [`query`] — adjacency queries plus the coalescing/result cache fetcher.
//! - [`delete_all`] — bounded adjacency deletion.
//! - [`retry`] — retry combinators and backoff shared by [`commit`] and [`delete_all`].
//! - [`config`] — tunables and named presets.
//! - [`logging`] — optional tracing-subscriber bootstrap.

pub mod codec;
pub mod commit;
pub mod config;
pub mod delete_all;
pub mod error;
pub mod kv;
pub mod logging;
pub mod model;
pub mod mutation;
pub mod query;
pub mod retry;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::instrument;

use crate::commit::CommitEngine;
use crate::kv::KvStore;
use crate::model::{
    ConsistencyLevel, Direction, Edge, EdgeIdentity, InnerVal, LabelId, OperationTag, PropSeq, PropValue, Vertex,
    VertexId,
};
use crate::mutation::MutationBuilder;
use crate::query::{Fetcher, QueryParam};
use crate::retry::DeadLetterQueue;
use crate::schema::SchemaCatalog;

pub use crate::config::Config;
pub use crate::error::{CommitOutcome, GraphError, Result};

/// The facade every caller outside this crate is expected to use. Holds no
/// back-pointers: it owns `Arc`s to the store and catalog and builds the
/// commit engine and fetcher it needs from them, the same wiring pattern as
/// a handle that hands out borrowed sub-objects without a cycle.
pub struct GraphClient<K: KvStore> {
    store: Arc<K>,
    catalog: Arc<dyn SchemaCatalog>,
    commit_engine: CommitEngine<K>,
    fetcher: Fetcher<K>,
    config: Config,
    dead_letters: Arc<DeadLetterQueue<Edge>>,
}

impl<K: KvStore + 'static> GraphClient<K> {
    pub fn new(store: Arc<K>, catalog: Arc<dyn SchemaCatalog>, config: Config) -> Self {
        let commit_engine = CommitEngine::new(store.clone(), config.degree_increment_buffered);
        let fetcher = Fetcher::new(
            store.clone(),
            catalog.clone(),
            config.cache_result_capacity,
            config.cache_coalesce_ttl,
            config.cache_result_default_ttl,
        );
        Self {
            store,
            catalog,
            commit_engine,
            fetcher,
            config,
            dead_letters: Arc::new(DeadLetterQueue::new()),
        }
    }

    /// Edges whose commit or delete exhausted their retry budget, kept for
    /// offline inspection or manual replay. Not persisted across restarts.
    pub fn dead_letters(&self) -> &DeadLetterQueue<Edge> {
        &self.dead_letters
    }

    /// Writes a vertex's properties and label-membership markers.
    #[instrument(skip(self, props))]
    pub async fn put_vertex(
        &self,
        id: VertexId,
        ts: i64,
        props: BTreeMap<PropSeq, PropValue>,
        belongs_to_labels: Vec<LabelId>,
    ) -> Result<()> {
        let column = self.catalog.find_service_column(id.column_id)?;
        let mut vertex = Vertex::new(id, ts);
        vertex.props = props;
        vertex.belongs_to_labels = belongs_to_labels;
        let mutations = MutationBuilder::vertex_mutations(&vertex, column.schema_version)?;
        for mutation in mutations {
            self.apply_mutation(&mutation).await?;
        }
        Ok(())
    }

    /// Fetches a vertex's raw cells. Returns an empty map if the vertex has
    /// no stored cells under this id.
    pub async fn get_vertex(&self, id: &VertexId) -> Result<Vec<(Vec<u8>, kv::Cell)>> {
        let row = codec::vertex_row_key(id)?;
        self.store.get(&row, kv::CF_DEFAULT, &[]).await
    }

    /// Tombstones every cell of a vertex row.
    pub async fn delete_vertex(&self, id: VertexId, ts: i64, belongs_to_labels: Vec<LabelId>) -> Result<()> {
        let column = self.catalog.find_service_column(id.column_id)?;
        let mut vertex = Vertex::new(id, ts);
        vertex.op = OperationTag::Delete;
        vertex.belongs_to_labels = belongs_to_labels;
        let mutations = MutationBuilder::vertex_mutations(&vertex, column.schema_version)?;
        for mutation in mutations {
            self.apply_mutation(&mutation).await?;
        }
        Ok(())
    }

    /// Removes a single label-membership marker without touching the rest
    /// of the vertex row.
    pub async fn delete_vertex_belongs_to(&self, id: &VertexId, label_id: LabelId, ts: i64) -> Result<()> {
        let row = codec::vertex_row_key(id)?;
        let qualifier = codec::vertex_belongs_to_qualifier(label_id)?;
        self.store.delete(&row, kv::CF_DEFAULT, &qualifier, ts).await
    }

    /// Inserts or updates one directed edge (both row mirrors), routed
    /// through the strong or eventual commit path per the label's declared
    /// consistency level.
    #[instrument(skip(self, props))]
    pub async fn upsert_edge(
        &self,
        src: VertexId,
        tgt: VertexId,
        label_id: LabelId,
        ts: i64,
        props: BTreeMap<PropSeq, PropValue>,
    ) -> Result<CommitOutcome> {
        let label = self.catalog.find_label(label_id)?;
        let identity = EdgeIdentity {
            src,
            tgt,
            label_id,
            dir: Direction::Out,
        };
        let mut edge = Edge::new(identity, ts);
        edge.props = props;

        self.retry_commit(&edge, &label).await
    }

    /// Deletes a single directed edge.
    pub async fn delete_edge(&self, src: VertexId, tgt: VertexId, label_id: LabelId, ts: i64) -> Result<CommitOutcome> {
        let label = self.catalog.find_label(label_id)?;
        let identity = EdgeIdentity {
            src,
            tgt,
            label_id,
            dir: Direction::Out,
        };
        let mut edge = Edge::new(identity, ts);
        edge.op = OperationTag::Delete;

        self.retry_commit(&edge, &label).await
    }

    /// Reads a page of adjacency for one `(src, label, direction)` bucket.
    pub async fn get_edges(&self, param: &QueryParam) -> Result<Arc<Vec<(Vec<u8>, Vec<kv::QualifiedCell>)>>> {
        self.fetcher.fetch(param).await
    }

    /// Reads the degree counter for one `(src, label, direction)` adjacency
    /// bucket's first declared index, or `0` if nothing has ever been
    /// written under it.
    pub async fn get_degree(&self, src: &VertexId, label_id: LabelId, dir: Direction) -> Result<i64> {
        let label = self.catalog.find_label(label_id)?;
        let index = label.first_index()?;
        let row = codec::index_edge_prefix(src, label_id, dir, index.seq)?;
        let cells = self
            .store
            .get(&row, kv::CF_DEFAULT, &[codec::QUALIFIER_DEGREE.to_vec()])
            .await?;
        match cells.first() {
            Some((_, cell)) => {
                let bytes: [u8; 8] = cell
                    .value
                    .as_ref()
                    .try_into()
                    .map_err(|_| GraphError::Corruption("degree counter cell is not 8 bytes".into()))?;
                Ok(i64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    /// Tombstones every edge from `src` under `label_id`/`dir` older than
    /// `request_ts`.
    pub async fn delete_all_adjacent_edges(
        &self,
        src: &VertexId,
        label_id: LabelId,
        dir: Direction,
        request_ts: i64,
    ) -> Result<usize> {
        let label = self.catalog.find_label(label_id)?;
        crate::delete_all::delete_all_adjacent_edges(
            &self.fetcher,
            &self.commit_engine,
            &label,
            src,
            label_id,
            dir,
            request_ts,
            &self.config,
            &self.dead_letters,
        )
        .await
    }

    async fn retry_commit(&self, edge: &Edge, label: &crate::schema::Label) -> Result<CommitOutcome> {
        if label.consistency_level == ConsistencyLevel::Weak {
            return self.commit_engine.commit_eventual(edge, label).await;
        }
        let result = crate::retry::retry_on_success(
            self.config.commit_max_attempts,
            self.config.commit_backoff,
            |_attempt| self.commit_engine.commit_strong(edge, label),
            |outcome: &CommitOutcome| outcome.is_retryable(),
        )
        .await;
        if let Err(GraphError::RetryExhausted(_)) = &result {
            self.dead_letters.push(edge.clone());
        }
        result
    }

    async fn apply_mutation(&self, mutation: &mutation::Mutation) -> Result<()> {
        match mutation {
            mutation::Mutation::Put { row, qualifier, value, ts } => {
                self.store.put(row, kv::CF_DEFAULT, qualifier, value.clone(), *ts).await
            }
            mutation::Mutation::Delete { row, qualifier, ts } => {
                self.store.delete(row, kv::CF_DEFAULT, qualifier, *ts).await
            }
            mutation::Mutation::Increment {
                row,
                qualifier,
                amount,
                is_degree: _,
                buffered,
            } => self
                .store
                .atomic_increment(row, kv::CF_DEFAULT, qualifier, *amount, *buffered)
                .await
                .map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;
    use crate::schema::{IndexDef, InMemoryCatalog, Label};

    fn label_fixture(level: ConsistencyLevel) -> Label {
        Label {
            id: 1,
            indices: vec![IndexDef {
                seq: 0,
                name: "default".into(),
                prop_seqs: vec![],
            }],
            metas: vec![],
            src_column: 1,
            tgt_column: 1,
            cluster: "default".into(),
            hbase_table: "edges".into(),
            consistency_level: level,
            schema_version: crate::model::SchemaVersion::V2,
        }
    }

    fn catalog(level: ConsistencyLevel) -> Arc<dyn SchemaCatalog> {
        Arc::new(
            InMemoryCatalog::new()
                .with_label(label_fixture(level))
                .with_column(
                    1,
                    crate::schema::ServiceColumn {
                        service_id: 1,
                        column_name: "user".into(),
                        schema_version: crate::model::SchemaVersion::V2,
                        meta_map: Default::default(),
                    },
                ),
        )
    }

    #[tokio::test]
    async fn upsert_then_fetch_round_trips_an_edge() {
        let store = Arc::new(InMemoryKv::new());
        let client = GraphClient::new(store, catalog(ConsistencyLevel::Strong), Config::default());

        let a = VertexId::new(1, InnerVal::Long(1));
        let b = VertexId::new(1, InnerVal::Long(2));
        let outcome = client.upsert_edge(a.clone(), b, 1, 100, Default::default()).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Success);

        let param = QueryParam {
            src: a,
            label_id: 1,
            dir: Direction::Out,
            index_seq: 0,
            offset: 0,
            limit: 10,
            min_ts: 0,
            max_ts: i64::MAX,
        };
        let page = client.get_edges(&param).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn put_and_get_vertex_round_trips_properties() {
        let store = Arc::new(InMemoryKv::new());
        let client = GraphClient::new(store, catalog(ConsistencyLevel::Strong), Config::default());
        let id = VertexId::new(1, InnerVal::Long(42));
        let mut props = BTreeMap::new();
        props.insert(0u8, PropValue::Str("alice".into()));
        client.put_vertex(id.clone(), 10, props, vec![1]).await.unwrap();

        let cells = client.get_vertex(&id).await.unwrap();
        assert!(!cells.is_empty());
    }

    #[tokio::test]
    async fn weak_consistency_label_skips_locking() {
        let store = Arc::new(InMemoryKv::new());
        let client = GraphClient::new(store, catalog(ConsistencyLevel::Weak), Config::default());
        let a = VertexId::new(1, InnerVal::Long(1));
        let b = VertexId::new(1, InnerVal::Long(2));
        let outcome = client.upsert_edge(a, b, 1, 100, Default::default()).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Success);
    }
}
