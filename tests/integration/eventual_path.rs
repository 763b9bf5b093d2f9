//! The eventual-consistency direct-write path: weakly-consistent labels
//! skip the lock/CAS protocol entirely and still end up with a readable
//! edge.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvgraph::kv::InMemoryKv;
use kvgraph::model::{ConsistencyLevel, Direction, InnerVal, SchemaVersion, VertexId};
use kvgraph::query::QueryParam;
use kvgraph::schema::{IndexDef, InMemoryCatalog, Label};
use kvgraph::{CommitOutcome, Config, GraphClient};

fn label() -> Label {
    Label {
        id: 21,
        indices: vec![IndexDef {
            seq: 0,
            name: "default".into(),
            prop_seqs: vec![],
        }],
        metas: vec![],
        src_column: 1,
        tgt_column: 1,
        cluster: "test".into(),
        hbase_table: "views".into(),
        consistency_level: ConsistencyLevel::Weak,
        schema_version: SchemaVersion::V2,
    }
}

#[tokio::test]
async fn weak_label_writes_succeed_without_locking_and_are_readable() {
    let store = Arc::new(InMemoryKv::new());
    let catalog = Arc::new(InMemoryCatalog::new().with_label(label()));
    let client = GraphClient::new(store, catalog, Config::default());

    let src = VertexId::new(1, InnerVal::Long(1));
    let tgt = VertexId::new(1, InnerVal::Long(2));
    let outcome = client.upsert_edge(src.clone(), tgt, 21, 100, BTreeMap::new()).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Success);

    let param = QueryParam {
        src,
        label_id: 21,
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
async fn weak_label_delete_all_still_uses_the_strong_retry_machinery_internally() {
    // deleteAll always routes through the commit engine's `commit` dispatch,
    // which for a weakly-consistent label takes the direct-write branch on
    // every retry iteration rather than ever locking.
    let store = Arc::new(InMemoryKv::new());
    let catalog = Arc::new(InMemoryCatalog::new().with_label(label()));
    let client = GraphClient::new(store, catalog, Config::default());

    let src = VertexId::new(1, InnerVal::Long(5));
    let tgt = VertexId::new(1, InnerVal::Long(6));
    client.upsert_edge(src.clone(), tgt, 21, 50, BTreeMap::new()).await.unwrap();

    let deleted = client
        .delete_all_adjacent_edges(&src, 21, Direction::Out, 200)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
}
