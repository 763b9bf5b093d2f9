//! Degree-counter bookkeeping across insert/update/delete on the same
//! adjacency bucket.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvgraph::kv::InMemoryKv;
use kvgraph::model::{ConsistencyLevel, Direction, InnerVal, SchemaVersion, VertexId};
use kvgraph::query::QueryParam;
use kvgraph::schema::{IndexDef, InMemoryCatalog, Label};
use kvgraph::{CommitOutcome, Config, GraphClient};

fn label() -> Label {
    Label {
        id: 9,
        indices: vec![IndexDef {
            seq: 0,
            name: "default".into(),
            prop_seqs: vec![],
        }],
        metas: vec![],
        src_column: 1,
        tgt_column: 1,
        cluster: "test".into(),
        hbase_table: "follows".into(),
        consistency_level: ConsistencyLevel::Strong,
        schema_version: SchemaVersion::V2,
    }
}

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new().with_label(label()))
}

#[tokio::test]
async fn inserting_multiple_edges_grows_the_adjacency_page_and_the_degree_counter() {
    let store = Arc::new(InMemoryKv::new());
    let client = GraphClient::new(store, catalog(), Config::default());

    let src = VertexId::new(1, InnerVal::Long(1));
    for n in 0..5 {
        let tgt = VertexId::new(1, InnerVal::Long(n));
        let outcome = client
            .upsert_edge(src.clone(), tgt, 9, 1_000 + n, BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Success);
        let degree = client.get_degree(&src, 9, Direction::Out).await.unwrap();
        assert_eq!(degree, n + 1, "each distinct edge identity grows the degree counter by one");
    }

    let param = QueryParam {
        src: src.clone(),
        label_id: 9,
        dir: Direction::Out,
        index_seq: 0,
        offset: 0,
        limit: 100,
        min_ts: 0,
        max_ts: i64::MAX,
    };
    let page = client.get_edges(&param).await.unwrap();
    assert_eq!(page.len(), 5);
}

#[tokio::test]
async fn insert_insert_delete_walks_the_degree_counter_one_two_one() {
    let store = Arc::new(InMemoryKv::new());
    let client = GraphClient::new(store, catalog(), Config::default());

    let src = VertexId::new(1, InnerVal::Long(2));
    let tgt_a = VertexId::new(1, InnerVal::Long(10));
    let tgt_b = VertexId::new(1, InnerVal::Long(11));

    client.upsert_edge(src.clone(), tgt_a.clone(), 9, 100, BTreeMap::new()).await.unwrap();
    assert_eq!(client.get_degree(&src, 9, Direction::Out).await.unwrap(), 1);

    client.upsert_edge(src.clone(), tgt_b, 9, 200, BTreeMap::new()).await.unwrap();
    assert_eq!(client.get_degree(&src, 9, Direction::Out).await.unwrap(), 2);

    client.delete_edge(src.clone(), tgt_a.clone(), 9, 300).await.unwrap();
    assert_eq!(client.get_degree(&src, 9, Direction::Out).await.unwrap(), 1);

    let param = QueryParam {
        src,
        label_id: 9,
        dir: Direction::Out,
        index_seq: 0,
        offset: 0,
        limit: 100,
        min_ts: 0,
        max_ts: i64::MAX,
    };
    let page = client.get_edges(&param).await.unwrap();
    assert_eq!(page.len(), 1, "the deleted edge's index row should be tombstoned");
}

#[tokio::test]
async fn recommitting_the_same_identity_does_not_inflate_the_degree_counter() {
    let store = Arc::new(InMemoryKv::new());
    let client = GraphClient::new(store, catalog(), Config::default());

    let src = VertexId::new(1, InnerVal::Long(3));
    let tgt = VertexId::new(1, InnerVal::Long(20));

    client.upsert_edge(src.clone(), tgt.clone(), 9, 100, BTreeMap::new()).await.unwrap();
    assert_eq!(client.get_degree(&src, 9, Direction::Out).await.unwrap(), 1);

    // a second write to the same identity at a later ts is an update, not a
    // fresh insert — the degree counter must not move.
    client.upsert_edge(src.clone(), tgt, 9, 200, BTreeMap::new()).await.unwrap();
    assert_eq!(client.get_degree(&src, 9, Direction::Out).await.unwrap(), 1);

    let param = QueryParam {
        src,
        label_id: 9,
        dir: Direction::Out,
        index_seq: 0,
        offset: 0,
        limit: 100,
        min_ts: 0,
        max_ts: i64::MAX,
    };
    let page = client.get_edges(&param).await.unwrap();
    assert_eq!(page.len(), 1, "the stale row from the first write must be retired, not left behind");
}
