//! Bounded deleteAll: only edges strictly older than the request timestamp
//! are removed, preserving monotonicity against concurrent later writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvgraph::kv::InMemoryKv;
use kvgraph::model::{ConsistencyLevel, Direction, InnerVal, SchemaVersion, VertexId};
use kvgraph::query::QueryParam;
use kvgraph::schema::{IndexDef, InMemoryCatalog, Label};
use kvgraph::{Config, GraphClient};

fn label() -> Label {
    Label {
        id: 5,
        indices: vec![IndexDef {
            seq: 0,
            name: "default".into(),
            prop_seqs: vec![],
        }],
        metas: vec![],
        src_column: 1,
        tgt_column: 1,
        cluster: "test".into(),
        hbase_table: "friend".into(),
        consistency_level: ConsistencyLevel::Strong,
        schema_version: SchemaVersion::V2,
    }
}

#[tokio::test]
async fn delete_all_tombstones_only_edges_older_than_request_ts() {
    let store = Arc::new(InMemoryKv::new());
    let catalog = Arc::new(InMemoryCatalog::new().with_label(label()));
    let client = GraphClient::new(store, catalog, Config::default());

    let src = VertexId::new(1, InnerVal::Long(1));
    // Five edges at t1..t5, all below the request timestamp, plus one at t6
    // above it.
    for (n, ts) in [(1, 10i64), (2, 20), (3, 30), (4, 40), (5, 50), (6, 1_000)] {
        let tgt = VertexId::new(1, InnerVal::Long(n));
        client.upsert_edge(src.clone(), tgt, 5, ts, BTreeMap::new()).await.unwrap();
    }

    let deleted = client
        .delete_all_adjacent_edges(&src, 5, Direction::Out, 100)
        .await
        .unwrap();
    assert_eq!(deleted, 5, "only the five edges with ts < 100 are eligible");

    let param = QueryParam {
        src,
        label_id: 5,
        dir: Direction::Out,
        index_seq: 0,
        offset: 0,
        limit: 100,
        min_ts: 0,
        max_ts: i64::MAX,
    };
    let remaining = client.get_edges(&param).await.unwrap();
    assert_eq!(remaining.len(), 1, "the edge newer than the request timestamp must survive");
}
