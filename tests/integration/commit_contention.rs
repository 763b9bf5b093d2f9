//! Concurrent writers targeting the same edge identity under strong
//! consistency: every attempt must eventually succeed and the adjacency
//! bucket must end up with exactly one edge, never a duplicate or a lost
//! update.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvgraph::kv::InMemoryKv;
use kvgraph::model::{ConsistencyLevel, Direction, InnerVal, SchemaVersion, VertexId};
use kvgraph::query::QueryParam;
use kvgraph::schema::{IndexDef, InMemoryCatalog, Label};
use kvgraph::{Config, GraphClient};

fn label() -> Label {
    Label {
        id: 3,
        indices: vec![IndexDef {
            seq: 0,
            name: "default".into(),
            prop_seqs: vec![],
        }],
        metas: vec![],
        src_column: 1,
        tgt_column: 1,
        cluster: "test".into(),
        hbase_table: "edges".into(),
        consistency_level: ConsistencyLevel::Strong,
        schema_version: SchemaVersion::V2,
    }
}

#[tokio::test]
async fn concurrent_writers_at_different_timestamps_on_the_same_identity_both_succeed() {
    let store = Arc::new(InMemoryKv::new());
    let catalog = Arc::new(InMemoryCatalog::new().with_label(label()));
    let client = Arc::new(GraphClient::new(store, catalog, Config::default()));

    let src = VertexId::new(1, InnerVal::Long(1));
    let tgt = VertexId::new(1, InnerVal::Long(2));

    // Two genuinely distinct timestamps on the same edge identity: whichever
    // writer loses the lock race gets `LockContended` and retries until the
    // other releases. The self-retry check inside `acquire_lock` compares
    // the previous snapshot's full value bytes, not just `lock_ts`, so these
    // two writers — which never observe the same snapshot content once
    // either one commits — can never be mistaken for the same retrying
    // writer and both proceed past the lock unsynchronized.
    let client_a = client.clone();
    let src_a = src.clone();
    let tgt_a = tgt.clone();
    let client_b = client.clone();
    let src_b = src.clone();
    let tgt_b = tgt.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { client_a.upsert_edge(src_a, tgt_a, 3, 1_000, BTreeMap::new()).await }),
        tokio::spawn(async move { client_b.upsert_edge(src_b, tgt_b, 3, 2_000, BTreeMap::new()).await }),
    );

    assert_eq!(a.unwrap().unwrap(), kvgraph::CommitOutcome::Success, "the ts=1000 writer must eventually commit");
    assert_eq!(b.unwrap().unwrap(), kvgraph::CommitOutcome::Success, "the ts=2000 writer must eventually commit");

    // Whichever writer applied second supersedes the first's index row —
    // exactly one row survives, and the degree counter reflects one live
    // adjacency, not two. Which writer's properties end up on top depends on
    // which task the scheduler ran first, which this test does not pin down.
    let param = QueryParam {
        src: src.clone(),
        label_id: 3,
        dir: Direction::Out,
        index_seq: 0,
        offset: 0,
        limit: 100,
        min_ts: 0,
        max_ts: i64::MAX,
    };
    let page = client.get_edges(&param).await.unwrap();
    assert_eq!(page.len(), 1, "two writes to the same identity must not fan out into multiple rows");

    let degree = client.get_degree(&src, 3, Direction::Out).await.unwrap();
    assert_eq!(degree, 1, "the second write is an update of the same identity, not a second adjacency");
}
