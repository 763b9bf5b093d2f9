//! Result-cache behavior: repeated identical queries are served from cache
//! until it expires, and a write that lands after a cached read is not
//! visible until the cache entry is gone.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kvgraph::kv::InMemoryKv;
use kvgraph::model::{ConsistencyLevel, Direction, InnerVal, SchemaVersion, VertexId};
use kvgraph::query::QueryParam;
use kvgraph::schema::{IndexDef, InMemoryCatalog, Label};
use kvgraph::{Config, GraphClient};

fn label() -> Label {
    Label {
        id: 11,
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

fn short_ttl_config() -> Config {
    Config {
        cache_coalesce_ttl: Duration::from_millis(5),
        cache_result_default_ttl: Duration::from_millis(30),
        ..Config::default()
    }
}

#[tokio::test]
async fn result_cache_hides_writes_until_it_expires() {
    let store = Arc::new(InMemoryKv::new());
    let catalog = Arc::new(InMemoryCatalog::new().with_label(label()));
    let client = GraphClient::new(store, catalog, short_ttl_config());

    let src = VertexId::new(1, InnerVal::Long(1));
    let tgt_a = VertexId::new(1, InnerVal::Long(2));
    client.upsert_edge(src.clone(), tgt_a, 11, 100, BTreeMap::new()).await.unwrap();

    let param = QueryParam {
        src: src.clone(),
        label_id: 11,
        dir: Direction::Out,
        index_seq: 0,
        offset: 0,
        limit: 100,
        min_ts: 0,
        max_ts: i64::MAX,
    };
    let first = client.get_edges(&param).await.unwrap();
    assert_eq!(first.len(), 1);

    let tgt_b = VertexId::new(1, InnerVal::Long(3));
    client.upsert_edge(src.clone(), tgt_b, 11, 200, BTreeMap::new()).await.unwrap();

    // Still within the result-cache TTL: the second edge should not show up.
    let cached = client.get_edges(&param).await.unwrap();
    assert_eq!(cached.len(), 1, "a fresh write must not appear through a still-live cached result");

    tokio::time::sleep(Duration::from_millis(50)).await;

    let fresh = client.get_edges(&param).await.unwrap();
    assert_eq!(fresh.len(), 2, "once the cache entry expires, the new edge must be visible");
}
