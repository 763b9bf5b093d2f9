//! Vertex create/read/delete against the public facade.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvgraph::kv::InMemoryKv;
use kvgraph::model::{InnerVal, PropValue, SchemaVersion, VertexId};
use kvgraph::schema::{InMemoryCatalog, ServiceColumn};
use kvgraph::{Config, GraphClient};

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new().with_column(
        1,
        ServiceColumn {
            service_id: 1,
            column_name: "user".into(),
            schema_version: SchemaVersion::V2,
            meta_map: Default::default(),
        },
    ))
}

#[tokio::test]
async fn put_vertex_then_get_returns_its_properties() {
    let store = Arc::new(InMemoryKv::new());
    let client = GraphClient::new(store, catalog(), Config::default());

    let id = VertexId::new(1, InnerVal::Long(100));
    let mut props = BTreeMap::new();
    props.insert(0u8, PropValue::Str("alice".into()));
    props.insert(1u8, PropValue::Long(30));

    client.put_vertex(id.clone(), 1_000, props, vec![]).await.unwrap();

    let cells = client.get_vertex(&id).await.unwrap();
    assert_eq!(cells.len(), 2, "both properties should land as separate cells under V2");
}

#[tokio::test]
async fn deleting_a_vertex_clears_its_property_cells() {
    let store = Arc::new(InMemoryKv::new());
    let client = GraphClient::new(store, catalog(), Config::default());

    let id = VertexId::new(1, InnerVal::Long(200));
    let mut props = BTreeMap::new();
    props.insert(0u8, PropValue::Bool(true));
    client.put_vertex(id.clone(), 1_000, props, vec![]).await.unwrap();
    assert_eq!(client.get_vertex(&id).await.unwrap().len(), 1);

    client.delete_vertex(id.clone(), 2_000, vec![]).await.unwrap();
    assert!(client.get_vertex(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn belongs_to_marker_can_be_removed_independently_of_properties() {
    let store = Arc::new(InMemoryKv::new());
    let client = GraphClient::new(store, catalog(), Config::default());

    let id = VertexId::new(1, InnerVal::Long(300));
    let mut props = BTreeMap::new();
    props.insert(0u8, PropValue::Long(7));
    client.put_vertex(id.clone(), 1_000, props, vec![42]).await.unwrap();

    let before = client.get_vertex(&id).await.unwrap().len();
    client.delete_vertex_belongs_to(&id, 42, 2_000).await.unwrap();
    let after = client.get_vertex(&id).await.unwrap().len();
    assert_eq!(after, before - 1);
}
