//! Edge queries and the caching fetcher that serves them.
//!
//! [`Fetcher`] sits in front of [`crate::kv::KvStore`] range scans with two
//! layers: a short-TTL coalescing cache that shares one in-flight future
//! across concurrent identical requests, and a longer-TTL result cache for
//! completed scans. Both are keyed by the full physical request bytes, not a
//! shortened hash — two distinct adjacency scans colliding on a truncated
//! key would silently return each other's edges.

use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::{FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;
use crate::kv::{KvStore, QualifiedCell, Row};
use crate::model::{Direction, LabelId, VertexId};
use crate::schema::SchemaCatalog;

/// Parameters for one adjacency query: a source vertex's edges under a
/// label and direction, with paging and a time window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParam {
    pub src: VertexId,
    pub label_id: LabelId,
    pub dir: Direction,
    pub index_seq: u8,
    pub offset: usize,
    pub limit: usize,
    pub min_ts: i64,
    pub max_ts: i64,
}

impl QueryParam {
    /// The full physical cache key for this query: the index-edge prefix
    /// plus every paging/window parameter, so two queries differing only in
    /// `limit` or `min_ts` never alias each other's cached result.
    fn cache_key(&self) -> Result<Vec<u8>> {
        let mut buf = crate::codec::index_edge_prefix(&self.src, self.label_id, self.dir, self.index_seq)?;
        buf.extend_from_slice(&self.offset.to_be_bytes());
        buf.extend_from_slice(&self.limit.to_be_bytes());
        buf.extend_from_slice(&self.min_ts.to_be_bytes());
        buf.extend_from_slice(&self.max_ts.to_be_bytes());
        Ok(buf)
    }
}

type ScanResult = Arc<Vec<(Row, Vec<QualifiedCell>)>>;
type SharedScan = Shared<std::pin::Pin<Box<dyn std::future::Future<Output = Result<ScanResult, String>> + Send>>>;

struct ResultEntry {
    value: ScanResult,
    expires_at: Instant,
}

/// Caching front-end for adjacency scans.
///
/// The coalescing cache holds in-flight futures keyed by request bytes, so
/// a burst of identical concurrent queries performs exactly one scan. The
/// result cache holds completed scans for `result_ttl` after that.
pub struct Fetcher<K: KvStore> {
    store: Arc<K>,
    catalog: Arc<dyn SchemaCatalog>,
    in_flight: Arc<DashMap<Vec<u8>, SharedScan, ahash::RandomState>>,
    results: Mutex<LruCache<Vec<u8>, ResultEntry>>,
    coalesce_ttl: Duration,
    result_ttl: Duration,
}

impl<K: KvStore + 'static> Fetcher<K> {
    pub fn new(
        store: Arc<K>,
        catalog: Arc<dyn SchemaCatalog>,
        result_cache_capacity: usize,
        coalesce_ttl: Duration,
        result_ttl: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            in_flight: Arc::new(DashMap::default()),
            results: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(result_cache_capacity.max(1)).unwrap(),
            )),
            coalesce_ttl,
            result_ttl,
        }
    }

    /// Resolves one [`QueryParam`], hitting the result cache, then the
    /// coalescing cache, then finally performing a real scan.
    pub async fn fetch(&self, param: &QueryParam) -> Result<ScanResult> {
        let _ = self.catalog.find_label(param.label_id)?;
        let key = param.cache_key()?;

        if let Some(hit) = self.lookup_result_cache(&key) {
            trace!(label_id = param.label_id, "result cache hit");
            return Ok(hit);
        }

        if let Some(shared) = self.in_flight.get(&key).map(|entry| entry.value().clone()) {
            debug!(label_id = param.label_id, "coalescing onto in-flight scan");
            return shared.await.map_err(crate::error::GraphError::Kv);
        }

        let store = self.store.clone();
        let prefix = crate::codec::index_edge_prefix(&param.src, param.label_id, param.dir, param.index_seq)?;
        let mut end = prefix.clone();
        *end.last_mut().unwrap() = end.last().unwrap().wrapping_add(1);
        let offset = param.offset;
        let limit = param.limit;
        let min_ts = param.min_ts;
        let max_ts = param.max_ts;

        let fut: std::pin::Pin<Box<dyn std::future::Future<Output = Result<ScanResult, String>> + Send>> =
            Box::pin(async move {
                let rows = store
                    .get_range(
                        Bound::Included(prefix),
                        Bound::Excluded(end),
                        crate::kv::CF_DEFAULT,
                        offset,
                        limit,
                        min_ts,
                        max_ts,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(Arc::new(rows))
            });
        let shared = fut.shared();
        self.in_flight.insert(key.clone(), shared.clone());

        let coalesce_key = key.clone();
        let in_flight_map = self.in_flight.clone();
        let coalesce_ttl = self.coalesce_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(coalesce_ttl).await;
            in_flight_map.remove(&coalesce_key);
        });

        let result = shared.await.map_err(crate::error::GraphError::Kv)?;
        self.store_result_cache(key, result.clone());
        Ok(result)
    }

    fn lookup_result_cache(&self, key: &[u8]) -> Option<ScanResult> {
        let mut results = self.results.lock();
        match results.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                results.pop(key);
                None
            }
            None => None,
        }
    }

    fn store_result_cache(&self, key: Vec<u8>, value: ScanResult) {
        let mut results = self.results.lock();
        results.put(
            key,
            ResultEntry {
                value,
                expires_at: Instant::now() + self.result_ttl,
            },
        );
    }
}
