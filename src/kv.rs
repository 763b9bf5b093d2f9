//! The KV store abstraction every other component is written against.
//!
//! `KvStore` matches the external interface exactly: `get`, `put`, `delete`,
//! `atomic_increment`, `compare_and_set`, `flush`, plus a `get_range` the
//! query builder needs for adjacency scans. [`InMemoryKv`] is a reference
//! implementation used by this crate's own tests — not a production HBase
//! driver. Wiring a real cluster means implementing [`KvStore`] against it.

use std::ops::Bound;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{GraphError, Result};

pub type Row = Vec<u8>;
pub type Family = &'static str;
pub type Qualifier = Vec<u8>;

/// The standard column family used for all row types in this crate; a real
/// deployment may split vertices, index-edges, and snapshot-edges across
/// distinct families, but the trait does not require it.
pub const CF_DEFAULT: Family = "e";

/// One versioned cell as returned by `get`/`get_range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: Bytes,
    pub timestamp: i64,
}

/// A single `(qualifier, cell)` pair from a row.
pub type QualifiedCell = (Qualifier, Cell);

/// The wide-column KV store abstraction. Required operations mirror the
/// external interface: per-cell timestamps and CAS on value bytes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads specific qualifiers of a row, or the whole row when `qualifiers`
    /// is empty. Version count is always 1 (the latest cell per qualifier).
    async fn get(&self, row: &[u8], family: Family, qualifiers: &[Qualifier]) -> Result<Vec<QualifiedCell>>;

    /// Scans rows in `[start, end)` bounds, returning at most `limit` rows
    /// after skipping `offset`, restricted to cells with
    /// `min_ts <= timestamp <= max_ts`.
    async fn get_range(
        &self,
        start: Bound<Row>,
        end: Bound<Row>,
        family: Family,
        offset: usize,
        limit: usize,
        min_ts: i64,
        max_ts: i64,
    ) -> Result<Vec<(Row, Vec<QualifiedCell>)>>;

    async fn put(&self, row: &[u8], family: Family, qualifier: &[u8], value: Bytes, ts: i64) -> Result<()>;

    async fn delete(&self, row: &[u8], family: Family, qualifier: &[u8], ts: i64) -> Result<()>;

    /// Atomically adds `amount` to the counter at this cell, returning the
    /// new value. `buffered` selects the buffered-flush client vs. the
    /// zero-flush-interval client (see the concurrency model).
    async fn atomic_increment(
        &self,
        row: &[u8],
        family: Family,
        qualifier: &[u8],
        amount: i64,
        buffered: bool,
    ) -> Result<i64>;

    /// Compare-and-set on a single cell's value bytes. `expected` of `&[]`
    /// means "the cell must not currently hold a value whose bytes differ
    /// from empty", i.e. must be absent. Returns whether the swap happened.
    async fn compare_and_set(
        &self,
        row: &[u8],
        family: Family,
        qualifier: &[u8],
        expected: &[u8],
        new_value: Bytes,
        ts: i64,
    ) -> Result<bool>;

    /// Forces any buffered writes out. A no-op for stores with no client-side
    /// buffering.
    async fn flush(&self) -> Result<()>;
}

type CellKey = (Row, Family, Qualifier);

/// `DashMap`-backed reference [`KvStore`]. Per-cell CAS and increments are
/// implemented via `DashMap`'s shard-locked `entry` API, the closest
/// in-process analogue to a single-row HBase CAS.
#[derive(Default)]
pub struct InMemoryKv {
    cells: DashMap<CellKey, Cell, ahash::RandomState>,
    next_autoincrement_probe: AtomicI64,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self {
            cells: DashMap::default(),
            next_autoincrement_probe: AtomicI64::new(0),
        }
    }

    fn key(row: &[u8], family: Family, qualifier: &[u8]) -> CellKey {
        (row.to_vec(), family, qualifier.to_vec())
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, row: &[u8], family: Family, qualifiers: &[Qualifier]) -> Result<Vec<QualifiedCell>> {
        if qualifiers.is_empty() {
            let mut out = Vec::new();
            for entry in self.cells.iter() {
                let (r, f, q) = entry.key();
                if r.as_slice() == row && *f == family {
                    out.push((q.clone(), entry.value().clone()));
                }
            }
            return Ok(out);
        }
        let mut out = Vec::with_capacity(qualifiers.len());
        for qualifier in qualifiers {
            if let Some(cell) = self.cells.get(&Self::key(row, family, qualifier)) {
                out.push((qualifier.clone(), cell.clone()));
            }
        }
        Ok(out)
    }

    async fn get_range(
        &self,
        start: Bound<Row>,
        end: Bound<Row>,
        family: Family,
        offset: usize,
        limit: usize,
        min_ts: i64,
        max_ts: i64,
    ) -> Result<Vec<(Row, Vec<QualifiedCell>)>> {
        let in_bounds = |row: &[u8]| -> bool {
            let after_start = match &start {
                Bound::Included(s) => row >= s.as_slice(),
                Bound::Excluded(s) => row > s.as_slice(),
                Bound::Unbounded => true,
            };
            let before_end = match &end {
                Bound::Included(e) => row <= e.as_slice(),
                Bound::Excluded(e) => row < e.as_slice(),
                Bound::Unbounded => true,
            };
            after_start && before_end
        };

        let mut by_row: std::collections::BTreeMap<Row, Vec<QualifiedCell>> = Default::default();
        for entry in self.cells.iter() {
            let (r, f, q) = entry.key();
            if *f != family || !in_bounds(r) {
                continue;
            }
            let cell = entry.value();
            if cell.timestamp < min_ts || cell.timestamp > max_ts {
                continue;
            }
            by_row.entry(r.clone()).or_default().push((q.clone(), cell.clone()));
        }
        let rows: Vec<_> = by_row.into_iter().skip(offset).take(limit).collect();
        Ok(rows)
    }

    async fn put(&self, row: &[u8], family: Family, qualifier: &[u8], value: Bytes, ts: i64) -> Result<()> {
        self.cells
            .insert(Self::key(row, family, qualifier), Cell { value, timestamp: ts });
        Ok(())
    }

    async fn delete(&self, row: &[u8], family: Family, qualifier: &[u8], _ts: i64) -> Result<()> {
        self.cells.remove(&Self::key(row, family, qualifier));
        Ok(())
    }

    async fn atomic_increment(
        &self,
        row: &[u8],
        family: Family,
        qualifier: &[u8],
        amount: i64,
        _buffered: bool,
    ) -> Result<i64> {
        use dashmap::mapref::entry::Entry;
        let probe_ts = self.next_autoincrement_probe.fetch_add(1, Ordering::Relaxed);
        let key = Self::key(row, family, qualifier);
        let new_value = match self.cells.entry(key) {
            Entry::Occupied(mut occ) => {
                let current = i64::from_be_bytes(
                    occ.get()
                        .value
                        .as_ref()
                        .try_into()
                        .map_err(|_| GraphError::Corruption("counter cell is not 8 bytes".into()))?,
                );
                let updated = current + amount;
                occ.insert(Cell {
                    value: Bytes::copy_from_slice(&updated.to_be_bytes()),
                    timestamp: occ.get().timestamp,
                });
                updated
            }
            Entry::Vacant(vac) => {
                vac.insert(Cell {
                    value: Bytes::copy_from_slice(&amount.to_be_bytes()),
                    timestamp: probe_ts,
                });
                amount
            }
        };
        Ok(new_value)
    }

    async fn compare_and_set(
        &self,
        row: &[u8],
        family: Family,
        qualifier: &[u8],
        expected: &[u8],
        new_value: Bytes,
        ts: i64,
    ) -> Result<bool> {
        use dashmap::mapref::entry::Entry;
        let key = Self::key(row, family, qualifier);
        match self.cells.entry(key) {
            Entry::Occupied(mut occ) => {
                if occ.get().value.as_ref() != expected {
                    return Ok(false);
                }
                occ.insert(Cell {
                    value: new_value,
                    timestamp: ts,
                });
                Ok(true)
            }
            Entry::Vacant(vac) => {
                if !expected.is_empty() {
                    return Ok(false);
                }
                vac.insert(Cell {
                    value: new_value,
                    timestamp: ts,
                });
                Ok(true)
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
