//! The strong-consistency commit protocol and the eventual-consistency
//! direct-write path.
//!
//! `commit_strong` sequences one edge write through a state read followed by
//! four steps — `acquire_lock`, `mutate_index_edges`, `release_lock`,
//! `increment_degree` — each a CAS or increment against the snapshot-edge
//! row's `lock_ts` sentinel cell. The state read (`fetch_snapshot`) fetches
//! the identity's current snapshot-edge row before any mutation is built, so
//! the mutation builder knows what index row it is superseding and whether
//! this write changes adjacency membership at all. A CAS failure on the lock
//! cell is disambiguated by comparing the bytes we expected against what's
//! actually there: identical bytes mean our own previous attempt already got
//! through and this is a redundant retry; different bytes mean another
//! writer holds the lock and we back off. `commit_eventual` skips straight
//! to writing both rows with no lock step, trading linearizability for
//! latency on labels configured for weak consistency.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec;
use crate::error::{CommitOutcome, Result};
use crate::kv::{KvStore, CF_DEFAULT};
use crate::model::{ConsistencyLevel, Edge};
use crate::mutation::{mirrored, Mutation, MutationBuilder, SnapshotState};
use crate::schema::Label;

/// Sequences physical edge writes against a [`KvStore`] under either
/// consistency regime, selected per-call by the label's declared level.
pub struct CommitEngine<K: KvStore> {
    store: Arc<K>,
    /// Whether degree-counter increments go through the buffered-flush
    /// client (`true`) or the zero-flush-interval client (`false`); sourced
    /// from [`crate::config::Config::degree_increment_buffered`].
    degree_increment_buffered: bool,
}

impl<K: KvStore> CommitEngine<K> {
    pub fn new(store: Arc<K>, degree_increment_buffered: bool) -> Self {
        Self {
            store,
            degree_increment_buffered,
        }
    }

    /// Commits one logical edge write (both directions) under the label's
    /// configured consistency level.
    pub async fn commit(&self, edge: &Edge, label: &Label) -> Result<CommitOutcome> {
        match label.consistency_level {
            ConsistencyLevel::Strong => self.commit_strong(edge, label).await,
            ConsistencyLevel::Weak => self.commit_eventual(edge, label).await,
        }
    }

    /// The lock-edge CAS protocol: acquire the lock, mutate the index rows,
    /// release the lock, then bump the degree counter. Steps run for both
    /// the forward and mirrored row; a failure at any step returns a
    /// retryable [`CommitOutcome`] without partially undoing prior steps —
    /// the caller is expected to retry from the top.
    pub async fn commit_strong(&self, edge: &Edge, label: &Label) -> Result<CommitOutcome> {
        let snapshot_row = codec::snapshot_edge_row_key(&edge.identity)?;
        let lock_ts = edge.ts;

        let previous = self.fetch_snapshot(&snapshot_row).await?;
        let previous_raw = previous.as_ref().map(|p| p.raw.to_vec()).unwrap_or_default();

        match self.acquire_lock(&snapshot_row, &previous_raw, lock_ts).await? {
            LockAcquired::Fresh => {}
            LockAcquired::AlreadyOurs => {
                debug!(lock_ts, "lock already held by an earlier attempt of this write, continuing");
            }
            LockAcquired::HeldByOther => {
                return Ok(CommitOutcome::LockContended);
            }
        }

        let mirror_edge = mirrored(edge);
        let mirror_snapshot_row = codec::snapshot_edge_row_key(&mirror_edge.identity)?;
        let previous_mirror = self.fetch_snapshot(&mirror_snapshot_row).await?;

        let forward = MutationBuilder::edge_mutations(edge, label, previous.as_ref())?;
        let backward = MutationBuilder::edge_mutations(&mirror_edge, label, previous_mirror.as_ref())?;

        if let Err(err) = self.apply_all(&forward.index_mutations).await {
            warn!(error = %err, "mutate_index_edges failed on forward direction");
            return Ok(CommitOutcome::MutateFailed);
        }
        if let Err(err) = self.apply_all(&backward.index_mutations).await {
            warn!(error = %err, "mutate_index_edges failed on mirrored direction");
            return Ok(CommitOutcome::MutateFailed);
        }
        if let Err(err) = self.apply_all(&forward.snapshot_mutations).await {
            warn!(error = %err, "snapshot write failed on forward direction");
            return Ok(CommitOutcome::MutateFailed);
        }
        if let Err(err) = self.apply_all(&backward.snapshot_mutations).await {
            warn!(error = %err, "snapshot write failed on mirrored direction");
            return Ok(CommitOutcome::MutateFailed);
        }

        if !self.release_lock(&snapshot_row, &previous_raw, lock_ts).await? {
            return Ok(CommitOutcome::ReleaseFailed);
        }

        if forward.degree_delta != 0 {
            let incr = MutationBuilder::degree_increment(edge, label, forward.degree_delta, self.degree_increment_buffered)?;
            if self.apply_one(&incr).await.is_err() {
                return Ok(CommitOutcome::IncrementFailed);
            }
            let mirror_incr = MutationBuilder::degree_increment(
                &mirror_edge,
                label,
                backward.degree_delta,
                self.degree_increment_buffered,
            )?;
            if self.apply_one(&mirror_incr).await.is_err() {
                return Ok(CommitOutcome::IncrementFailed);
            }
        }

        Ok(CommitOutcome::Success)
    }

    /// Direct-write path for weakly-consistent labels: both index rows and
    /// both snapshot rows are written with no lock step, then the degree
    /// counters are bumped. A concurrent writer on the same edge identity
    /// can interleave here; callers accept the resulting races.
    pub async fn commit_eventual(&self, edge: &Edge, label: &Label) -> Result<CommitOutcome> {
        let snapshot_row = codec::snapshot_edge_row_key(&edge.identity)?;
        let previous = self.fetch_snapshot(&snapshot_row).await?;
        let mirror_edge = mirrored(edge);
        let mirror_snapshot_row = codec::snapshot_edge_row_key(&mirror_edge.identity)?;
        let previous_mirror = self.fetch_snapshot(&mirror_snapshot_row).await?;

        let forward = MutationBuilder::edge_mutations(edge, label, previous.as_ref())?;
        let backward = MutationBuilder::edge_mutations(&mirror_edge, label, previous_mirror.as_ref())?;

        self.apply_all(&forward.index_mutations).await?;
        self.apply_all(&backward.index_mutations).await?;
        self.apply_all(&forward.snapshot_mutations).await?;
        self.apply_all(&backward.snapshot_mutations).await?;

        if forward.degree_delta != 0 {
            let incr = MutationBuilder::degree_increment(edge, label, forward.degree_delta, self.degree_increment_buffered)?;
            self.apply_one(&incr).await?;
            let mirror_incr = MutationBuilder::degree_increment(
                &mirror_edge,
                label,
                backward.degree_delta,
                self.degree_increment_buffered,
            )?;
            self.apply_one(&mirror_incr).await?;
        }

        Ok(CommitOutcome::Success)
    }

    /// Reads the identity's current snapshot-edge row, if one was ever
    /// written. Spec §4.4's "State read": `fetch_inverted(edge)`. Returns
    /// `None` only when the row has never been written at all; a tombstoned
    /// (deleted) edge still returns `Some` with `op` marking it dead, so
    /// callers can tell "never existed" from "existed, then deleted" when
    /// they need the latter's `ts` for something (lock candidacy).
    async fn fetch_snapshot(&self, snapshot_row: &[u8]) -> Result<Option<SnapshotState>> {
        let cells = self
            .store
            .get(snapshot_row, CF_DEFAULT, std::slice::from_ref(&codec::QUALIFIER_META.to_vec()))
            .await?;
        let Some((_, cell)) = cells.into_iter().next() else {
            return Ok(None);
        };
        let (op, ts, props) = codec::decode_edge_meta(&cell.value)?;
        Ok(Some(SnapshotState {
            ts,
            op,
            props,
            raw: cell.value,
        }))
    }

    /// A lock-edge is the previous snapshot's exact value bytes with the
    /// requester's `ts` appended; comparing the full candidate (not just
    /// `lock_ts`) against what a CAS failure reveals is what lets two
    /// different concurrent writers that happen to share a `ts` be told
    /// apart from one writer retrying after its own attempt stalled.
    fn lock_candidate(previous_raw: &[u8], lock_ts: i64) -> Vec<u8> {
        let mut buf = previous_raw.to_vec();
        buf.extend_from_slice(&lock_ts.to_be_bytes());
        buf
    }

    async fn acquire_lock(&self, snapshot_row: &[u8], previous_raw: &[u8], lock_ts: i64) -> Result<LockAcquired> {
        let expected = Vec::new();
        let candidate = Self::lock_candidate(previous_raw, lock_ts);
        let swapped = self
            .store
            .compare_and_set(
                snapshot_row,
                CF_DEFAULT,
                codec::QUALIFIER_LOCK_TS,
                &expected,
                bytes::Bytes::from(candidate.clone()),
                lock_ts,
            )
            .await?;
        if swapped {
            return Ok(LockAcquired::Fresh);
        }

        let current = self
            .store
            .get(snapshot_row, CF_DEFAULT, std::slice::from_ref(&codec::QUALIFIER_LOCK_TS.to_vec()))
            .await?;
        let held_value = current.first().map(|(_, cell)| cell.value.to_vec());
        match held_value {
            Some(bytes) if bytes == candidate => Ok(LockAcquired::AlreadyOurs),
            _ => Ok(LockAcquired::HeldByOther),
        }
    }

    async fn release_lock(&self, snapshot_row: &[u8], previous_raw: &[u8], lock_ts: i64) -> Result<bool> {
        let candidate = Self::lock_candidate(previous_raw, lock_ts);
        self.store
            .compare_and_set(
                snapshot_row,
                CF_DEFAULT,
                codec::QUALIFIER_LOCK_TS,
                &candidate,
                bytes::Bytes::new(),
                lock_ts,
            )
            .await
    }

    async fn apply_all(&self, mutations: &[Mutation]) -> Result<()> {
        for mutation in mutations {
            self.apply_one(mutation).await?;
        }
        Ok(())
    }

    async fn apply_one(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Put { row, qualifier, value, ts } => {
                self.store.put(row, CF_DEFAULT, qualifier, value.clone(), *ts).await
            }
            Mutation::Delete { row, qualifier, ts } => self.store.delete(row, CF_DEFAULT, qualifier, *ts).await,
            Mutation::Increment {
                row,
                qualifier,
                amount,
                is_degree: _,
                buffered,
            } => {
                self.store
                    .atomic_increment(row, CF_DEFAULT, qualifier, *amount, *buffered)
                    .await
                    .map(|_| ())
            }
        }
    }
}

enum LockAcquired {
    Fresh,
    AlreadyOurs,
    HeldByOther,
}
