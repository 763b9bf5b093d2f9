//! Typed configuration with a few named presets, the way a deployment picks
//! a starting point and overrides only what differs.

use std::time::Duration;

use crate::retry::Backoff;

/// Tunables covering the commit protocol's retry budget, the degree-counter
/// write path, caching, and RPC timeouts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Max attempts through the strong-consistency commit loop before giving
    /// up and surfacing `RetryExhausted`.
    pub commit_max_attempts: u32,
    pub commit_backoff: Backoff,

    /// Whether degree-counter increments go through the buffered-flush
    /// client (`true`) or the zero-flush-interval client (`false`).
    pub degree_increment_buffered: bool,
    /// `hbase.rpcs.buffered_flush_interval` — default buffered-flush ms.
    pub buffered_flush_interval: Duration,
    /// `delete.all.fetch.size` — batch size for adjacency reads in deleteAll.
    pub delete_all_fetch_size: usize,

    pub cache_coalesce_ttl: Duration,
    pub cache_coalesce_expire_count: usize,
    pub cache_result_default_ttl: Duration,
    pub cache_result_capacity: usize,

    pub rpc_timeout: Duration,
}

impl Config {
    /// Balanced defaults: moderate retry budget, short coalescing window,
    /// buffered degree increments.
    pub fn default_config() -> Self {
        Self {
            commit_max_attempts: 10,
            commit_backoff: Backoff::default(),
            degree_increment_buffered: true,
            buffered_flush_interval: Duration::from_millis(100),
            delete_all_fetch_size: 1_000,
            cache_coalesce_ttl: Duration::from_millis(10),
            cache_coalesce_expire_count: 10_000,
            cache_result_default_ttl: Duration::from_secs(10),
            cache_result_capacity: 10_000,
            rpc_timeout: Duration::from_millis(1_000),
        }
    }

    /// Favors low read latency: a longer result-cache TTL and a larger
    /// coalescing window, at the cost of staler adjacency reads.
    pub fn low_latency() -> Self {
        Self {
            cache_coalesce_ttl: Duration::from_millis(50),
            cache_result_default_ttl: Duration::from_secs(60),
            cache_result_capacity: 100_000,
            ..Self::default_config()
        }
    }

    /// Favors durability of the degree counters over write latency: the
    /// zero-flush-interval client and a larger retry budget.
    pub fn durable_batch() -> Self {
        Self {
            commit_max_attempts: 30,
            degree_increment_buffered: false,
            cache_coalesce_ttl: Duration::from_millis(1),
            cache_result_default_ttl: Duration::from_secs(1),
            ..Self::default_config()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
