//! Retry combinators and randomized backoff for the commit protocol.
//!
//! `retry_on_failure` retries while a future returns `Err`; `retry_on_success`
//! retries while an `Ok` value satisfies a caller-supplied predicate (used to
//! retry a [`crate::error::CommitOutcome`] until it is no longer retryable).
//! Both share the same bounded, jittered backoff and give up into a
//! [`DeadLetterQueue`] once the attempt budget is spent.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tracing::warn;

use crate::error::{GraphError, Result};

/// Bounded randomized backoff: `base * 2^attempt`, capped at `max`, with up
/// to `jitter_fraction` of the computed delay subtracted at random so
/// concurrent retriers don't lock-step.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter_fraction: f64,
}

impl Backoff {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.max.as_millis());
        let mut rng = rand::thread_rng();
        let jitter = (capped as f64 * self.jitter_fraction * rng.gen::<f64>()) as u128;
        Duration::from_millis((capped.saturating_sub(jitter)) as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(10),
            max: Duration::from_millis(500),
            jitter_fraction: 0.25,
        }
    }
}

/// Holds attempts that exhausted their retry budget, for offline inspection
/// or a later manual replay. Not persisted — a process restart drops it.
pub struct DeadLetterQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self { items: Mutex::new(Vec::new()) }
    }
}

impl<T> DeadLetterQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Retries `op` while it returns `Err`, up to `max_attempts`, sleeping the
/// backoff delay between attempts. Returns the last error once exhausted.
pub async fn retry_on_failure<T, F, Fut>(max_attempts: u32, backoff: Backoff, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= max_attempts => {
                warn!(attempts = attempt + 1, error = %err, "retry_on_failure exhausted budget");
                return Err(GraphError::RetryExhausted(attempt + 1));
            }
            Err(err) => {
                warn!(attempt, error = %err, "retry_on_failure attempt failed, backing off");
                tokio::time::sleep(backoff.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Retries `op` while its `Ok` value satisfies `should_retry`, up to
/// `max_attempts`. Used to drive the commit engine's self-retry loop on
/// [`crate::error::CommitOutcome`] values that are not yet `Success`.
pub async fn retry_on_success<T, F, Fut, P>(max_attempts: u32, backoff: Backoff, mut op: F, should_retry: P) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let mut attempt = 0;
    loop {
        let value = op(attempt).await?;
        if !should_retry(&value) {
            return Ok(value);
        }
        if attempt + 1 >= max_attempts {
            warn!(attempts = attempt + 1, "retry_on_success exhausted budget");
            return Err(GraphError::RetryExhausted(attempt + 1));
        }
        tokio::time::sleep(backoff.delay_for(attempt)).await;
        attempt += 1;
    }
}
