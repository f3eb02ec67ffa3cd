//! Retry scheduling for dropped or failed connections
//!
//! When a connection attempt fails or an established connection drops, the
//! I/O thread asks the [`RetryScheduler`] how long to wait before trying
//! again. The scheduler delegates the delay to a [`ReconnectionStrategy`]
//! and keeps the consecutive-attempt counter, which resets on every
//! successful connection.
//!
//! # Built-in Strategies
//!
//! - **BackoffTable**: walks a fixed table of delays with ± jitter, then gives up
//! - **NoReconnect**: never retries
//!
//! # Examples
//!
//! ```rust
//! use obsws_client::{BackoffTable, RetryScheduler};
//! use std::time::Duration;
//!
//! let mut scheduler = RetryScheduler::new(Box::new(BackoffTable::without_jitter(vec![
//!     Duration::from_millis(250),
//!     Duration::from_millis(500),
//! ])));
//!
//! assert_eq!(scheduler.next_delay(), Some(Duration::from_millis(250)));
//! assert_eq!(scheduler.next_delay(), Some(Duration::from_millis(500)));
//! assert_eq!(scheduler.next_delay(), None);
//! ```

use rand::Rng;
use std::time::Duration;

/// Default delay table, in milliseconds
pub const DEFAULT_BACKOFF_MS: [u64; 4] = [250, 500, 750, 1000];

/// Default jitter applied to each delay, in percent
pub const DEFAULT_JITTER_PERCENT: u8 = 20;

/// Trait for reconnection strategies
///
/// `attempt` is the 0-indexed count of consecutive failed attempts since
/// the last successful connection.
pub trait ReconnectionStrategy: Send {
    /// Returns the delay before the next attempt, or `None` to give up
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;
}

/// Table-driven backoff with uniform ± jitter
#[derive(Debug, Clone)]
pub struct BackoffTable {
    table: Vec<Duration>,
    jitter_percent: u8,
}

impl BackoffTable {
    /// Create a strategy over `table` with `jitter_percent` (capped at 100)
    pub fn new(table: Vec<Duration>, jitter_percent: u8) -> Self {
        Self {
            table,
            jitter_percent: jitter_percent.min(100),
        }
    }

    /// Create a strategy over `table` that uses the delays verbatim
    pub fn without_jitter(table: Vec<Duration>) -> Self {
        Self::new(table, 0)
    }

    /// Number of retries this table allows
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if the table allows no retries at all
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.jitter_percent == 0 {
            return base;
        }
        let pct = i64::from(self.jitter_percent);
        let offset = rand::thread_rng().gen_range(-pct..=pct);
        let millis = base.as_millis() as i64;
        Duration::from_millis((millis * (100 + offset) / 100).max(0) as u64)
    }
}

impl Default for BackoffTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_MS.iter().copied().map(Duration::from_millis).collect(),
            DEFAULT_JITTER_PERCENT,
        )
    }
}

impl ReconnectionStrategy for BackoffTable {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        let base = *self.table.get(attempt as usize)?;
        Some(self.jittered(base))
    }
}

/// Strategy that never reconnects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Consecutive-failure counter in front of a strategy
pub struct RetryScheduler {
    strategy: Box<dyn ReconnectionStrategy>,
    attempt_count: u32,
}

impl RetryScheduler {
    /// Create a scheduler with a fresh attempt counter
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            strategy,
            attempt_count: 0,
        }
    }

    /// Count one failed attempt and return the delay before the next
    ///
    /// `None` means retries are exhausted. The counter still advances, so
    /// further calls keep reporting exhaustion until [`reset`](Self::reset).
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.strategy.next_delay(self.attempt_count);
        self.attempt_count = self.attempt_count.saturating_add(1);
        delay
    }

    /// Forget previous failures after a successful connection
    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Consecutive failed attempts since the last success
    pub fn attempts(&self) -> u32 {
        self.attempt_count
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("attempt_count", &self.attempt_count)
            .finish_non_exhaustive()
    }
}
