use crate::types::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Counter state after one request has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests seen in the current window, including this one.
    pub count: u64,
    /// Time left until the window resets.
    pub resets_in: Duration,
}

/// Backing storage for fixed-window counters.
///
/// `hit` must perform read, reset, increment and report as one atomic step
/// per key; implementations shared across processes need their own
/// atomicity (e.g. a scripted `INCR` + `PEXPIRE`).
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Records one request against `key` and returns the updated window.
    async fn hit(&self, key: &str, window: Duration, now: Instant) -> Result<WindowHit>;

    /// Current count for `key`, or 0 when its window has elapsed.
    async fn count(&self, key: &str, now: Instant) -> Result<u64>;

    /// Drops counters whose window has elapsed. Returns how many were removed.
    async fn purge(&self, now: Instant) -> Result<usize>;
}

#[derive(Debug)]
struct Counter {
    count: u64,
    window_start: Instant,
    window: Duration,
}

impl Counter {
    fn elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window
    }

    fn resets_in(&self, now: Instant) -> Duration {
        self.window
            .saturating_sub(now.saturating_duration_since(self.window_start))
    }
}

/// Process-local store: a single mutex over a map of counters.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(&self, key: &str, window: Duration, now: Instant) -> Result<WindowHit> {
        let mut counters = self.counters.lock();

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            window_start: now,
            window,
        });

        if counter.elapsed(now) {
            counter.count = 0;
            counter.window_start = now;
        }
        counter.window = window;
        counter.count = counter.count.saturating_add(1);

        Ok(WindowHit {
            count: counter.count,
            resets_in: counter.resets_in(now),
        })
    }

    async fn count(&self, key: &str, now: Instant) -> Result<u64> {
        let counters = self.counters.lock();
        Ok(counters
            .get(key)
            .filter(|counter| !counter.elapsed(now))
            .map_or(0, |counter| counter.count))
    }

    async fn purge(&self, now: Instant) -> Result<usize> {
        let mut counters = self.counters.lock();
        let before = counters.len();
        counters.retain(|_, counter| !counter.elapsed(now));
        Ok(before - counters.len())
    }
}
