//! Local clock sources.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current local time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Controllable clock for tests.
///
/// Time is `base + tokio elapsed (if following tokio) + reads * read_cost`.
/// Following tokio time makes `tokio::time::sleep` under a paused runtime move
/// the clock; the per-read cost models a fixed loop overhead so that tight
/// loops polling the clock terminate deterministically.
#[derive(Debug)]
pub struct MockClock {
    base_ms: AtomicI64,
    origin: Option<tokio::time::Instant>,
    read_cost_us: u64,
    reads: AtomicU64,
}

impl MockClock {
    /// A clock frozen at `ms` until `set` or `advance` is called.
    pub fn fixed(ms: i64) -> Self {
        Self {
            base_ms: AtomicI64::new(ms),
            origin: None,
            read_cost_us: 0,
            reads: AtomicU64::new(0),
        }
    }

    /// A clock starting at `ms` that advances with tokio time.
    pub fn following_tokio(ms: i64) -> Self {
        Self {
            base_ms: AtomicI64::new(ms),
            origin: Some(tokio::time::Instant::now()),
            read_cost_us: 0,
            reads: AtomicU64::new(0),
        }
    }

    /// Every `now_ms` call advances the clock by `us` microseconds.
    #[must_use]
    pub fn with_read_cost_us(mut self, us: u64) -> Self {
        self.read_cost_us = us;
        self
    }

    pub fn set(&self, ms: i64) {
        self.base_ms.store(ms, Ordering::Release);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.base_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }

    /// Number of `now_ms` calls so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Acquire)
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> i64 {
        let reads = self.reads.fetch_add(1, Ordering::AcqRel);
        let elapsed = self
            .origin
            .map(|origin| origin.elapsed().as_millis() as i64)
            .unwrap_or(0);
        let overhead = (reads * self.read_cost_us / 1000) as i64;
        self.base_ms.load(Ordering::Acquire) + elapsed + overhead
    }
}
