//! Venue clock synchronization.
//!
//! # Offset Convention
//! `offset_ms = venue_time - local_time`
//! - Positive: venue clock is ahead of local
//! - Negative: venue clock is behind local
//!
//! The offset is measured once by [`ClockSync::sync`] before any dispatcher
//! starts and then copied into [`AdjustedClock`] values, which are the only
//! way the rest of the engine reads time.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};
use volley_core::{BoxFuture, TransportError, TransportResult};

use crate::clock::Clock;
use crate::error::{ClockError, ClockResult};
use crate::target::format_in_offset;

/// Source of the venue's authoritative time.
pub trait TimeProbe: Send + Sync {
    /// Returns the venue's current epoch-millisecond time.
    fn server_time_ms(&self) -> BoxFuture<'_, TransportResult<i64>>;
}

/// Signed offset between venue clock and local clock (ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockOffset(pub i64);

impl ClockOffset {
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

/// Local clock corrected by a measured venue offset.
///
/// `adjusted_now = local_now + offset`
#[derive(Clone)]
pub struct AdjustedClock {
    clock: Arc<dyn Clock>,
    offset: ClockOffset,
}

impl AdjustedClock {
    /// Build from a known offset.
    ///
    /// Production code obtains this from [`ClockSync::sync_adjusted`]; direct
    /// construction is for tests and replays where the offset is known.
    pub fn new(clock: Arc<dyn Clock>, offset: ClockOffset) -> Self {
        Self { clock, offset }
    }

    /// Adjusted time in epoch milliseconds.
    #[inline]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms() + self.offset.0
    }

    /// Adjusted time as a UTC instant.
    pub fn now_date(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms()).unwrap_or_default()
    }

    /// Unadjusted local time.
    pub fn local_now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }
}

impl std::fmt::Debug for AdjustedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdjustedClock")
            .field("offset_ms", &self.offset.0)
            .finish()
    }
}

/// Measures and holds the venue clock offset.
pub struct ClockSync {
    probe: Arc<dyn TimeProbe>,
    clock: Arc<dyn Clock>,
    /// venue_time - local_time (positive = venue ahead).
    offset_ms: AtomicI64,
    synced: AtomicBool,
}

impl ClockSync {
    /// Threshold for warning about clock drift (2 seconds).
    const DRIFT_WARN_THRESHOLD_MS: i64 = 2000;

    pub fn new(probe: Arc<dyn TimeProbe>, clock: Arc<dyn Clock>) -> Self {
        Self {
            probe,
            clock,
            offset_ms: AtomicI64::new(0),
            synced: AtomicBool::new(false),
        }
    }

    /// Probe the venue and update the offset.
    ///
    /// # Errors
    /// Returns `ClockError::SyncFailed` if the probe fails or reports a
    /// non-positive timestamp. The previous offset (if any) is kept.
    pub async fn sync(&self) -> ClockResult<ClockOffset> {
        let venue_ms = self
            .probe
            .server_time_ms()
            .await
            .map_err(|e| ClockError::SyncFailed(e.to_string()))?;
        let local_ms = self.clock.now_ms();

        if venue_ms <= 0 {
            return Err(ClockError::SyncFailed(format!(
                "malformed venue time: {venue_ms}"
            )));
        }

        let offset = venue_ms - local_ms;
        if offset.abs() > Self::DRIFT_WARN_THRESHOLD_MS {
            warn!(offset_ms = offset, "Significant drift between local and venue clock");
        }

        self.offset_ms.store(offset, Ordering::Release);
        self.synced.store(true, Ordering::Release);

        info!(
            offset_ms = offset,
            venue_time = %format_in_offset(venue_ms, 0),
            local_time = %format_in_offset(local_ms, 0),
            "Clock synchronized with venue"
        );

        Ok(ClockOffset(offset))
    }

    /// Sync and return an adjusted clock in one step.
    pub async fn sync_adjusted(&self) -> ClockResult<AdjustedClock> {
        self.sync().await?;
        self.adjusted()
    }

    /// Adjusted clock for the last successful sync.
    ///
    /// # Errors
    /// Returns `ClockError::NotSynced` if `sync` has never succeeded.
    pub fn adjusted(&self) -> ClockResult<AdjustedClock> {
        if !self.is_synced() {
            return Err(ClockError::NotSynced);
        }
        Ok(AdjustedClock::new(Arc::clone(&self.clock), self.offset()))
    }

    pub fn offset(&self) -> ClockOffset {
        ClockOffset(self.offset_ms.load(Ordering::Acquire))
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

/// Time probe returning a scripted response.
#[derive(Debug)]
pub struct MockTimeProbe {
    response: Mutex<TransportResult<i64>>,
    calls: AtomicU64,
}

impl MockTimeProbe {
    pub fn returning(venue_ms: i64) -> Self {
        Self {
            response: Mutex::new(Ok(venue_ms)),
            calls: AtomicU64::new(0),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            response: Mutex::new(Err(error)),
            calls: AtomicU64::new(0),
        }
    }

    pub fn set_response(&self, response: TransportResult<i64>) {
        *self.response.lock() = response;
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TimeProbe for MockTimeProbe {
    fn server_time_ms(&self) -> BoxFuture<'_, TransportResult<i64>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.lock().clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    const BASE_TIME: i64 = 1_700_000_000_000; // ~2023-11-14

    fn sync_with(probe: MockTimeProbe, clock: Arc<MockClock>) -> ClockSync {
        ClockSync::new(Arc::new(probe), clock)
    }

    #[tokio::test]
    async fn test_positive_offset() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let sync = sync_with(MockTimeProbe::returning(BASE_TIME + 500), clock.clone());

        let offset = sync.sync().await.unwrap();
        assert_eq!(offset, ClockOffset(500));

        let adjusted = sync.adjusted().unwrap();
        assert_eq!(adjusted.now_ms(), BASE_TIME + 500);

        clock.advance(1_000);
        assert_eq!(adjusted.now_ms(), adjusted.local_now_ms() + 500);
    }

    #[tokio::test]
    async fn test_negative_offset() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let sync = sync_with(MockTimeProbe::returning(BASE_TIME - 750), clock);

        let adjusted = sync.sync_adjusted().await.unwrap();
        assert_eq!(adjusted.offset().as_ms(), -750);
        assert_eq!(adjusted.now_ms(), BASE_TIME - 750);
        assert_eq!(adjusted.now_date().timestamp_millis(), BASE_TIME - 750);
    }

    #[tokio::test]
    async fn test_large_drift_is_accepted() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let sync = sync_with(MockTimeProbe::returning(BASE_TIME + 60_000), clock);

        assert_eq!(sync.sync().await.unwrap(), ClockOffset(60_000));
    }

    #[tokio::test]
    async fn test_probe_failure_is_sync_failed() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let sync = sync_with(
            MockTimeProbe::failing(TransportError::Transport("timeout".to_string())),
            clock,
        );

        let err = tokio_test::assert_err!(sync.sync().await);
        assert!(matches!(err, ClockError::SyncFailed(_)));
        assert!(!sync.is_synced());
        assert!(matches!(sync.adjusted(), Err(ClockError::NotSynced)));
    }

    #[tokio::test]
    async fn test_malformed_time_is_sync_failed() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let sync = sync_with(MockTimeProbe::returning(0), clock);

        assert!(matches!(sync.sync().await, Err(ClockError::SyncFailed(_))));
        assert!(!sync.is_synced());
    }

    #[tokio::test]
    async fn test_failed_resync_keeps_previous_offset() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let probe = Arc::new(MockTimeProbe::returning(BASE_TIME + 100));
        let sync = ClockSync::new(probe.clone(), clock);

        sync.sync().await.unwrap();
        probe.set_response(Err(TransportError::Decode("bad json".to_string())));
        assert!(sync.sync().await.is_err());

        assert_eq!(sync.offset(), ClockOffset(100));
        assert!(sync.is_synced());
        assert_eq!(probe.calls(), 2);
    }
}
