//! Deadline scheduling on the venue clock.
//!
//! Converts venue-clock deadlines into local sleeps. Short waits are a
//! single `tokio::time::sleep`. Waits above the long-wait threshold run a
//! cancellable progress ticker next to the sleep so a supervising process
//! sees periodic progress; the ticker is cancelled and joined before the
//! wait returns.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ClockResult;
use crate::sync::AdjustedClock;
use crate::target::{build_target_instant, format_in_offset};

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Waits longer than this report progress periodically. Default: 1 hour.
    pub long_wait_threshold: Duration,
    /// Progress report interval for long waits. Default: 5 minutes.
    pub progress_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            long_wait_threshold: Duration::from_secs(3600),
            progress_interval: Duration::from_secs(300),
        }
    }
}

/// What a wait actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitOutcome {
    /// Remaining time when the wait started (ms, <= 0 means no sleep).
    pub planned_ms: i64,
    /// Progress observations emitted during a long wait.
    pub progress_reports: u32,
}

impl WaitOutcome {
    pub fn slept(&self) -> bool {
        self.planned_ms > 0
    }
}

/// Sleeps until venue-clock deadlines.
#[derive(Debug, Clone)]
pub struct DeadlineScheduler {
    clock: AdjustedClock,
    config: SchedulerConfig,
}

impl DeadlineScheduler {
    pub fn new(clock: AdjustedClock, config: SchedulerConfig) -> Self {
        Self { clock, config }
    }

    pub fn clock(&self) -> &AdjustedClock {
        &self.clock
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// `target - adjusted_now` in ms. Negative when the target has passed.
    #[inline]
    pub fn remaining_ms(&self, target_ms: i64) -> i64 {
        target_ms - self.clock.now_ms()
    }

    /// Sleep until `target_ms` (venue clock). Returns immediately if it has passed.
    pub async fn wait_until(&self, target_ms: i64) -> WaitOutcome {
        let planned_ms = self.remaining_ms(target_ms);
        if planned_ms <= 0 {
            return WaitOutcome {
                planned_ms,
                progress_reports: 0,
            };
        }

        let wait = Duration::from_millis(planned_ms as u64);
        let progress_reports = if wait > self.config.long_wait_threshold {
            self.long_wait(target_ms, wait).await
        } else {
            tokio::time::sleep(wait).await;
            0
        };

        // Timer drift over long sleeps; top up against the adjusted clock.
        let residual = self.remaining_ms(target_ms);
        if residual > 0 {
            debug!(residual_ms = residual, "Topping up deadline sleep");
            tokio::time::sleep(Duration::from_millis(residual as u64)).await;
        }

        WaitOutcome {
            planned_ms,
            progress_reports,
        }
    }

    async fn long_wait(&self, target_ms: i64, wait: Duration) -> u32 {
        info!(
            wait_secs = wait.as_secs(),
            target = %format_in_offset(target_ms, 0),
            "Long wait until deadline, reporting progress"
        );

        let token = CancellationToken::new();
        let reports = Arc::new(AtomicU32::new(0));
        let every = self.config.progress_interval.max(Duration::from_millis(1));

        let ticker = tokio::spawn({
            let token = token.clone();
            let reports = Arc::clone(&reports);
            let clock = self.clock.clone();
            async move {
                let mut interval = tokio::time::interval_at(Instant::now() + every, every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => {
                            let remaining_ms = target_ms - clock.now_ms();
                            reports.fetch_add(1, Ordering::Relaxed);
                            info!(
                                remaining_secs = remaining_ms / 1000,
                                "Waiting for deadline"
                            );
                        }
                    }
                }
            }
        });

        tokio::time::sleep(wait).await;
        token.cancel();
        let _ = ticker.await;

        reports.load(Ordering::Relaxed)
    }

    /// Next "HH:MM" in the given timezone, relative to adjusted now.
    ///
    /// See [`build_target_instant`].
    pub fn build_target_instant(
        &self,
        hour: u32,
        minute: u32,
        day_offset: u32,
        tz_offset_minutes: i32,
    ) -> ClockResult<DateTime<FixedOffset>> {
        build_target_instant(
            self.clock.now_ms(),
            hour,
            minute,
            day_offset,
            tz_offset_minutes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, MockClock};
    use crate::sync::ClockOffset;

    const BASE_TIME: i64 = 1_700_000_000_000;

    fn scheduler(clock: Arc<MockClock>, offset: i64, config: SchedulerConfig) -> DeadlineScheduler {
        DeadlineScheduler::new(AdjustedClock::new(clock, ClockOffset(offset)), config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_returns_immediately() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME));
        let s = scheduler(clock, 0, SchedulerConfig::default());

        let started = Instant::now();
        let outcome = s.wait_until(BASE_TIME - 5_000).await;
        assert!(!outcome.slept());
        assert_eq!(outcome.planned_ms, -5_000);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_wait_single_sleep() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME));
        let s = scheduler(clock.clone(), 0, SchedulerConfig::default());

        let outcome = s.wait_until(BASE_TIME + 2_500).await;
        assert_eq!(outcome.planned_ms, 2_500);
        assert_eq!(outcome.progress_reports, 0);
        assert_eq!(clock.now_ms(), BASE_TIME + 2_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_uses_adjusted_time() {
        // Venue is 1s ahead: a deadline 3s ahead on the venue clock is 2s away.
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME));
        let s = scheduler(clock, 1_000, SchedulerConfig::default());

        assert_eq!(s.remaining_ms(BASE_TIME + 3_000), 2_000);
        let started = Instant::now();
        s.wait_until(BASE_TIME + 3_000).await;
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_wait_reports_progress() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME));
        let config = SchedulerConfig {
            long_wait_threshold: Duration::from_secs(3600),
            progress_interval: Duration::from_secs(300),
        };
        let s = scheduler(clock.clone(), 0, config);

        let two_hours = 2 * 3_600_000;
        let outcome = s.wait_until(BASE_TIME + two_hours).await;

        // Ticks at 5, 10, ..., 115 minutes, plus possibly one at 120.
        assert!(
            (23..=24).contains(&outcome.progress_reports),
            "got {} reports",
            outcome.progress_reports
        );
        assert_eq!(clock.now_ms(), BASE_TIME + two_hours);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_boundary_has_no_progress() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME));
        let config = SchedulerConfig {
            long_wait_threshold: Duration::from_secs(60),
            progress_interval: Duration::from_secs(10),
        };
        let s = scheduler(clock, 0, config);

        let outcome = s.wait_until(BASE_TIME + 60_000).await;
        assert_eq!(outcome.progress_reports, 0);
    }

    #[test]
    fn test_build_target_uses_adjusted_now() {
        // Local clock says 17:59:59.500 UTC+8, venue is 1s ahead -> 18:00:00.500, past.
        let local = 1_710_064_799_500; // 2024-03-10 17:59:59.500 +08:00
        let clock = Arc::new(MockClock::fixed(local));

        let unsynced = scheduler(clock.clone(), 0, SchedulerConfig::default());
        let today = unsynced.build_target_instant(18, 0, 0, 480).unwrap();
        assert_eq!(today.timestamp_millis(), local + 500);

        let synced = scheduler(clock, 1_000, SchedulerConfig::default());
        let tomorrow = synced.build_target_instant(18, 0, 0, 480).unwrap();
        assert_eq!(tomorrow.timestamp_millis(), local + 500 + 86_400_000);
    }
}
