//! Per-account burst dispatcher.
//!
//! # Flood loop
//!
//! While `adjusted_now <= end_ms` the loop issues one order per iteration by
//! spawning the request and moving on. Completions are observed by the
//! spawned task only: acknowledgements bump a counter and are logged at
//! debug level, failures bump a counter and are otherwise dropped. Nothing
//! the venue answers can slow down, abort or retry the loop.
//!
//! The loop yields to the runtime every `yield_every` iterations so that the
//! spawned requests (and sibling dispatchers on the same worker) get polled.
//! Without it a single-threaded runtime would not write a single byte until
//! the window closed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use volley_clock::{format_in_offset, DeadlineScheduler};
use volley_core::{Account, DispatchResult, DispatchWindow, DynTransport, OrderIntent};
use volley_telemetry::Metrics;

use crate::error::{BurstResult, DispatchError};
use crate::prewarm::{PreWarmConfig, PreWarmPlan, PreWarmPlanner};

/// Flood loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Yield to the runtime every N iterations (0 = never yield). Default: 64.
    #[serde(default = "default_yield_every")]
    pub yield_every: u32,
}

fn default_yield_every() -> u32 {
    64
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            yield_every: default_yield_every(),
        }
    }
}

/// Dispatcher lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    PreWarming,
    WaitingForStart,
    Firing,
    Done,
}

/// Completion counters for the requests of one dispatcher.
///
/// Updated by the spawned request tasks, possibly long after the flood
/// loop has returned.
#[derive(Debug, Default)]
pub struct CompletionStats {
    acked: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`CompletionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompletionSnapshot {
    pub acked: u64,
    pub failed: u64,
}

impl CompletionSnapshot {
    /// Requests that have completed either way.
    pub fn settled(&self) -> u64 {
        self.acked + self.failed
    }
}

impl std::ops::Add for CompletionSnapshot {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            acked: self.acked + rhs.acked,
            failed: self.failed + rhs.failed,
        }
    }
}

impl CompletionStats {
    pub fn snapshot(&self) -> CompletionSnapshot {
        CompletionSnapshot {
            acked: self.acked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Everything a spawned request needs, shared by all requests of one burst.
struct FireContext {
    transport: DynTransport,
    account: Arc<Account>,
    intent: Arc<OrderIntent>,
    stats: Arc<CompletionStats>,
    acked_total: IntCounter,
    failed_total: IntCounter,
}

impl FireContext {
    async fn fire(self: Arc<Self>) {
        match self.transport.place_order(&self.account, &self.intent).await {
            Ok(ack) => {
                self.stats.acked.fetch_add(1, Ordering::Relaxed);
                self.acked_total.inc();
                debug!(
                    account = %self.account.name(),
                    order_id = %ack.order_id,
                    transact_time = ack.transact_time,
                    "Order acknowledged"
                );
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.failed_total.inc();
            }
        }
    }
}

/// Runs one account through pre-warm, wait and flood.
pub struct BurstDispatcher {
    scheduler: DeadlineScheduler,
    transport: DynTransport,
    planner: PreWarmPlanner,
    prewarm: PreWarmConfig,
    config: BurstConfig,
    phase: DispatchPhase,
    completions: Arc<CompletionStats>,
}

impl BurstDispatcher {
    pub fn new(
        scheduler: DeadlineScheduler,
        transport: DynTransport,
        prewarm: PreWarmConfig,
        config: BurstConfig,
    ) -> Self {
        let planner = PreWarmPlanner::new(scheduler.clone(), Arc::clone(&transport));
        Self {
            scheduler,
            transport,
            planner,
            prewarm,
            config,
            phase: DispatchPhase::Idle,
            completions: Arc::new(CompletionStats::default()),
        }
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    /// Completion counters, shared with the spawned requests.
    pub fn completions(&self) -> Arc<CompletionStats> {
        Arc::clone(&self.completions)
    }

    /// Run the full lifecycle for `account` over `window`.
    ///
    /// # Errors
    /// Returns `DispatchError::PreWarm` when fewer than
    /// `min_successful_probes` pre-warm probes succeed. Nothing that happens
    /// once firing has begun is reported as an error.
    pub async fn run(
        &mut self,
        account: Arc<Account>,
        intent: Arc<OrderIntent>,
        window: DispatchWindow,
    ) -> BurstResult<DispatchResult> {
        if self.prewarm.enabled {
            self.enter(DispatchPhase::PreWarming, &account);
            let plan = PreWarmPlan::new(window.target_ms, &self.prewarm.lead_seconds);
            let report = self.planner.execute(&account, &plan).await;

            if report.succeeded < self.prewarm.min_successful_probes {
                self.phase = DispatchPhase::Done;
                return Err(DispatchError::PreWarm(format!(
                    "{}: {}/{} probes succeeded ({} late), {} required",
                    account.name(),
                    report.succeeded,
                    report.attempted,
                    report.late,
                    self.prewarm.min_successful_probes
                )));
            }
        }

        self.enter(DispatchPhase::WaitingForStart, &account);
        let wait = self.scheduler.wait_until(window.start_ms).await;
        if !wait.slept() {
            warn!(
                account = %account.name(),
                late_ms = -wait.planned_ms,
                "Dispatch window already open, firing immediately"
            );
        }

        self.enter(DispatchPhase::Firing, &account);
        let result = self.flood(Arc::clone(&account), intent, &window).await;
        self.enter(DispatchPhase::Done, &account);

        Metrics::orders_issued(&result.account, result.request_count);
        Metrics::dispatch_qps(&result.account, result.qps);
        info!(
            account = %result.account,
            requests = result.request_count,
            elapsed_ms = result.elapsed_ms,
            qps = result.qps,
            actual_start = %format_in_offset(result.actual_start_ms, 0),
            actual_end = %format_in_offset(result.actual_end_ms, 0),
            "Burst finished"
        );

        Ok(result)
    }

    async fn flood(
        &self,
        account: Arc<Account>,
        intent: Arc<OrderIntent>,
        window: &DispatchWindow,
    ) -> DispatchResult {
        let ctx = Arc::new(FireContext {
            transport: Arc::clone(&self.transport),
            acked_total: Metrics::orders_acked_counter(account.name()),
            failed_total: Metrics::orders_failed_counter(account.name()),
            account,
            intent,
            stats: Arc::clone(&self.completions),
        });

        let clock = self.scheduler.clock();
        let yield_every = u64::from(self.config.yield_every);
        let end_ms = window.end_ms;
        let mut count: u64 = 0;

        let actual_start = clock.now_ms();
        while clock.now_ms() <= end_ms {
            tokio::spawn(Arc::clone(&ctx).fire());
            count += 1;
            if yield_every != 0 && count % yield_every == 0 {
                tokio::task::yield_now().await;
            }
        }
        let actual_end = clock.now_ms();

        DispatchResult::new(ctx.account.name(), count, actual_start, actual_end)
    }

    fn enter(&mut self, phase: DispatchPhase, account: &Account) {
        info!(
            account = %account.name(),
            from = ?self.phase,
            to = ?phase,
            "Dispatcher phase"
        );
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use volley_clock::{AdjustedClock, ClockOffset, MockClock, SchedulerConfig};
    use volley_core::{MockTransport, OrderSide, TransportError};

    const BASE_TIME: i64 = 1_700_000_000_000;

    fn scheduler(clock: Arc<MockClock>) -> DeadlineScheduler {
        DeadlineScheduler::new(
            AdjustedClock::new(clock, ClockOffset(0)),
            SchedulerConfig::default(),
        )
    }

    fn intent() -> Arc<OrderIntent> {
        Arc::new(OrderIntent::limit(
            "REDUSDT",
            OrderSide::Buy,
            dec!(0.6),
            dec!(5000),
        ))
    }

    fn account(name: &str) -> Arc<Account> {
        Arc::new(Account::new(name, "key", "secret").unwrap())
    }

    fn dispatcher(clock: Arc<MockClock>, transport: Arc<MockTransport>) -> BurstDispatcher {
        BurstDispatcher::new(
            scheduler(clock),
            transport,
            PreWarmConfig::disabled(),
            BurstConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_request_count_grows_with_window() {
        let mut counts = Vec::new();
        for span_ms in [50_u64, 100, 200, 400] {
            // 1ms of loop overhead per clock read, no waiting.
            let clock = Arc::new(MockClock::fixed(BASE_TIME).with_read_cost_us(1_000));
            let transport = Arc::new(MockTransport::new());
            let mut d = dispatcher(clock, transport);

            let window = DispatchWindow::new(BASE_TIME, 0, span_ms).unwrap();
            let result = d
                .run(account("a"), intent(), window)
                .await
                .unwrap();
            assert!(result.request_count > 0);
            assert!(result.actual_end_ms > window.end_ms);
            counts.push(result.request_count);
        }
        assert!(
            counts.windows(2).all(|w| w[0] < w[1]),
            "counts not increasing: {counts:?}"
        );
    }

    #[tokio::test]
    async fn test_elapsed_zero_reports_zero_qps() {
        // Frozen clock already past the window: the loop never runs.
        let clock = Arc::new(MockClock::fixed(BASE_TIME));
        let transport = Arc::new(MockTransport::new());
        let mut d = dispatcher(clock, transport.clone());

        let window = DispatchWindow::new(BASE_TIME - 10_000, 1_000, 3_000).unwrap();
        let result = tokio_test::assert_ok!(d.run(account("a"), intent(), window).await);

        assert_eq!(result.request_count, 0);
        assert_eq!(result.elapsed_ms, 0);
        assert_eq!(result.qps, 0);
        assert_eq!(transport.orders_sent(), 0);
        assert_eq!(d.phase(), DispatchPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME).with_read_cost_us(1_000));
        let transport = Arc::new(MockTransport::new());
        transport.set_order_error(Some(TransportError::Http {
            status: 400,
            body: "{\"code\":-2010,\"msg\":\"insufficient balance\"}".to_string(),
        }));
        let mut d = dispatcher(clock, transport.clone());
        let completions = d.completions();

        let result = d
            .run(account("a"), intent(), DispatchWindow::new(BASE_TIME, 0, 100).unwrap())
            .await
            .unwrap();

        // Let every spawned request settle.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snapshot = completions.snapshot();
        assert_eq!(snapshot.failed, result.request_count);
        assert_eq!(snapshot.acked, 0);
        assert_eq!(transport.orders_sent(), result.request_count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_venue_does_not_slow_the_loop() {
        let clock = Arc::new(MockClock::fixed(BASE_TIME).with_read_cost_us(1_000));
        let transport = Arc::new(MockTransport::new());
        transport.set_latency(Duration::from_secs(30));
        let mut d = dispatcher(clock, transport.clone());
        let completions = d.completions();

        let result = d
            .run(account("a"), intent(), DispatchWindow::new(BASE_TIME, 0, 100).unwrap())
            .await
            .unwrap();

        // The loop returned while every request is still in flight.
        assert!(result.request_count > 50);
        assert_eq!(completions.snapshot().settled(), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(completions.snapshot().acked, result.request_count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_window_start() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME).with_read_cost_us(100));
        let transport = Arc::new(MockTransport::new());
        let mut d = dispatcher(clock, transport);

        let target = BASE_TIME + 10_000;
        let window = DispatchWindow::new(target, 1_000, 500).unwrap();
        let result = d.run(account("a"), intent(), window).await.unwrap();

        assert!((result.actual_start_ms - window.start_ms).abs() <= 5);
        assert!(result.actual_end_ms > window.end_ms);
        assert!(result.actual_end_ms - window.end_ms <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prewarm_threshold_fails_before_firing() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME));
        let transport = Arc::new(MockTransport::new());
        transport.fail_probes_for("a");
        let prewarm = PreWarmConfig {
            min_successful_probes: 1,
            ..PreWarmConfig::default()
        };
        let mut d = BurstDispatcher::new(
            scheduler(clock),
            transport.clone(),
            prewarm,
            BurstConfig::default(),
        );

        let window = DispatchWindow::new(BASE_TIME + 60_000, 1_000, 3_000).unwrap();
        let err = d.run(account("a"), intent(), window).await.unwrap_err();

        assert!(matches!(err, DispatchError::PreWarm(_)));
        assert!(err.to_string().contains("a: 0/3 probes succeeded (0 late), 1 required"));
        assert_eq!(transport.probes_for("a").len(), 3);
        assert_eq!(transport.orders_sent(), 0);
        assert_eq!(d.phase(), DispatchPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_effort_prewarm_still_fires() {
        let clock = Arc::new(MockClock::following_tokio(BASE_TIME).with_read_cost_us(100));
        let transport = Arc::new(MockTransport::new());
        transport.fail_probes_for("a");
        let mut d = BurstDispatcher::new(
            scheduler(clock),
            transport.clone(),
            PreWarmConfig::default(),
            BurstConfig::default(),
        );

        let window = DispatchWindow::new(BASE_TIME + 60_000, 1_000, 100).unwrap();
        let result = d.run(account("a"), intent(), window).await.unwrap();

        assert!(result.request_count > 0);
        assert_eq!(transport.probes_for("a").len(), 3);
    }
}
