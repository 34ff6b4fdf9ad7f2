//! Main application.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use volley_client::VenueClient;
use volley_clock::{format_in_offset, Clock, ClockSync, DeadlineScheduler, SystemClock};
use volley_core::{Account, BatchResult, DispatchWindow, DynTransport};
use volley_dispatch::BatchOrchestrator;
use volley_telemetry::{gather_text, Metrics};

use crate::config::{AppConfig, ScheduleConfig};
use crate::error::{AppError, AppResult};

/// Main application.
pub struct Application {
    config: AppConfig,
    client: VenueClient,
    clock: Arc<dyn Clock>,
}

impl Application {
    /// Validate the configuration and build the venue client.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let client = VenueClient::new(config.venue.clone())?;
        Ok(Self {
            config,
            client,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one batch, or stop early on Ctrl-C.
    ///
    /// In-flight requests are abandoned on shutdown.
    pub async fn run(&self) -> AppResult<BatchResult> {
        tokio::select! {
            result = self.run_batch() => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown signal received, abandoning batch");
                Err(AppError::Shutdown)
            }
        }
    }

    async fn run_batch(&self) -> AppResult<BatchResult> {
        let schedule = &self.config.schedule;

        // Nothing is scheduled without a venue clock.
        let sync = ClockSync::new(Arc::new(self.client.clone()), Arc::clone(&self.clock));
        let adjusted = sync.sync_adjusted().await?;
        Metrics::clock_offset(adjusted.offset().as_ms());
        info!(
            offset_ms = adjusted.offset().as_ms(),
            venue_now = %format_in_offset(adjusted.now_ms(), schedule.tz_offset_minutes),
            "Venue clock"
        );

        let scheduler = DeadlineScheduler::new(adjusted.clone(), schedule.scheduler_config());
        let window = plan_window(&scheduler, schedule)?;
        info!(
            target = %format_in_offset(window.target_ms, schedule.tz_offset_minutes),
            start = %format_in_offset(window.start_ms, schedule.tz_offset_minutes),
            end = %format_in_offset(window.end_ms, schedule.tz_offset_minutes),
            wait_secs = scheduler.remaining_ms(window.start_ms) / 1000,
            "Dispatch window planned"
        );

        // Signed requests are stamped with venue time.
        let client = Arc::new(
            self.client
                .clone()
                .with_timestamp_fn(Arc::new(move || adjusted.now_ms())),
        );
        let accounts = self.config.accounts()?;
        let intent = Arc::new(self.config.order.clone());

        if !self.config.burst.balance_assets.is_empty() {
            log_balances(&client, &accounts, &self.config.burst.balance_assets).await;
        }
        if self.config.burst.cancel_before {
            cancel_open_orders(&client, &accounts, &intent.symbol).await;
        }

        let transport: DynTransport = client.clone();
        let orchestrator =
            BatchOrchestrator::new(scheduler, transport, self.config.burst.dispatch);
        let run = orchestrator
            .run(&accounts, intent.clone(), window, &self.config.prewarm)
            .await;

        for result in &run.result.results {
            info!("{result}");
        }
        for failure in &run.result.failures {
            error!(account = %failure.account, reason = %failure.reason, "Account did not fire");
        }
        info!("{}", run.result);

        let settle = Duration::from_millis(self.config.burst.settle_ms);
        info!(settle_ms = self.config.burst.settle_ms, "Waiting for in-flight requests");
        tokio::time::sleep(settle).await;

        for completions in &run.completions {
            let snapshot = completions.stats.snapshot();
            info!(
                account = %completions.account,
                acked = snapshot.acked,
                failed = snapshot.failed,
                "Completions after settle"
            );
        }
        let totals = run.completion_totals();
        info!(
            issued = run.result.total_requests,
            acked = totals.acked,
            failed = totals.failed,
            pending = run.result.total_requests.saturating_sub(totals.settled()),
            "Batch completions"
        );

        if self.config.burst.cancel_after {
            cancel_open_orders(&client, &accounts, &intent.symbol).await;
        }

        match gather_text() {
            Ok(text) => debug!("Final metrics\n{text}"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }

        Ok(run.result)
    }
}

/// Window around the next configured target, on the scheduler's clock.
pub fn plan_window(
    scheduler: &DeadlineScheduler,
    schedule: &ScheduleConfig,
) -> AppResult<DispatchWindow> {
    let target = scheduler.build_target_instant(
        schedule.hour,
        schedule.minute,
        schedule.day_offset,
        schedule.tz_offset_minutes,
    )?;
    Ok(DispatchWindow::new(
        target.timestamp_millis(),
        schedule.start_offset_ms,
        schedule.duration_ms,
    )?)
}

/// Best-effort balance report across all accounts. Failures are logged only.
async fn log_balances(client: &VenueClient, accounts: &[Arc<Account>], assets: &[String]) {
    let outcomes = join_all(
        accounts
            .iter()
            .map(|account| client.balances(account, assets)),
    )
    .await;

    for (account, outcome) in accounts.iter().zip(outcomes) {
        match outcome {
            Ok(balances) => {
                for balance in balances {
                    info!(
                        account = %account.name(),
                        asset = %balance.asset,
                        free = %balance.free,
                        locked = %balance.locked,
                        "Balance"
                    );
                }
            }
            Err(e) => warn!(account = %account.name(), error = %e, "Balance query failed"),
        }
    }
}

/// Best-effort cleanup across all accounts. Failures are logged only.
async fn cancel_open_orders(client: &VenueClient, accounts: &[Arc<Account>], symbol: &str) {
    let outcomes = join_all(
        accounts
            .iter()
            .map(|account| client.cancel_open_orders(account, symbol)),
    )
    .await;

    for (account, outcome) in accounts.iter().zip(outcomes) {
        match outcome {
            Ok(0) => info!(account = %account.name(), symbol, "No open orders"),
            Ok(cancelled) => info!(account = %account.name(), symbol, cancelled, "Open orders cancelled"),
            Err(e) => warn!(account = %account.name(), symbol, error = %e, "Open order cleanup failed"),
        }
    }
}
