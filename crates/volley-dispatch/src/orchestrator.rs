//! Multi-account fan-out.
//!
//! One [`BurstDispatcher`] per account, each on its own task, settled with
//! `join_all` so a failed account never cancels its siblings. Every account
//! ends up as either a `DispatchResult` or an `AccountFailure`.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info};
use volley_clock::{format_in_offset, ClockSync, DeadlineScheduler, SchedulerConfig};
use volley_core::{Account, AccountFailure, BatchResult, DispatchWindow, DynTransport, OrderIntent};
use volley_telemetry::Metrics;

use crate::burst::{BurstConfig, BurstDispatcher, CompletionSnapshot, CompletionStats};
use crate::error::{BurstResult, DispatchError};
use crate::prewarm::PreWarmConfig;
use crate::stats;

/// Completion counters of one account's burst.
#[derive(Debug, Clone)]
pub struct AccountCompletions {
    pub account: String,
    pub stats: Arc<CompletionStats>,
}

/// Outcome of [`BatchOrchestrator::run`].
///
/// `completions` keeps observing requests that are still in flight after the
/// batch result has been computed.
#[derive(Debug)]
pub struct BatchRun {
    pub result: BatchResult,
    pub completions: Vec<AccountCompletions>,
}

impl BatchRun {
    /// Completion counters summed over all accounts.
    pub fn completion_totals(&self) -> CompletionSnapshot {
        self.completions
            .iter()
            .map(|c| c.stats.snapshot())
            .fold(CompletionSnapshot::default(), |acc, s| acc + s)
    }
}

/// Runs all accounts through the same window concurrently.
pub struct BatchOrchestrator {
    scheduler: DeadlineScheduler,
    transport: DynTransport,
    burst: BurstConfig,
}

impl BatchOrchestrator {
    pub fn new(scheduler: DeadlineScheduler, transport: DynTransport, burst: BurstConfig) -> Self {
        Self {
            scheduler,
            transport,
            burst,
        }
    }

    /// Build on the clock of a completed sync.
    ///
    /// # Errors
    /// Returns `DispatchError::Clock` if `sync` has never succeeded.
    pub fn from_sync(
        sync: &ClockSync,
        scheduler_config: SchedulerConfig,
        transport: DynTransport,
        burst: BurstConfig,
    ) -> BurstResult<Self> {
        let clock = sync.adjusted()?;
        Ok(Self::new(
            DeadlineScheduler::new(clock, scheduler_config),
            transport,
            burst,
        ))
    }

    pub fn scheduler(&self) -> &DeadlineScheduler {
        &self.scheduler
    }

    /// Run one dispatcher per account and aggregate the results.
    ///
    /// Always returns once every dispatcher has finished or failed. Results
    /// and failures keep the order of `accounts`.
    pub async fn run(
        &self,
        accounts: &[Arc<Account>],
        intent: Arc<OrderIntent>,
        window: DispatchWindow,
        prewarm: &PreWarmConfig,
    ) -> BatchRun {
        info!(
            accounts = accounts.len(),
            intent = %intent,
            target = %format_in_offset(window.target_ms, 0),
            start = %format_in_offset(window.start_ms, 0),
            end = %format_in_offset(window.end_ms, 0),
            prewarm = prewarm.enabled,
            "Batch dispatch starting"
        );

        let mut completions = Vec::with_capacity(accounts.len());
        let mut handles = Vec::with_capacity(accounts.len());
        for account in accounts {
            let mut dispatcher = BurstDispatcher::new(
                self.scheduler.clone(),
                Arc::clone(&self.transport),
                prewarm.clone(),
                self.burst,
            );
            completions.push(AccountCompletions {
                account: account.name().to_string(),
                stats: dispatcher.completions(),
            });

            let account = Arc::clone(account);
            let intent = Arc::clone(&intent);
            handles.push(tokio::spawn(async move {
                dispatcher.run(account, intent, window).await
            }));
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (account, outcome) in accounts.iter().zip(join_all(handles).await) {
            let outcome = outcome
                .map_err(|e| DispatchError::TaskFailed(e.to_string()))
                .and_then(|r| r);
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(account = %account.name(), error = %e, "Account dispatch failed");
                    Metrics::account_failed(account.name());
                    failures.push(AccountFailure {
                        account: account.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let result = stats::aggregate(results, failures, window.duration_ms);
        info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            total_requests = result.total_requests,
            avg_qps = result.avg_qps,
            system_qps = result.system_qps,
            "Batch dispatch finished"
        );

        BatchRun {
            result,
            completions,
        }
    }
}
