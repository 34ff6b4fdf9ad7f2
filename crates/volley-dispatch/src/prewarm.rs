//! Connection pre-warming ahead of the dispatch window.
//!
//! A plan is a list of probe instants at fixed lead times before the target
//! (30s, 15s and 5s by default). Executing a plan walks the entries in
//! ascending fire time, sleeping on the venue clock until each one, and fires
//! exactly one probe per entry. Entries whose time has already passed fire
//! immediately; none are skipped. Probe failures are logged and counted but
//! never stop the plan.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use volley_clock::DeadlineScheduler;
use volley_core::{Account, DynTransport};
use volley_telemetry::Metrics;

/// Pre-warm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreWarmConfig {
    /// Whether dispatchers pre-warm before waiting for the window. Default: true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lead times before the target, in seconds. Default: [30, 15, 5].
    #[serde(default = "default_lead_seconds")]
    pub lead_seconds: Vec<u64>,
    /// Minimum successful probes for the account to proceed. Default: 0
    /// (pre-warm is best-effort and can never fail the account).
    #[serde(default)]
    pub min_successful_probes: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_lead_seconds() -> Vec<u64> {
    vec![30, 15, 5]
}

impl Default for PreWarmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lead_seconds: default_lead_seconds(),
            min_successful_probes: 0,
        }
    }
}

impl PreWarmConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// One planned probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreWarmEntry {
    pub lead_seconds: u64,
    /// Venue-clock instant of the probe (ms).
    pub fire_at_ms: i64,
}

/// Probe schedule for one target.
///
/// Invariant: `lead_seconds` strictly decreasing, so `fire_at_ms` strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreWarmPlan {
    entries: Vec<PreWarmEntry>,
}

impl PreWarmPlan {
    /// Build a plan from a target and lead times in any order.
    ///
    /// Duplicate lead times collapse into one entry.
    pub fn new(target_ms: i64, lead_seconds: &[u64]) -> Self {
        let mut leads = lead_seconds.to_vec();
        leads.sort_unstable_by(|a, b| b.cmp(a));
        leads.dedup();

        let entries = leads
            .into_iter()
            .map(|lead| PreWarmEntry {
                lead_seconds: lead,
                fire_at_ms: target_ms.saturating_sub((lead as i64).saturating_mul(1000)),
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[PreWarmEntry] {
        &self.entries
    }

    pub fn fire_times(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.fire_at_ms).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of executing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreWarmReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Entries reached after their fire time.
    pub late: usize,
}

impl PreWarmReport {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// Executes pre-warm plans against the venue.
#[derive(Clone)]
pub struct PreWarmPlanner {
    scheduler: DeadlineScheduler,
    transport: DynTransport,
}

impl PreWarmPlanner {
    pub fn new(scheduler: DeadlineScheduler, transport: DynTransport) -> Self {
        Self {
            scheduler,
            transport,
        }
    }

    /// See [`PreWarmPlan::new`].
    pub fn plan(target_ms: i64, lead_seconds: &[u64]) -> PreWarmPlan {
        PreWarmPlan::new(target_ms, lead_seconds)
    }

    /// Walk the plan, one probe per entry. Returns after the last probe.
    pub async fn execute(&self, account: &Account, plan: &PreWarmPlan) -> PreWarmReport {
        let mut report = PreWarmReport::default();
        info!(account = %account.name(), probes = plan.len(), "Pre-warm started");

        for entry in plan.entries() {
            let wait = self.scheduler.wait_until(entry.fire_at_ms).await;
            if wait.planned_ms < 0 {
                report.late += 1;
                debug!(
                    account = %account.name(),
                    lead_seconds = entry.lead_seconds,
                    late_ms = -wait.planned_ms,
                    "Pre-warm entry reached late, firing now"
                );
            }

            report.attempted += 1;
            let sent_at = self.scheduler.clock().now_ms();
            match self.transport.probe(account).await {
                Ok(venue_ms) => {
                    report.succeeded += 1;
                    Metrics::prewarm_probe(account.name(), true);
                    debug!(
                        account = %account.name(),
                        lead_seconds = entry.lead_seconds,
                        rtt_ms = self.scheduler.clock().now_ms() - sent_at,
                        venue_ms,
                        "Pre-warm probe ok"
                    );
                }
                Err(e) => {
                    Metrics::prewarm_probe(account.name(), false);
                    warn!(
                        account = %account.name(),
                        lead_seconds = entry.lead_seconds,
                        error = %e,
                        "Pre-warm probe failed"
                    );
                }
            }
        }

        info!(
            account = %account.name(),
            attempted = report.attempted,
            succeeded = report.succeeded,
            late = report.late,
            "Pre-warm finished"
        );
        report
    }
}
