//! Application configuration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use volley_client::ClientConfig;
use volley_clock::SchedulerConfig;
use volley_core::{Account, OrderIntent};
use volley_dispatch::{BurstConfig, PreWarmConfig};

use crate::error::{AppError, AppResult};

/// Upper bound for `start_offset_ms` and `duration_ms` (24 hours).
pub const MAX_WINDOW_OFFSET_MS: u64 = 86_400_000;

/// Credentials of one account.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// When to fire, relative to a wall-clock time in a fixed timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Target hour in the target timezone. Default: 18.
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    /// 0 = today (or tomorrow if already past), N = N days ahead.
    #[serde(default)]
    pub day_offset: u32,
    /// Target timezone as minutes east of UTC. Default: 480 (UTC+8).
    #[serde(default = "default_tz_offset_minutes")]
    pub tz_offset_minutes: i32,
    /// Firing starts this long before the target (ms). Default: 1000.
    #[serde(default = "default_start_offset_ms")]
    pub start_offset_ms: u64,
    /// Firing continues this long after the target (ms). Default: 3000.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Waits longer than this report progress (ms). Default: 1 hour.
    #[serde(default = "default_long_wait_threshold_ms")]
    pub long_wait_threshold_ms: u64,
    /// Progress interval during long waits (ms). Default: 5 minutes.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_hour() -> u32 {
    18
}

fn default_tz_offset_minutes() -> i32 {
    480
}

fn default_start_offset_ms() -> u64 {
    1_000
}

fn default_duration_ms() -> u64 {
    3_000
}

fn default_long_wait_threshold_ms() -> u64 {
    3_600_000
}

fn default_progress_interval_ms() -> u64 {
    300_000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            minute: 0,
            day_offset: 0,
            tz_offset_minutes: default_tz_offset_minutes(),
            start_offset_ms: default_start_offset_ms(),
            duration_ms: default_duration_ms(),
            long_wait_threshold_ms: default_long_wait_threshold_ms(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl ScheduleConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            long_wait_threshold: Duration::from_millis(self.long_wait_threshold_ms),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
        }
    }
}

/// Burst and cleanup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstSection {
    #[serde(flatten)]
    pub dispatch: BurstConfig,
    /// Wait after the burst for in-flight requests to settle (ms). Default: 5000.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Cancel open orders for the symbol before the burst. Default: true.
    #[serde(default = "default_cancel_before")]
    pub cancel_before: bool,
    /// Cancel open orders after settling. This withdraws the orders the burst
    /// just placed, so it is only useful for dry runs. Default: false.
    #[serde(default)]
    pub cancel_after: bool,
    /// Assets whose balances are logged per account before firing.
    #[serde(default)]
    pub balance_assets: Vec<String>,
}

fn default_settle_ms() -> u64 {
    5_000
}

fn default_cancel_before() -> bool {
    true
}

impl Default for BurstSection {
    fn default() -> Self {
        Self {
            dispatch: BurstConfig::default(),
            settle_ms: default_settle_ms(),
            cancel_before: default_cancel_before(),
            cancel_after: false,
            balance_assets: Vec::new(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub venue: ClientConfig,
    pub accounts: Vec<AccountConfig>,
    pub order: OrderIntent,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub prewarm: PreWarmConfig,
    #[serde(default)]
    pub burst: BurstSection,
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Keep only the account at this index.
    pub account_index: Option<usize>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub day_offset: Option<u32>,
    pub start_offset_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply CLI overrides.
    ///
    /// # Errors
    /// Returns `AppError::Config` when `account_index` is out of range.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> AppResult<()> {
        if let Some(index) = overrides.account_index {
            if index >= self.accounts.len() {
                return Err(AppError::Config(format!(
                    "account index {index} out of range ({} accounts)",
                    self.accounts.len()
                )));
            }
            self.accounts = vec![self.accounts.swap_remove(index)];
        }
        let schedule = &mut self.schedule;
        if let Some(hour) = overrides.hour {
            schedule.hour = hour;
        }
        if let Some(minute) = overrides.minute {
            schedule.minute = minute;
        }
        if let Some(day_offset) = overrides.day_offset {
            schedule.day_offset = day_offset;
        }
        if let Some(start_offset_ms) = overrides.start_offset_ms {
            schedule.start_offset_ms = start_offset_ms;
        }
        if let Some(duration_ms) = overrides.duration_ms {
            schedule.duration_ms = duration_ms;
        }
        Ok(())
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> AppResult<()> {
        if self.accounts.is_empty() {
            return Err(AppError::Config("no accounts configured".to_string()));
        }
        let mut names = HashSet::new();
        for account in &self.accounts {
            if !names.insert(account.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate account name: {}",
                    account.name
                )));
            }
        }

        self.order.validate()?;

        let s = &self.schedule;
        if s.hour > 23 || s.minute > 59 {
            return Err(AppError::Config(format!(
                "invalid target time {:02}:{:02}",
                s.hour, s.minute
            )));
        }
        if s.tz_offset_minutes.abs() >= 24 * 60 {
            return Err(AppError::Config(format!(
                "timezone offset out of range: {}min",
                s.tz_offset_minutes
            )));
        }
        if s.duration_ms == 0 {
            return Err(AppError::Config("duration_ms must be positive".to_string()));
        }
        if s.duration_ms > MAX_WINDOW_OFFSET_MS || s.start_offset_ms > MAX_WINDOW_OFFSET_MS {
            return Err(AppError::Config(format!(
                "start_offset_ms {} and duration_ms {} must not exceed {MAX_WINDOW_OFFSET_MS}",
                s.start_offset_ms, s.duration_ms
            )));
        }
        if self.prewarm.min_successful_probes > self.prewarm.lead_seconds.len() {
            return Err(AppError::Config(format!(
                "min_successful_probes {} exceeds {} planned probes",
                self.prewarm.min_successful_probes,
                self.prewarm.lead_seconds.len()
            )));
        }
        Ok(())
    }

    /// Account handles for the run.
    pub fn accounts(&self) -> AppResult<Vec<Arc<Account>>> {
        self.accounts
            .iter()
            .map(|a| {
                Account::new(a.name.clone(), a.api_key.clone(), a.secret_key.clone())
                    .map(Arc::new)
                    .map_err(AppError::from)
            })
            .collect()
    }
}
