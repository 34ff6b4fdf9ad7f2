//! Dispatch and batch results.

use serde::Serialize;
use std::fmt;

/// Requests per second over an elapsed span, rounded.
///
/// Returns 0 when `elapsed_ms` is zero or negative so callers never see
/// an infinite or NaN rate.
pub fn compute_qps(request_count: u64, elapsed_ms: i64) -> u64 {
    if elapsed_ms <= 0 {
        return 0;
    }
    (request_count as f64 / (elapsed_ms as f64 / 1000.0)).round() as u64
}

/// Outcome of one account's burst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    /// Account name.
    pub account: String,
    /// Requests issued by the flood loop (not acknowledged ones).
    pub request_count: u64,
    /// Adjusted time when firing began (ms).
    pub actual_start_ms: i64,
    /// Adjusted time when the loop exited (ms).
    pub actual_end_ms: i64,
    pub elapsed_ms: i64,
    pub qps: u64,
}

impl DispatchResult {
    pub fn new(
        account: impl Into<String>,
        request_count: u64,
        actual_start_ms: i64,
        actual_end_ms: i64,
    ) -> Self {
        let elapsed_ms = actual_end_ms - actual_start_ms;
        Self {
            account: account.into(),
            request_count,
            actual_start_ms,
            actual_end_ms,
            elapsed_ms,
            qps: compute_qps(request_count, elapsed_ms),
        }
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} requests in {}ms ({} qps)",
            self.account, self.request_count, self.elapsed_ms, self.qps
        )
    }
}

/// An account whose dispatcher failed before entering the flood loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    pub account: String,
    pub reason: String,
}

/// Aggregated outcome of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    /// Successful results, in account order.
    pub results: Vec<DispatchResult>,
    /// Accounts that never reached the flood loop, in account order.
    pub failures: Vec<AccountFailure>,
    pub total_requests: u64,
    /// Mean per-account qps over successful results.
    pub avg_qps: f64,
    /// Total requests over the configured burst duration.
    pub system_qps: u64,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accounts ok, {} failed: {} requests, avg {:.2} qps/account, {} qps system",
            self.succeeded(),
            self.failed(),
            self.total_requests,
            self.avg_qps,
            self.system_qps
        )
    }
}
