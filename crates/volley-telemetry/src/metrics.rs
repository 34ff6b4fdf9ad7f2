//! Prometheus metrics for volley.
//!
//! Covers clock sync, pre-warm probes, order issuance and completions, and
//! per-account throughput.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should
//! crash at startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_int_counter_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Measured venue clock offset (venue - local) in milliseconds.
pub static CLOCK_OFFSET_MS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "volley_clock_offset_ms",
        "Venue clock offset (venue - local) in milliseconds"
    )
    .unwrap()
});

/// Pre-warm probes by outcome.
/// Labels: account, outcome (ok/failed)
pub static PREWARM_PROBES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "volley_prewarm_probes_total",
        "Total pre-warm probes issued",
        &["account", "outcome"]
    )
    .unwrap()
});

/// Order requests issued by the flood loop.
pub static ORDERS_ISSUED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volley_orders_issued_total",
        "Order requests issued by the flood loop",
        &["account"]
    )
    .unwrap()
});

/// Order requests acknowledged by the venue.
pub static ORDERS_ACKED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volley_orders_acked_total",
        "Order requests acknowledged by the venue",
        &["account"]
    )
    .unwrap()
});

/// Order requests that failed (swallowed by the flood loop).
pub static ORDERS_FAILED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volley_orders_failed_total",
        "Order requests that failed",
        &["account"]
    )
    .unwrap()
});

/// Last burst throughput per account.
pub static DISPATCH_QPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "volley_dispatch_qps",
        "Requests per second of the last burst",
        &["account"]
    )
    .unwrap()
});

/// Accounts that failed before firing.
pub static ACCOUNT_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volley_account_failures_total",
        "Accounts whose dispatcher failed before firing",
        &["account"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record the measured clock offset.
    pub fn clock_offset(offset_ms: i64) {
        CLOCK_OFFSET_MS.set(offset_ms);
    }

    /// Record a pre-warm probe outcome.
    pub fn prewarm_probe(account: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        PREWARM_PROBES_TOTAL
            .with_label_values(&[account, outcome])
            .inc();
    }

    /// Record requests issued by one burst.
    pub fn orders_issued(account: &str, count: u64) {
        ORDERS_ISSUED_TOTAL
            .with_label_values(&[account])
            .inc_by(count);
    }

    /// Counter handle for acknowledged orders.
    ///
    /// Resolved once per dispatcher so completions avoid the label lookup.
    pub fn orders_acked_counter(account: &str) -> IntCounter {
        ORDERS_ACKED_TOTAL.with_label_values(&[account])
    }

    /// Counter handle for failed orders.
    pub fn orders_failed_counter(account: &str) -> IntCounter {
        ORDERS_FAILED_TOTAL.with_label_values(&[account])
    }

    /// Record the throughput of a finished burst.
    pub fn dispatch_qps(account: &str, qps: u64) {
        DISPATCH_QPS.with_label_values(&[account]).set(qps as f64);
    }

    /// Record an account that failed before firing.
    pub fn account_failed(account: &str) {
        ACCOUNT_FAILURES_TOTAL.with_label_values(&[account]).inc();
    }
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        Metrics::orders_issued("metrics-test", 10);
        Metrics::orders_issued("metrics-test", 5);
        assert_eq!(
            ORDERS_ISSUED_TOTAL
                .with_label_values(&["metrics-test"])
                .get(),
            15
        );

        let acked = Metrics::orders_acked_counter("metrics-test");
        acked.inc();
        acked.inc();
        assert_eq!(Metrics::orders_acked_counter("metrics-test").get(), 2);
    }

    #[test]
    fn test_gather_text_contains_metrics() {
        Metrics::clock_offset(-42);
        Metrics::dispatch_qps("gather-test", 1234);
        let text = gather_text().unwrap();
        assert!(text.contains("volley_clock_offset_ms -42"));
        assert!(text.contains("volley_dispatch_qps{account=\"gather-test\"} 1234"));
    }
}
