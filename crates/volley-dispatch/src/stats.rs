//! Batch statistics.

use volley_core::{AccountFailure, BatchResult, DispatchResult};

/// Reduce per-account results into a [`BatchResult`].
///
/// - `total_requests`: sum of request counts
/// - `avg_qps`: mean per-account qps over successful results, 0 when there are none
/// - `system_qps`: `round(total / (configured_duration_ms / 1000))`, 0 for a zero duration
///
/// Accounts run concurrently, so the system rate uses the configured burst
/// duration rather than any single account's elapsed time. The aggregates
/// are integer sums, so they do not depend on the order of `results`.
pub fn aggregate(
    results: Vec<DispatchResult>,
    failures: Vec<AccountFailure>,
    configured_duration_ms: u64,
) -> BatchResult {
    let total_requests: u64 = results.iter().map(|r| r.request_count).sum();
    let qps_sum: u64 = results.iter().map(|r| r.qps).sum();

    let avg_qps = if results.is_empty() {
        0.0
    } else {
        qps_sum as f64 / results.len() as f64
    };

    let system_qps = if configured_duration_ms == 0 {
        0
    } else {
        (total_requests as f64 / (configured_duration_ms as f64 / 1000.0)).round() as u64
    };

    BatchResult {
        results,
        failures,
        total_requests,
        avg_qps,
        system_qps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(account: &str, count: u64, elapsed_ms: i64) -> DispatchResult {
        DispatchResult::new(account, count, 1_000, 1_000 + elapsed_ms)
    }

    #[test]
    fn test_aggregate_basic() {
        let batch = aggregate(
            vec![result("a", 3_000, 4_000), result("b", 6_000, 4_000)],
            vec![],
            3_000,
        );
        assert_eq!(batch.total_requests, 9_000);
        // 750 and 1500 qps
        assert_eq!(batch.avg_qps, 1_125.0);
        assert_eq!(batch.system_qps, 3_000);
        assert!(!batch.is_partial());
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let results = vec![
            result("a", 1_234, 3_917),
            result("b", 9_876, 4_003),
            result("c", 17, 1),
            result("d", 0, 0),
        ];
        let forward = aggregate(results.clone(), vec![], 3_000);

        let mut reversed = results.clone();
        reversed.reverse();
        let backward = aggregate(reversed, vec![], 3_000);

        let mut rotated = results;
        rotated.rotate_left(2);
        let rotated = aggregate(rotated, vec![], 3_000);

        for other in [&backward, &rotated] {
            assert_eq!(forward.total_requests, other.total_requests);
            assert_eq!(forward.avg_qps, other.avg_qps);
            assert_eq!(forward.system_qps, other.system_qps);
        }
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let results = vec![result("a", 100, 1_000), result("b", 300, 1_000)];
        let first = aggregate(results.clone(), vec![], 1_000);
        let second = aggregate(first.results.clone(), first.failures.clone(), 1_000);
        assert_eq!(first, second);
        assert_eq!(first.results, results);
    }

    #[test]
    fn test_aggregate_empty_and_zero_duration() {
        let empty = aggregate(vec![], vec![], 3_000);
        assert_eq!(empty.total_requests, 0);
        assert_eq!(empty.avg_qps, 0.0);
        assert_eq!(empty.system_qps, 0);

        let no_duration = aggregate(vec![result("a", 500, 10)], vec![], 0);
        assert_eq!(no_duration.system_qps, 0);
        assert!(no_duration.avg_qps.is_finite());
    }

    #[test]
    fn test_aggregate_keeps_failures() {
        let failures = vec![AccountFailure {
            account: "b".to_string(),
            reason: "Pre-warm failed".to_string(),
        }];
        let batch = aggregate(vec![result("a", 10, 1_000)], failures, 1_000);
        assert!(batch.is_partial());
        assert_eq!(batch.succeeded(), 1);
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.avg_qps, 10.0);
    }
}
