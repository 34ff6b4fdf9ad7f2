//! Dispatch window around a target instant.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The `[start, end]` interval during which orders are fired.
///
/// All instants are venue-clock epoch milliseconds.
/// Invariant: `start_ms <= target_ms <= end_ms`, enforced by `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchWindow {
    pub target_ms: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Configured burst duration after the target (ms).
    pub duration_ms: u64,
}

impl DispatchWindow {
    /// Build a window: `start = target - start_offset`, `end = target + duration`.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidWindow` when either bound does not fit in
    /// epoch milliseconds.
    pub fn new(target_ms: i64, start_offset_ms: u64, duration_ms: u64) -> Result<Self> {
        let start_ms = i64::try_from(start_offset_ms)
            .ok()
            .and_then(|offset| target_ms.checked_sub(offset))
            .ok_or_else(|| {
                CoreError::InvalidWindow(format!("start offset {start_offset_ms}ms out of range"))
            })?;
        let end_ms = i64::try_from(duration_ms)
            .ok()
            .and_then(|duration| target_ms.checked_add(duration))
            .ok_or_else(|| {
                CoreError::InvalidWindow(format!("duration {duration_ms}ms out of range"))
            })?;

        Ok(Self {
            target_ms,
            start_ms,
            end_ms,
            duration_ms,
        })
    }

    /// Total firing span from start to end (ms).
    pub fn span_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn start_offset_ms(&self) -> u64 {
        (self.target_ms - self.start_ms) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        let w = DispatchWindow::new(10_000, 1_000, 3_000).unwrap();
        assert_eq!(w.start_ms, 9_000);
        assert_eq!(w.end_ms, 13_000);
        assert_eq!(w.span_ms(), 4_000);
        assert_eq!(w.start_offset_ms(), 1_000);
        assert!(w.start_ms <= w.target_ms && w.target_ms <= w.end_ms);
    }

    #[test]
    fn test_zero_offsets_collapse_to_target() {
        let w = DispatchWindow::new(5_000, 0, 0).unwrap();
        assert_eq!(w.start_ms, 5_000);
        assert_eq!(w.end_ms, 5_000);
        assert_eq!(w.span_ms(), 0);
    }

    #[test]
    fn test_oversized_offsets_are_rejected() {
        let err = DispatchWindow::new(1_000, 0, 1 << 63).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow(_)));

        let err = DispatchWindow::new(1_710_064_800_000, u64::MAX, 3_000).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWindow(_)));

        assert!(DispatchWindow::new(i64::MAX - 10, 0, 11).is_err());
        assert!(DispatchWindow::new(i64::MAX - 10, 0, 10).is_ok());
    }
}
