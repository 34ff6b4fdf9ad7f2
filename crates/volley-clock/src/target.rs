//! Target instant construction in an explicit timezone.
//!
//! All conversion goes through a fixed UTC offset, never the host timezone,
//! so a run scheduled for "18:00 UTC+8" resolves to the same instant on any
//! machine.

use chrono::{DateTime, Days, FixedOffset, TimeZone};

use crate::error::{ClockError, ClockResult};

/// Absolute instant of the next "HH:MM" in the timezone `tz_offset_minutes`.
///
/// * `now_ms` - current adjusted time (venue clock)
/// * `day_offset` - 0 for today (rolling to tomorrow if already past),
///   N for N days after today in the target timezone
///
/// # Errors
/// Returns `ClockError::InvalidTarget` for an out-of-range hour, minute or
/// timezone offset.
pub fn build_target_instant(
    now_ms: i64,
    hour: u32,
    minute: u32,
    day_offset: u32,
    tz_offset_minutes: i32,
) -> ClockResult<DateTime<FixedOffset>> {
    let tz = FixedOffset::east_opt(tz_offset_minutes.saturating_mul(60)).ok_or_else(|| {
        ClockError::InvalidTarget(format!("timezone offset {tz_offset_minutes}min"))
    })?;

    let now = DateTime::from_timestamp_millis(now_ms)
        .ok_or_else(|| ClockError::InvalidTarget(format!("now {now_ms}ms out of range")))?
        .with_timezone(&tz);

    let date = now
        .date_naive()
        .checked_add_days(Days::new(u64::from(day_offset)))
        .ok_or_else(|| ClockError::InvalidTarget(format!("day offset {day_offset}")))?;

    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| ClockError::InvalidTarget(format!("time {hour:02}:{minute:02}")))?;

    // A fixed offset has exactly one mapping for every local time.
    let mut target = tz
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ClockError::InvalidTarget(format!("ambiguous local time {naive}")))?;

    if day_offset == 0 && target.timestamp_millis() < now_ms {
        target = target
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ClockError::InvalidTarget("date overflow".to_string()))?;
    }

    Ok(target)
}

/// Render an epoch-ms instant in a fixed UTC offset.
pub fn format_in_offset(ms: i64, tz_offset_minutes: i32) -> String {
    let Some(tz) = FixedOffset::east_opt(tz_offset_minutes.saturating_mul(60)) else {
        return format!("{ms}ms");
    };
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt
            .with_timezone(&tz)
            .format("%Y-%m-%d %H:%M:%S%.3f %:z")
            .to_string(),
        None => format!("{ms}ms"),
    }
}
