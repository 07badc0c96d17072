//! Run gate for scheduled invocations.
//!
//! The scanner is started by an external timer (cron, systemd) every few
//! minutes. A scheduled run only scans the intervals whose bar boundary
//! falls on the current minute; manual runs scan everything.

use chrono::Timelike;
use market::Interval;

/// Intervals to scan at `now`. Empty means the run is a no-op.
pub fn active_intervals<T: Timelike>(configured: &[Interval], manual: bool, now: &T) -> Vec<Interval> {
    if manual {
        return configured.to_vec();
    }

    let minute_of_day = now.hour() * 60 + now.minute();
    configured
        .iter()
        .copied()
        .filter(|i| minute_of_day % i.minutes() == 0)
        .collect()
}
