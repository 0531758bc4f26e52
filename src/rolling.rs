//! The rolling-48h window routine shared by the CP model's cost estimate
//! and the validator (spec §4.4 Design Notes, P2, P7).
//!
//! The legacy system indexed hours modulo-week, which miscounts windows
//! that start mid-week. This builds one flat `7 * weeks`-day timeline
//! per person and slides a single 7-day window across it; weekend days
//! always contribute 0 hours but the window still slides through them
//! (spec I5, I9 — the window does not reset at the weekday/weekend
//! boundary, only at the horizon's own start and end).

use chrono::Weekday;

use crate::domain::WEEKDAYS;

/// Builds the flat per-person hour timeline: index `i` is calendar day
/// `i` of the horizon (week = i/7 + 1, weekday = i%7, Monday-first).
pub fn build_hour_timeline(weeks: u32, mut hours_at: impl FnMut(u32, Weekday) -> u32) -> Vec<u32> {
    let days_of_week = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    let mut timeline = Vec::with_capacity(weeks as usize * 7);
    for week in 1..=weeks {
        for day in days_of_week {
            let hours = if WEEKDAYS.contains(&day) {
                hours_at(week, day)
            } else {
                0
            };
            timeline.push(hours);
        }
    }
    timeline
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingWindowResult {
    pub violating_windows: u32,
    pub total_excess_hours: u64,
}

/// Slides a 7-day window once across the flat timeline. Any window
/// summing to more than 48 hours contributes `sum - 48` to the excess
/// (soft weight 100, applied by the caller).
pub fn rolling_48h(timeline: &[u32]) -> RollingWindowResult {
    let mut result = RollingWindowResult::default();
    if timeline.len() < 7 {
        return result;
    }
    for window in timeline.windows(7) {
        let sum: u32 = window.iter().sum();
        if sum > 48 {
            result.violating_windows += 1;
            result.total_excess_hours += (sum - 48) as u64;
        }
    }
    result
}

/// Longest run of consecutive `true` entries in a flat boolean timeline,
/// used for `max_nights_sequence` (spec §9 open question (a): resolved
/// to count across the week boundary, reusing this same flat timeline).
pub fn max_consecutive_true(timeline: &[bool]) -> u32 {
    let mut best = 0u32;
    let mut current = 0u32;
    for &worked in timeline {
        if worked {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}
