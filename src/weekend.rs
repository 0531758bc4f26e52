//! Weekend CP model (C8, spec §4.8).
//!
//! Independent from the weekday model (`model.rs`): its own variables,
//! its own constraints, its own output shape (Sat/Sun only). People with
//! `available_weekends=false` never get a variable, so they can never be
//! assigned. Reuses the same `selen` plumbing as `model.rs` -- only
//! `Model::int`, `m.sum`, and `m.c(..).eq/le` are used, since that is the
//! full surface demonstrated against this domain.

use std::collections::HashMap;

use chrono::Weekday;
use selen::prelude::*;

use crate::domain::{CalendarPosition, EdoPlan, Schedule, Shift, StaffingPlan, TeamInput, WEEKEND_DAYS};
use crate::error::{EngineError, EngineResult};

type VarKey = (usize, Weekday, Shift);

/// Builds and solves the weekend model for one `week`'s weekend,
/// returning a schedule whose only populated positions are Sat/Sun.
/// Each weekend is modelled independently (the driver calls this once
/// per week, mirroring the weekday model's per-attempt isolation).
pub fn solve_weekend_attempt(team: &TeamInput, week: u32, seed: u64) -> EngineResult<Schedule> {
    let eligible: Vec<usize> = team
        .persons
        .iter()
        .enumerate()
        .filter(|(_, p)| p.available_weekends)
        .map(|(i, _)| i)
        .collect();

    let mut m = Model::default();
    let mut x: HashMap<VarKey, VarId> = HashMap::new();

    for &pi in &eligible {
        for day in WEEKEND_DAYS {
            for shift in [Shift::Day, Shift::Night] {
                x.insert((pi, day, shift), m.int(0, 1));
            }
        }
    }

    // W1: exactly one pair (arity 2) on each (day, shift).
    for day in WEEKEND_DAYS {
        for shift in [Shift::Day, Shift::Night] {
            let vars: Vec<VarId> = eligible.iter().map(|&pi| x[&(pi, day, shift)]).collect();
            let sum = m.sum(&vars);
            m.c(sum).eq(int(2));
        }
    }

    // W2 (and, as a consequence, W3): <=24h per person per weekend.
    // Weighting by hours is done by repeating each 0/1 variable in the
    // summed list `hours(shift)` times, since `m.sum` has no weighted
    // form in the demonstrated API. A person who works Day+Night on Sat
    // (22h) can never also take a Sun slot (>=10h more) without
    // exceeding 24h, so this single linear bound also enforces W3
    // without a separate implication constraint.
    for &pi in &eligible {
        let mut weighted_terms: Vec<VarId> = Vec::new();
        for day in WEEKEND_DAYS {
            for shift in [Shift::Day, Shift::Night] {
                let var = x[&(pi, day, shift)];
                for _ in 0..shift.hours() {
                    weighted_terms.push(var);
                }
            }
        }
        let total_hours = m.sum(&weighted_terms);
        m.c(total_hours).le(int(24));
    }

    let solution = m.solve().map_err(|e| EngineError::SolverError {
        attempt: 0,
        seed,
        detail: format!("{e:?}"),
    })?;

    let mut schedule = Schedule::new(week, EdoPlan::default(), StaffingPlan::default(), seed);
    for day in WEEKEND_DAYS {
        for shift in [Shift::Day, Shift::Night] {
            let position = CalendarPosition::new(week, day);
            for &pi in &eligible {
                if solution.get::<i32>(x[&(pi, day, shift)]) == 1 {
                    schedule.set_shift(position, &team.persons[pi].name, shift);
                }
            }
        }
    }

    Ok(schedule)
}

/// Solves every weekend in the horizon independently and merges the
/// per-week schedules into one, then runs [`rebalance_weekend`] over the
/// combined horizon to pursue the cross-weekend soft terms (spec §4.8)
/// that no single weekend's CP model can see on its own. Each weekend's
/// attempt uses a seed derived from the week number so results stay
/// deterministic given the base seed (spec P4).
pub fn solve_weekend_horizon(team: &TeamInput, weeks: u32, base_seed: u64) -> EngineResult<Schedule> {
    let mut combined = Schedule::new(weeks, EdoPlan::default(), StaffingPlan::default(), base_seed);
    for week in 1..=weeks {
        let weekly = solve_weekend_attempt(team, week, base_seed.wrapping_add(week as u64))?;
        for day in WEEKEND_DAYS {
            let position = CalendarPosition::new(week, day);
            for shift in [Shift::Day, Shift::Night] {
                for person in weekly.persons_on(position, shift) {
                    combined.set_shift(position, person, shift);
                }
            }
        }
    }
    rebalance_weekend(team, &mut combined, DEFAULT_WEEKEND_REBALANCE_STEPS);
    Ok(combined)
}

/// True if `person` is a 24h worker on `(week, day)` (W5: both halves assigned).
pub fn is_24h(schedule: &Schedule, person: &str, week: u32, day: Weekday) -> bool {
    let position = CalendarPosition::new(week, day);
    schedule.persons_on(position, Shift::Day).iter().any(|p| p == person)
        && schedule.persons_on(position, Shift::Night).iter().any(|p| p == person)
}

/// Per-person Sat/Sun counts and 12h/24h-shift counts over the horizon,
/// the raw inputs to C8's soft terms (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct WeekendTally {
    pub saturdays: u32,
    pub sundays: u32,
    pub solo_shifts: u32,
    pub double_shifts: u32,
}

pub fn tally_weekends(schedule: &Schedule, person: &str) -> WeekendTally {
    let mut tally = WeekendTally::default();
    for week in 1..=schedule.weeks {
        for day in WEEKEND_DAYS {
            let position = CalendarPosition::new(week, day);
            let worked_day = schedule.persons_on(position, Shift::Day).iter().any(|p| p == person);
            let worked_night = schedule.persons_on(position, Shift::Night).iter().any(|p| p == person);
            if !worked_day && !worked_night {
                continue;
            }
            match day {
                Weekday::Sat => tally.saturdays += 1,
                Weekday::Sun => tally.sundays += 1,
                _ => unreachable!("WEEKEND_DAYS is Sat/Sun only"),
            }
            if is_24h(schedule, person, week, day) {
                tally.double_shifts += 1;
            } else {
                tally.solo_shifts += 1;
            }
        }
    }
    tally
}

/// Default iteration budget for [`rebalance_weekend`] when driven through
/// [`solve_weekend_horizon`]. Weekend swaps are cheap to evaluate (two
/// weekend days per week rather than five weekdays), so this can run
/// comfortably higher than the weekday rebalancer's own per-attempt
/// default without dominating a solve's wall clock.
pub const DEFAULT_WEEKEND_REBALANCE_STEPS: u32 = 200;

/// Scalar reduction of the three weekend soft terms (spec §4.8). Lower is
/// better, mirroring [`crate::scorer::score`]'s convention. The weights
/// are not spelled out in the weekday soft-term table (§4.4 only covers
/// the weekday model), so they are chosen to match that table's relative
/// ordering: a spread term across people outweighs a weak pairing
/// penalty, the same way `night_spread` (10) outweighs `evening_to_day` (1).
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekendDiagnostics {
    pub saturday_spread: f64,
    pub sunday_spread: f64,
    pub shift_type_spread: f64,
    pub pair_repeats: u32,
}

pub fn weekend_diagnostics(team: &TeamInput, schedule: &Schedule) -> WeekendDiagnostics {
    let mut saturdays = Vec::with_capacity(team.persons.len());
    let mut sundays = Vec::with_capacity(team.persons.len());
    let mut doubles = Vec::with_capacity(team.persons.len());

    for person in &team.persons {
        let tally = tally_weekends(schedule, &person.name);
        saturdays.push(tally.saturdays as f64);
        sundays.push(tally.sundays as f64);
        doubles.push(tally.double_shifts as f64);
    }

    WeekendDiagnostics {
        saturday_spread: spread_f64(&saturdays),
        sunday_spread: spread_f64(&sundays),
        shift_type_spread: spread_f64(&doubles),
        pair_repeats: count_pair_repeats(schedule),
    }
}

pub fn weekend_score(diag: &WeekendDiagnostics) -> f64 {
    10.0 * diag.saturday_spread + 10.0 * diag.sunday_spread + 5.0 * diag.shift_type_spread + 1.0 * diag.pair_repeats as f64
}

fn spread_f64(values: &[f64]) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo.is_finite() && hi.is_finite() {
        hi - lo
    } else {
        0.0
    }
}

/// Counts, across every pair of weekends, how many times the same two
/// people shared a Day or Night slot together more than once.
fn count_pair_repeats(schedule: &Schedule) -> u32 {
    let mut seen: HashMap<(String, String), u32> = HashMap::new();
    for week in 1..=schedule.weeks {
        for day in WEEKEND_DAYS {
            let position = CalendarPosition::new(week, day);
            for shift in [Shift::Day, Shift::Night] {
                let persons = schedule.persons_on(position, shift);
                for pair in persons.chunks(2) {
                    if let [a, b] = pair {
                        let key = if a < b {
                            (a.clone(), b.clone())
                        } else {
                            (b.clone(), a.clone())
                        };
                        *seen.entry(key).or_insert(0) += 1;
                    }
                }
            }
        }
    }
    seen.values().filter(|&&count| count > 1).map(|&count| count - 1).sum()
}

/// Greedy swap local search over the weekend soft terms (spec §4.8),
/// mirroring [`crate::rebalance::rebalance`]'s shape: each step swaps one
/// person for another on the same (week, day, shift) slot and keeps the
/// swap only if it strictly lowers [`weekend_score`] without reintroducing
/// a W2 violation.
pub fn rebalance_weekend(team: &TeamInput, schedule: &mut Schedule, steps: u32) {
    for _ in 0..steps {
        let before = weekend_score(&weekend_diagnostics(team, schedule));
        let Some(swap) = best_weekend_swap(team, schedule) else {
            break;
        };
        apply_weekend_swap(schedule, &swap);
        let after = weekend_score(&weekend_diagnostics(team, schedule));
        if after >= before || !respects_w2(schedule, &swap.to) {
            undo_weekend_swap(schedule, &swap);
            break;
        }
    }
}

struct WeekendSwap {
    position: CalendarPosition,
    shift: Shift,
    from: String,
    to: String,
}

fn apply_weekend_swap(schedule: &mut Schedule, swap: &WeekendSwap) {
    schedule.remove_shift(swap.position, &swap.from, swap.shift);
    schedule.set_shift(swap.position, &swap.to, swap.shift);
}

fn undo_weekend_swap(schedule: &mut Schedule, swap: &WeekendSwap) {
    schedule.remove_shift(swap.position, &swap.to, swap.shift);
    schedule.set_shift(swap.position, &swap.from, swap.shift);
}

/// Finds the highest-tallied and lowest-tallied person (by combined
/// Sat+Sun appearance count) and a slot where swapping one for the other
/// keeps every weekend hard constraint intact.
fn best_weekend_swap(team: &TeamInput, schedule: &Schedule) -> Option<WeekendSwap> {
    let mut totals: Vec<(String, u32)> = team
        .persons
        .iter()
        .filter(|p| p.available_weekends)
        .map(|p| {
            let tally = tally_weekends(schedule, &p.name);
            (p.name.clone(), tally.saturdays + tally.sundays)
        })
        .collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let (high_name, _) = totals.first()?.clone();
    let (low_name, _) = totals.last()?.clone();
    if high_name == low_name {
        return None;
    }
    let low = team.by_name(&low_name)?;

    for week in 1..=schedule.weeks {
        for day in WEEKEND_DAYS {
            let position = CalendarPosition::new(week, day);
            for shift in [Shift::Day, Shift::Night] {
                let persons = schedule.persons_on(position, shift);
                if !persons.iter().any(|p| p == &high_name) {
                    continue;
                }
                if weekend_slot_working(schedule, &low_name, position) {
                    continue;
                }
                if !hours_after_swap_ok(schedule, low, position, shift) {
                    continue;
                }
                return Some(WeekendSwap {
                    position,
                    shift,
                    from: high_name,
                    to: low_name,
                });
            }
        }
    }
    None
}

fn weekend_slot_working(schedule: &Schedule, person: &str, position: CalendarPosition) -> bool {
    [Shift::Day, Shift::Night]
        .into_iter()
        .any(|shift| schedule.persons_on(position, shift).iter().any(|p| p == person))
}

/// Re-derives W2 (<=24h/weekend) for `person` as if `shift` on `position`
/// were added on top of their current weekend assignments.
fn hours_after_swap_ok(schedule: &Schedule, person: &crate::domain::Person, position: CalendarPosition, shift: Shift) -> bool {
    let current_hours: u32 = WEEKEND_DAYS
        .iter()
        .map(|&day| {
            let pos = CalendarPosition::new(position.week, day);
            let mut h = 0;
            if schedule.persons_on(pos, Shift::Day).iter().any(|p| p == &person.name) {
                h += Shift::Day.hours();
            }
            if schedule.persons_on(pos, Shift::Night).iter().any(|p| p == &person.name) {
                h += Shift::Night.hours();
            }
            h
        })
        .sum();
    current_hours + shift.hours() <= 24
}

fn respects_w2(schedule: &Schedule, person: &str) -> bool {
    for week in 1..=schedule.weeks {
        let hours: u32 = WEEKEND_DAYS
            .iter()
            .map(|&day| {
                let pos = CalendarPosition::new(week, day);
                let mut h = 0;
                if schedule.persons_on(pos, Shift::Day).iter().any(|p| p == person) {
                    h += Shift::Day.hours();
                }
                if schedule.persons_on(pos, Shift::Night).iter().any(|p| p == person) {
                    h += Shift::Night.hours();
                }
                h
            })
            .sum();
        if hours > 24 {
            return false;
        }
    }
    true
}
