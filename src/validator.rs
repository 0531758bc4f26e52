//! Hard-invariant re-check + diagnostics (C5, spec §4.5).
//!
//! Never mutates the schedule. The CP model (H1-H6) already prevents
//! most violations by construction, but the validator is the single
//! source of truth consumed by both the driver's tie-break and the
//! post-rebalancer's "did this swap make things worse" check, so it
//! re-derives everything from the schedule rather than trusting the
//! solver's bookkeeping.

use std::collections::{BTreeMap, HashMap};

use chrono::Weekday;

use crate::config::{FairnessCohorts, FairnessScope, InterTeamNightShare, NightFairnessMode, SolveConfig};
use crate::domain::{CalendarPosition, Person, Schedule, Shift, TeamInput, WEEKDAYS};
use crate::rolling::{build_hour_timeline, max_consecutive_true, rolling_48h};

/// The reference group a fairness spread is computed over (glossary:
/// "Cohort"). Field names on [`Diagnostics`] say "stddev" (spec §4.5's
/// own wording) but the values are the max-min *spread* defined by the
/// glossary and used by the CP model's soft terms (§4.4) -- kept
/// faithful to both by computing spread under the spec's stddev names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CohortKey {
    All,
    Workdays(u32),
    Team(Option<String>),
}

pub fn cohort_key(person: &Person, cohorts: FairnessCohorts) -> CohortKey {
    match cohorts {
        FairnessCohorts::None => CohortKey::All,
        FairnessCohorts::ByWorkdays => CohortKey::Workdays(person.workdays_per_week),
        FairnessCohorts::ByTeam => CohortKey::Team(person.team.clone()),
    }
}

/// Resolves a spread term's grouping from its own `night_fairness` /
/// `evening_fairness` scope (§6.1): `Off` means the term is skipped
/// entirely (`None`), `Global` collapses everyone into one group
/// regardless of `fairness_cohorts`, `Cohort` defers to it.
pub fn scoped_cohort_key(person: &Person, scope: FairnessScope, cohorts: FairnessCohorts) -> Option<CohortKey> {
    match scope {
        FairnessScope::Off => None,
        FairnessScope::Global => Some(CohortKey::All),
        FairnessScope::Cohort => Some(cohort_key(person, cohorts)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub vacant_slots: u32,
    pub duplicates_per_day: u32,
    pub night_then_work: u32,
    pub evening_to_day: u32,
    pub weekly_misses: u32,
    pub horizon_misses: u32,
    pub rolling_48h_violations: u32,
    pub contractor_pairs: u32,
    pub per_cohort_night_stddev: BTreeMap<CohortKey, f64>,
    pub per_cohort_evening_stddev: BTreeMap<CohortKey, f64>,
    pub unfilled: Vec<(u32, Weekday, Shift, u32)>,
    /// §6.1's "extra fairness term": spread of per-team night share, off
    /// by default unless `inter_team_night_share` is enabled.
    pub inter_team_night_spread: f64,
    /// Nights beyond `max_nights_sequence`'s longest permitted run of
    /// consecutive nights, summed per person (§6.1).
    pub night_sequence_excess: u32,
}

impl Diagnostics {
    /// Marked invalid only by the two violations a feasible CP solve can
    /// never actually produce (duplicates, night-then-work); everything
    /// else is a soft, scored penalty (spec §4.5).
    pub fn is_valid(&self) -> bool {
        self.duplicates_per_day == 0 && self.night_then_work == 0
    }
}

pub fn validate(team: &TeamInput, schedule: &Schedule, config: &SolveConfig) -> Diagnostics {
    let mut diag = Diagnostics::default();

    check_coverage(schedule, &mut diag);
    check_duplicates(schedule, &mut diag);
    check_rest_after_night(team, schedule, config, &mut diag);
    check_evening_to_day(team, schedule, &mut diag);
    check_workday_targets(team, schedule, &mut diag);
    check_rolling_48h(team, schedule, &mut diag);
    check_contractor_pairs(team, schedule, &mut diag);
    check_fairness_spread(team, schedule, config, &mut diag);
    check_inter_team_night_share(team, schedule, config, &mut diag);
    check_night_sequence(team, schedule, config, &mut diag);

    diag
}

fn check_coverage(schedule: &Schedule, diag: &mut Diagnostics) {
    for week in 1..=schedule.weeks {
        for day in WEEKDAYS {
            let position = CalendarPosition::new(week, day);
            for shift in Shift::PAIR_KINDS.into_iter().chain([Shift::Admin]) {
                let required = schedule.staffing_plan.count(week, day, shift) * shift.arity() as u32;
                let assigned = schedule.persons_on(position, shift).len() as u32;
                if assigned < required {
                    diag.vacant_slots += required - assigned;
                    for idx in assigned..required {
                        diag.unfilled.push((week, day, shift, idx));
                    }
                }
            }
        }
    }
}

fn check_duplicates(schedule: &Schedule, diag: &mut Diagnostics) {
    for week in 1..=schedule.weeks {
        for day in WEEKDAYS {
            let position = CalendarPosition::new(week, day);
            let mut counts: HashMap<&str, u32> = HashMap::new();
            if let Some(by_shift) = schedule.by_position.get(&position) {
                for persons in by_shift.values() {
                    for name in persons {
                        *counts.entry(name.as_str()).or_insert(0) += 1;
                    }
                }
            }
            for count in counts.into_values() {
                if count > 1 {
                    diag.duplicates_per_day += count - 1;
                }
            }
        }
    }
}

fn check_rest_after_night(team: &TeamInput, schedule: &Schedule, config: &SolveConfig, diag: &mut Diagnostics) {
    if !config.rest_after_night {
        return;
    }
    for person in &team.persons {
        for week in 1..=schedule.weeks {
            for pair in WEEKDAYS.windows(2) {
                let (day, next_day) = (pair[0], pair[1]);
                let night = schedule.shift_of(&person.name, CalendarPosition::new(week, day)) == Shift::Night;
                let worked_next = schedule
                    .shift_of(&person.name, CalendarPosition::new(week, next_day))
                    .is_working();
                if night && worked_next {
                    diag.night_then_work += 1;
                }
            }
        }
    }
}

fn check_evening_to_day(team: &TeamInput, schedule: &Schedule, diag: &mut Diagnostics) {
    for person in &team.persons {
        for week in 1..=schedule.weeks {
            for pair in WEEKDAYS.windows(2) {
                let (day, next_day) = (pair[0], pair[1]);
                let evening = schedule.shift_of(&person.name, CalendarPosition::new(week, day)) == Shift::Evening;
                let day_next = schedule.shift_of(&person.name, CalendarPosition::new(week, next_day)) == Shift::Day;
                if evening && day_next {
                    diag.evening_to_day += 1;
                }
            }
        }
    }
}

/// Maps I7 (per-week workday target) to `weekly_misses` and I6 (horizon
/// night cap) to `horizon_misses` -- the two spec-named fields that have
/// no other obvious referent among I1-I9.
fn check_workday_targets(team: &TeamInput, schedule: &Schedule, diag: &mut Diagnostics) {
    for person in &team.persons {
        let mut total_nights = 0u32;
        for week in 1..=schedule.weeks {
            let mut actual = 0u32;
            for day in WEEKDAYS {
                let shift = schedule.shift_of(&person.name, CalendarPosition::new(week, day));
                if shift.is_working() {
                    actual += 1;
                }
                if shift == Shift::Night {
                    total_nights += 1;
                }
            }
            let granted_edo_this_week = schedule.edo_plan.is_recipient(week, &person.name);
            let target = person
                .workdays_per_week
                .saturating_sub(if granted_edo_this_week { 1 } else { 0 });
            if actual != target {
                diag.weekly_misses += actual.abs_diff(target);
            }
        }
        if total_nights > person.max_nights {
            diag.horizon_misses += total_nights - person.max_nights;
        }
    }
}

fn check_rolling_48h(team: &TeamInput, schedule: &Schedule, diag: &mut Diagnostics) {
    for person in &team.persons {
        let timeline = build_hour_timeline(schedule.weeks, |week, day| {
            schedule.shift_of(&person.name, CalendarPosition::new(week, day)).hours()
        });
        let result = rolling_48h(&timeline);
        diag.rolling_48h_violations += result.violating_windows;
    }
}

fn check_contractor_pairs(team: &TeamInput, schedule: &Schedule, diag: &mut Diagnostics) {
    for positions in schedule.by_position.values() {
        for (shift, persons) in positions {
            if shift.arity() != 2 {
                continue;
            }
            for chunk in persons.chunks(2) {
                if let [a, b] = chunk {
                    let both_contractors = team.by_name(a).is_some_and(|p| p.is_contractor)
                        && team.by_name(b).is_some_and(|p| p.is_contractor);
                    if both_contractors {
                        diag.contractor_pairs += 1;
                    }
                }
            }
        }
    }
}

fn person_night_count(schedule: &Schedule, person: &Person) -> u32 {
    (1..=schedule.weeks)
        .flat_map(|week| WEEKDAYS.iter().map(move |d| CalendarPosition::new(week, *d)))
        .filter(|pos| schedule.shift_of(&person.name, *pos) == Shift::Night)
        .count() as u32
}

fn person_evening_count(schedule: &Schedule, person: &Person) -> u32 {
    (1..=schedule.weeks)
        .flat_map(|week| WEEKDAYS.iter().map(move |d| CalendarPosition::new(week, *d)))
        .filter(|pos| schedule.shift_of(&person.name, *pos) == Shift::Evening)
        .count() as u32
}

/// `night_spread`/`evening_spread` (§4.4), each gated by its own scope
/// (`night_fairness`/`evening_fairness`) and, for nights only, its mode
/// (`night_fairness_mode`): `Count` groups raw night counts per cohort,
/// `Rate` groups `nights_p / workday_target_p` scaled to integer tenths
/// (§4.4's "Proportional night fairness" note) instead.
fn check_fairness_spread(team: &TeamInput, schedule: &Schedule, config: &SolveConfig, diag: &mut Diagnostics) {
    if config.night_fairness != FairnessScope::Off {
        let mut groups: HashMap<CohortKey, Vec<f64>> = HashMap::new();
        for person in &team.persons {
            let Some(key) = scoped_cohort_key(person, config.night_fairness, config.fairness_cohorts) else {
                continue;
            };
            let nights = person_night_count(schedule, person) as f64;
            let value = match config.night_fairness_mode {
                NightFairnessMode::Count => nights,
                NightFairnessMode::Rate => {
                    let target = (person.workdays_per_week * schedule.weeks) as f64;
                    if target == 0.0 {
                        0.0
                    } else {
                        (nights / target * 10.0).round()
                    }
                }
            };
            groups.entry(key).or_default().push(value);
        }
        for (key, values) in groups {
            diag.per_cohort_night_stddev.insert(key, spread_f64(&values));
        }
    }

    if config.evening_fairness != FairnessScope::Off {
        let mut groups: HashMap<CohortKey, Vec<f64>> = HashMap::new();
        for person in &team.persons {
            let Some(key) = scoped_cohort_key(person, config.evening_fairness, config.fairness_cohorts) else {
                continue;
            };
            groups.entry(key).or_default().push(person_evening_count(schedule, person) as f64);
        }
        for (key, values) in groups {
            diag.per_cohort_evening_stddev.insert(key, spread_f64(&values));
        }
    }
}

/// §6.1's "extra fairness term": spread of each team's night share.
/// `Proportional` normalises by the team's total workdays, `Global` uses
/// raw team night totals, `Off` leaves the term at its default zero.
fn check_inter_team_night_share(team: &TeamInput, schedule: &Schedule, config: &SolveConfig, diag: &mut Diagnostics) {
    if config.inter_team_night_share == InterTeamNightShare::Off {
        return;
    }

    let mut team_nights: HashMap<Option<String>, u32> = HashMap::new();
    let mut team_workdays: HashMap<Option<String>, u32> = HashMap::new();
    for person in &team.persons {
        *team_nights.entry(person.team.clone()).or_insert(0) += person_night_count(schedule, person);
        *team_workdays.entry(person.team.clone()).or_insert(0) += person.workdays_per_week * schedule.weeks;
    }

    let values: Vec<f64> = match config.inter_team_night_share {
        InterTeamNightShare::Off => unreachable!("returned above"),
        InterTeamNightShare::Global => team_nights.values().map(|&n| n as f64).collect(),
        InterTeamNightShare::Proportional => team_nights
            .iter()
            .map(|(key, &n)| {
                let workdays = team_workdays.get(key).copied().unwrap_or(0);
                if workdays == 0 {
                    0.0
                } else {
                    n as f64 / workdays as f64
                }
            })
            .collect(),
    };
    diag.inter_team_night_spread = spread_f64(&values);
}

/// `max_nights_sequence` (§6.1): the longest run of consecutive nights a
/// person worked, reusing the rolling-window module's flat timeline and
/// run-length helper (same resolution as the §9(a) open question).
fn check_night_sequence(team: &TeamInput, schedule: &Schedule, config: &SolveConfig, diag: &mut Diagnostics) {
    if config.max_nights_sequence == u32::MAX {
        return;
    }
    for person in &team.persons {
        let timeline = build_hour_timeline(schedule.weeks, |week, day| {
            u32::from(schedule.shift_of(&person.name, CalendarPosition::new(week, day)) == Shift::Night)
        });
        let bool_timeline: Vec<bool> = timeline.iter().map(|&n| n == 1).collect();
        let longest = max_consecutive_true(&bool_timeline);
        if longest > config.max_nights_sequence {
            diag.night_sequence_excess += longest - config.max_nights_sequence;
        }
    }
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
