//! EDO (Earned Day Off) planner (C3, spec §4.3).
//!
//! Partitions EDO-eligible people into two halves per workdays-cohort;
//! halves alternate by week parity so each eligible person receives EDO
//! every other week (±1 over an odd-length horizon, spec P6).

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Weekday;

use crate::config::SolveConfig;
use crate::domain::{EdoPlan, Shift, StaffingPlan, TeamInput};
use tracing::debug;

pub fn compute_edo_plan(team: &TeamInput, config: &SolveConfig) -> EdoPlan {
    let mut plan = EdoPlan::default();

    for p in &team.persons {
        let fixed = p.edo_fixed_day.or(config.edo_fixed_day_global);
        plan.fixed_day_pref.insert(p.name.clone(), fixed);
    }

    if !config.edo_enabled {
        debug!("EDO disabled, no recipients computed");
        return plan;
    }

    // Group eligible people by workdays_per_week, names sorted for
    // determinism (spec P4).
    let mut cohorts: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for p in &team.persons {
        if p.edo_eligible {
            cohorts.entry(p.workdays_per_week).or_default().push(&p.name);
        }
    }
    for names in cohorts.values_mut() {
        names.sort_unstable();
    }

    let mut half_a: Vec<&str> = Vec::new();
    let mut half_b: Vec<&str> = Vec::new();
    for names in cohorts.values() {
        let split = names.len().div_ceil(2);
        half_a.extend_from_slice(&names[..split]);
        half_b.extend_from_slice(&names[split..]);
    }

    for week in 1..=config.weeks {
        let recipients: HashSet<String> = if week % 2 == 1 {
            half_a.iter().map(|s| s.to_string()).collect()
        } else {
            half_b.iter().map(|s| s.to_string()).collect()
        };
        plan.recipients.insert(week, recipients);
    }

    debug!(weeks = config.weeks, half_a = half_a.len(), half_b = half_b.len(), "EDO plan computed");
    plan
}

/// Why a recipient's day off is not hard-fixed at model-build time and
/// must instead be discovered after solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No fixed day was requested (spec H4 clause 3: the solver is only
    /// required to leave *some* day off).
    NoFixedDay,
    /// A fixed day was requested but granting it would starve that
    /// day's coverage; the manager needs to see this (spec C3 clause 2).
    FixedDayConflict,
}

/// The outcome of deciding, per EDO recipient and week, whether their
/// day off can be hard-fixed into the CP model or must be resolved
/// after solving.
#[derive(Debug, Clone, Default)]
pub struct EdoResolution {
    pub hard_off: HashMap<(u32, String), Weekday>,
    pub fallback: HashMap<(u32, String), FallbackReason>,
}

/// Decides, for every EDO recipient, whether their fixed day off can be
/// hard-constrained without starving that day's coverage. This is a
/// greedy headcount heuristic, not a full feasibility proof: it looks
/// at how many people the day still needs versus how many remain after
/// removing everyone already granted a hard day off, processing
/// recipients in a deterministic (sorted name) order per week.
pub fn resolve_edo_day_off(
    team: &TeamInput,
    staffing_plan: &StaffingPlan,
    edo_plan: &EdoPlan,
    weeks: u32,
) -> EdoResolution {
    let mut resolution = EdoResolution::default();
    let team_size = team.persons.len() as u32;
    let zero_workday_persons = team
        .persons
        .iter()
        .filter(|p| p.workdays_per_week == 0)
        .count() as u32;

    for week in 1..=weeks {
        let Some(recipients) = edo_plan.recipients.get(&week) else {
            continue;
        };
        let mut names: Vec<&String> = recipients.iter().collect();
        names.sort_unstable();

        let mut committed_off: HashMap<Weekday, u32> = HashMap::new();

        for name in names {
            match edo_plan.fixed_day_pref.get(name).copied().flatten() {
                None => {
                    resolution
                        .fallback
                        .insert((week, name.clone()), FallbackReason::NoFixedDay);
                }
                Some(day) => {
                    let required = 2 * (staffing_plan.count(week, day, Shift::Day)
                        + staffing_plan.count(week, day, Shift::Evening)
                        + staffing_plan.count(week, day, Shift::Night))
                        + staffing_plan.count(week, day, Shift::Admin);
                    let already_off = committed_off.get(&day).copied().unwrap_or(0);
                    // Coverage (H1) is slack-relaxed, so a day already short
                    // of `required` stays short whether or not this person
                    // is granted their day off: only deny the fixed day when
                    // *this* removal is what tips an otherwise-coverable day
                    // into deficit.
                    let feasible_without = team_size
                        .saturating_sub(zero_workday_persons)
                        .saturating_sub(already_off);
                    let tips_into_deficit =
                        feasible_without >= required && feasible_without - 1 < required;

                    if !tips_into_deficit {
                        resolution.hard_off.insert((week, name.clone()), day);
                        *committed_off.entry(day).or_insert(0) += 1;
                    } else {
                        resolution
                            .fallback
                            .insert((week, name.clone()), FallbackReason::FixedDayConflict);
                    }
                }
            }
        }
    }

    debug!(
        weeks,
        hard_off = resolution.hard_off.len(),
        fallback = resolution.fallback.len(),
        "EDO day-off resolution computed"
    );
    resolution
}
