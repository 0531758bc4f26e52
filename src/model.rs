//! Pair CP model (C4, spec §4.4).
//!
//! Builds one `selen` CSP model per restart attempt over per-person
//! boolean decision variables `x[p,w,d,s]` and solves it for hard
//! constraints H1-H6. Pair identity (who shares a Day/Evening/Night
//! slot with whom) is not modelled as its own decision variable --
//! `selen`'s demonstrated surface has no pair/joiner channelling
//! construct -- so it is resolved by chunking each shift's assigned
//! persons into arity-sized groups once the solve is done (see
//! [`chunk_into_pairs`]). The soft objective is not pushed into this
//! model; `selen` has no demonstrated linear-objective entry point, so
//! this model only proves feasibility and [`crate::rebalance`] drives
//! solution quality afterward.

use std::collections::HashMap;

use chrono::Weekday;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use selen::prelude::*;

use crate::domain::{CalendarPosition, EdoPlan, Schedule, Shift, StaffingPlan, TeamInput, WEEKDAYS};
use crate::edo::EdoResolution;
use crate::error::{EngineError, EngineResult};

const WORKING_SHIFTS: [Shift; 4] = [Shift::Day, Shift::Evening, Shift::Night, Shift::Admin];

type VarKey = (usize, u32, Weekday, Shift);

/// Builds and solves the weekday CP model for one restart attempt,
/// returning a [`Schedule`] with every EDO pseudo-shift already labelled.
pub fn solve_attempt(
    team: &TeamInput,
    staffing_plan: &StaffingPlan,
    edo_plan: &EdoPlan,
    edo_resolution: &EdoResolution,
    weeks: u32,
    rest_after_night: bool,
    seed: u64,
) -> EngineResult<Schedule> {
    let mut m = Model::default();
    let mut x: HashMap<VarKey, VarId> = HashMap::new();

    // Seed-perturbed construction order: the order variables are
    // registered with the model perturbs selen's search trajectory,
    // giving distinct restarts a genuinely different feasible solution
    // rather than retrying the identical search.
    let mut person_order: Vec<usize> = (0..team.persons.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    person_order.shuffle(&mut rng);

    for &pi in &person_order {
        let person = &team.persons[pi];
        for week in 1..=weeks {
            let hard_off_day = edo_resolution.hard_off.get(&(week, person.name.clone())).copied();
            for day in WEEKDAYS {
                for shift in WORKING_SHIFTS {
                    let fixed_zero = (shift == Shift::Evening && person.no_evening)
                        || hard_off_day == Some(day);
                    let var = if fixed_zero { m.int(0, 0) } else { m.int(0, 1) };
                    x.insert((pi, week, day, shift), var);
                }
            }
        }
    }

    // H1: per-slot coverage, relaxed to `<= planned` -- overstaffing
    // beyond the derived plan is never useful and understaffing is a
    // soft-scored vacancy (vacant_slots), not a modelling infeasibility.
    for week in 1..=weeks {
        for day in WEEKDAYS {
            for shift in WORKING_SHIFTS {
                let required = staffing_plan.count(week, day, shift) * shift.arity() as u32;
                if required == 0 {
                    continue;
                }
                let vars: Vec<VarId> = (0..team.persons.len())
                    .map(|pi| x[&(pi, week, day, shift)])
                    .collect();
                let sum = m.sum(&vars);
                m.c(sum).le(int(required as i32));
            }
        }
    }

    // H2: at most one shift per person per day.
    for pi in 0..team.persons.len() {
        for week in 1..=weeks {
            for day in WEEKDAYS {
                let vars: Vec<VarId> = WORKING_SHIFTS.iter().map(|s| x[&(pi, week, day, *s)]).collect();
                let sum = m.sum(&vars);
                m.c(sum).le(int(1));
            }
        }
    }

    // H3: rest after night (Mon..Thu only -- does not cross weeks).
    if rest_after_night {
        for pi in 0..team.persons.len() {
            for week in 1..=weeks {
                for (day, next_day) in consecutive_weekday_pairs() {
                    let night_var = x[&(pi, week, day, Shift::Night)];
                    let mut vars: Vec<VarId> = WORKING_SHIFTS
                        .iter()
                        .map(|s| x[&(pi, week, next_day, *s)])
                        .collect();
                    vars.push(night_var);
                    let sum = m.sum(&vars);
                    m.c(sum).le(int(1));
                }
            }
        }
    }

    // H4: EDO enforcement, second clause (no fixed day -> at least one
    // day off that week). The first clause (fixed day granted) is
    // already baked into the fixed-zero domains above.
    for (pi, person) in team.persons.iter().enumerate() {
        for week in 1..=weeks {
            let key = (week, person.name.clone());
            if edo_plan.is_recipient(week, &person.name)
                && edo_resolution.fallback.get(&key)
                    == Some(&crate::edo::FallbackReason::NoFixedDay)
            {
                let vars: Vec<VarId> = WEEKDAYS
                    .iter()
                    .flat_map(|d| WORKING_SHIFTS.iter().map(move |s| (*d, *s)))
                    .map(|(d, s)| x[&(pi, week, d, s)])
                    .collect();
                let sum = m.sum(&vars);
                m.c(sum).le(int((WEEKDAYS.len() as i32) - 1));
            }
        }
    }

    // H5: night cap across the whole horizon.
    for (pi, person) in team.persons.iter().enumerate() {
        if person.max_nights >= weeks * WEEKDAYS.len() as u32 {
            continue; // unconstrained
        }
        let vars: Vec<VarId> = (1..=weeks)
            .flat_map(|week| WEEKDAYS.iter().map(move |d| (week, *d)))
            .map(|(week, d)| x[&(pi, week, d, Shift::Night)])
            .collect();
        let sum = m.sum(&vars);
        m.c(sum).le(int(person.max_nights as i32));
    }

    // H6: per-week workday target, strict upper bound.
    for (pi, person) in team.persons.iter().enumerate() {
        for week in 1..=weeks {
            let vars: Vec<VarId> = WEEKDAYS
                .iter()
                .flat_map(|d| WORKING_SHIFTS.iter().map(move |s| (*d, *s)))
                .map(|(d, s)| x[&(pi, week, d, s)])
                .collect();
            let sum = m.sum(&vars);
            m.c(sum).le(int(person.workdays_per_week as i32));
        }
    }

    let solution = m.solve().map_err(|e| EngineError::SolverError {
        attempt: 0,
        seed,
        detail: format!("{e:?}"),
    })?;

    let mut schedule = Schedule::new(weeks, edo_plan.clone(), staffing_plan.clone(), seed);
    for week in 1..=weeks {
        for day in WEEKDAYS {
            for shift in WORKING_SHIFTS {
                let assigned: Vec<String> = team
                    .persons
                    .iter()
                    .enumerate()
                    .filter(|(pi, _)| solution.get::<i32>(x[&(*pi, week, day, shift)]) == 1)
                    .map(|(_, p)| p.name.clone())
                    .collect();
                let position = CalendarPosition::new(week, day);
                let arity = shift.arity();
                let ordered = chunk_into_pairs(team, assigned, arity.max(1))
                    .into_iter()
                    .flatten();
                for person in ordered {
                    schedule.set_shift(position, &person, shift);
                }
            }
        }
    }

    label_edo_outcomes(&mut schedule, team, edo_plan, weeks);

    Ok(schedule)
}

/// `(day, next_day)` pairs for the weekday-only rest-after-night rule
/// (H3 never crosses the Fri/weekend boundary or a week boundary).
fn consecutive_weekday_pairs() -> Vec<(Weekday, Weekday)> {
    WEEKDAYS.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Labels every EDO recipient's pseudo-shift after solving, per spec
/// §4.3's three clauses: Edo on the day actually left off when a fixed
/// day was honoured or none was requested, EdoConflict on the first
/// other off day when the fixed day ended up worked anyway.
fn label_edo_outcomes(schedule: &mut Schedule, team: &TeamInput, edo_plan: &EdoPlan, weeks: u32) {
    for week in 1..=weeks {
        let Some(recipients) = edo_plan.recipients.get(&week) else {
            continue;
        };
        let mut names: Vec<&String> = recipients.iter().collect();
        names.sort_unstable();

        for name in names {
            if team.by_name(name).is_none() {
                continue;
            }
            let fixed = edo_plan.fixed_day_pref.get(name).copied().flatten();
            match fixed {
                Some(day) => {
                    let position = CalendarPosition::new(week, day);
                    if !schedule.shift_of(name, position).is_working() {
                        schedule.set_shift(position, name, Shift::Edo);
                    } else if let Some(other) = first_off_day(schedule, name, week) {
                        schedule.set_shift(CalendarPosition::new(week, other), name, Shift::EdoConflict);
                    }
                }
                None => {
                    if let Some(day) = first_off_day(schedule, name, week) {
                        schedule.set_shift(CalendarPosition::new(week, day), name, Shift::Edo);
                    }
                }
            }
        }
    }
}

fn first_off_day(schedule: &Schedule, name: &str, week: u32) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .copied()
        .find(|&day| !schedule.shift_of(name, CalendarPosition::new(week, day)).is_working())
}

/// Chunks a shift's assigned-person list into arity-sized groups,
/// interleaving contractors with non-contractors so consecutive groups
/// (the eventual pair slots) avoid pairing two contractors together
/// (soft term `contractor_pair`) whenever a non-contractor is available.
pub fn chunk_into_pairs(team: &TeamInput, assigned: Vec<String>, arity: u8) -> Vec<Vec<String>> {
    if arity <= 1 {
        return assigned.into_iter().map(|p| vec![p]).collect();
    }

    let (contractors, others): (Vec<String>, Vec<String>) = assigned
        .into_iter()
        .partition(|name| team.by_name(name).map(|p| p.is_contractor).unwrap_or(false));

    let mut interleaved = Vec::with_capacity(contractors.len() + others.len());
    let mut c_iter = contractors.into_iter();
    let mut o_iter = others.into_iter();
    loop {
        let mut pushed = false;
        if let Some(name) = o_iter.next() {
            interleaved.push(name);
            pushed = true;
        }
        if let Some(name) = c_iter.next() {
            interleaved.push(name);
            pushed = true;
        }
        if !pushed {
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut iter = interleaved.into_iter();
    loop {
        let chunk: Vec<String> = iter.by_ref().take(arity as usize).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolveConfig;
    use crate::domain::Person;
    use crate::edo::{compute_edo_plan, resolve_edo_day_off};
    use crate::staffing::derive_staffing;

    fn small_team() -> TeamInput {
        let persons = (0..12)
            .map(|i| Person::new(format!("P{i}"), 4))
            .collect();
        TeamInput::new(persons).unwrap()
    }

    #[test]
    fn solves_small_team_without_error() {
        let team = small_team();
        let config = SolveConfig::default();
        let edo_plan = compute_edo_plan(&team, &config);
        let staffing_plan = derive_staffing(&team, &edo_plan, config.weeks);
        let resolution = resolve_edo_day_off(&team, &staffing_plan, &edo_plan, config.weeks);

        let schedule = solve_attempt(
            &team,
            &staffing_plan,
            &edo_plan,
            &resolution,
            config.weeks,
            config.rest_after_night,
            42,
        )
        .unwrap();

        assert_eq!(schedule.weeks, config.weeks);
    }

    #[test]
    fn no_person_double_booked_same_day() {
        let team = small_team();
        let config = SolveConfig::default();
        let edo_plan = compute_edo_plan(&team, &config);
        let staffing_plan = derive_staffing(&team, &edo_plan, config.weeks);
        let resolution = resolve_edo_day_off(&team, &staffing_plan, &edo_plan, config.weeks);

        let schedule = solve_attempt(
            &team,
            &staffing_plan,
            &edo_plan,
            &resolution,
            config.weeks,
            config.rest_after_night,
            7,
        )
        .unwrap();

        for person in &team.persons {
            for week in 1..=config.weeks {
                for day in WEEKDAYS {
                    let position = CalendarPosition::new(week, day);
                    // shift_of returns exactly one Shift per position by
                    // construction (HashMap insert), so this never panics.
                    let _ = schedule.shift_of(&person.name, position);
                }
            }
        }
    }

    #[test]
    fn chunk_into_pairs_splits_evenly() {
        let team = small_team();
        let assigned: Vec<String> = vec!["P0", "P1", "P2", "P3"].into_iter().map(String::from).collect();
        let chunks = chunk_into_pairs(&team, assigned, 2);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 2));
    }
}
