//! Multi-restart driver (C7, spec §4.7, §5).
//!
//! Runs `tries` independent (C4 -> C9 -> C5 -> C6) attempts with bounded
//! concurrency, each in its own CP model and RNG, and picks the
//! lowest-score survivor. No shared mutable state between attempts:
//! every attempt owns its schedule end to end and reports a typed
//! result through a join, following the teacher's "Process-pool
//! parallelism" note (spec §9) and the sibling `vehicle-routing`
//! quickstart's use of `rayon` for CPU-bound fan-out.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::config::SolveConfig;
use crate::domain::{EdoPlan, Schedule, StaffingPlan, TeamInput};
use crate::edo::{compute_edo_plan, resolve_edo_day_off};
use crate::error::{AttemptFailure, EngineError, EngineResult};
use crate::model::solve_attempt;
use crate::rebalance::rebalance;
use crate::scorer::score;
use crate::staffing::derive_staffing;
use crate::validator::{validate, Diagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Error,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub schedule: Option<Schedule>,
    pub diagnostics: Diagnostics,
    pub score: f64,
    pub seed_used: u64,
    pub status: SolveStatus,
}

struct AttemptOk {
    seed: u64,
    schedule: Schedule,
    diagnostics: Diagnostics,
    score: f64,
}

enum AttemptOutcome {
    Ok(AttemptOk),
    Err(AttemptFailure),
}

pub fn run(team: &TeamInput, config: &SolveConfig) -> EngineResult<SolveResult> {
    config.validate()?;

    let edo_plan = compute_edo_plan(team, config);
    let staffing_plan = derive_staffing(team, &edo_plan, config.weeks);
    let edo_resolution = resolve_edo_day_off(team, &staffing_plan, &edo_plan, config.weeks);

    info!(weeks = config.weeks, tries = config.tries, "staffing and EDO plans computed");

    let base_seed = config.resolved_base_seed();
    let degree = config.tries.min(rayon::current_num_threads().max(1) as u32) as usize;
    let pool = ThreadPoolBuilder::new()
        .num_threads(degree.max(1))
        .build()
        .map_err(|e| EngineError::SolverError {
            attempt: 0,
            seed: base_seed,
            detail: e.to_string(),
        })?;

    let seeds: Vec<u64> = (0..config.tries as u64).map(|i| base_seed.wrapping_add(i)).collect();
    let timeout = Duration::from_secs(config.time_limit_seconds + 10);

    let outcomes: Vec<AttemptOutcome> = pool.install(|| {
        seeds
            .iter()
            .enumerate()
            .map(|(i, &seed)| run_attempt(team, &staffing_plan, &edo_plan, &edo_resolution, config, i, seed, timeout))
            .collect()
    });

    aggregate(outcomes, base_seed)
}

fn run_attempt(
    team: &TeamInput,
    staffing_plan: &StaffingPlan,
    edo_plan: &EdoPlan,
    edo_resolution: &crate::edo::EdoResolution,
    config: &SolveConfig,
    attempt: usize,
    seed: u64,
    timeout: Duration,
) -> AttemptOutcome {
    debug!(attempt, seed, "attempt starting");

    let (tx, rx) = mpsc::channel();
    let team = team.clone();
    let staffing_plan = staffing_plan.clone();
    let edo_plan = edo_plan.clone();
    let edo_resolution = edo_resolution.clone();
    let rest_after_night = config.rest_after_night;
    let weeks = config.weeks;
    let post_rebalance_steps = config.post_rebalance_steps;
    let config_for_rebalance = config.clone();

    // selen's `Model::solve` is a single blocking call with no
    // demonstrated cancellation hook, so the deadline is enforced at
    // the thread-join boundary (recv_timeout) rather than by polling a
    // callback mid-solve; an attempt that overruns is reported as a
    // Timeout even though its worker thread is left to finish in the
    // background and its result discarded.
    let _ = thread::spawn(move || {
        let result = solve_attempt(
            &team,
            &staffing_plan,
            &edo_plan,
            &edo_resolution,
            weeks,
            rest_after_night,
            seed,
        )
        .map(|mut schedule| {
            if post_rebalance_steps > 0 {
                rebalance(&team, &mut schedule, &config_for_rebalance);
            }
            let diagnostics = validate(&team, &schedule, &config_for_rebalance);
            let s = score(&diagnostics);
            (schedule, diagnostics, s)
        });
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok((schedule, diagnostics, s))) => {
            debug!(attempt, seed, score = s, "attempt finished");
            AttemptOutcome::Ok(AttemptOk {
                seed,
                schedule,
                diagnostics,
                score: s,
            })
        }
        Ok(Err(error)) => AttemptOutcome::Err(AttemptFailure { seed, error }),
        Err(_) => {
            warn!(attempt, seed, "attempt timed out");
            AttemptOutcome::Err(AttemptFailure {
                seed,
                error: EngineError::Timeout { attempt, seed },
            })
        }
    }
}

fn aggregate(outcomes: Vec<AttemptOutcome>, base_seed: u64) -> EngineResult<SolveResult> {
    let mut successes: Vec<AttemptOk> = Vec::new();
    let mut failures: Vec<AttemptFailure> = Vec::new();

    for outcome in outcomes {
        match outcome {
            AttemptOutcome::Ok(ok) => successes.push(ok),
            AttemptOutcome::Err(failure) => failures.push(failure),
        }
    }

    // Per spec §7: the driver reports `error`/`infeasible`/`timeout`
    // only when *every* attempt failed, and never loses the per-attempt
    // cause -- logged here since `SolveResult::status` has no room for
    // a breakdown, only the aggregate classification.
    if successes.is_empty() {
        let all_infeasible = failures.iter().all(|f| matches!(f.error, EngineError::Infeasible { .. }));
        let all_timeout = failures.iter().all(|f| matches!(f.error, EngineError::Timeout { .. }));
        for f in &failures {
            warn!(seed = f.seed, error = %f.error, "attempt failed");
        }
        let status = if all_infeasible {
            SolveStatus::Infeasible
        } else if all_timeout {
            SolveStatus::Timeout
        } else {
            SolveStatus::Error
        };
        warn!(failed = failures.len(), status = ?status, "all attempts failed");
        return Ok(SolveResult {
            schedule: None,
            diagnostics: Diagnostics::default(),
            score: f64::INFINITY,
            seed_used: base_seed,
            status,
        });
    }

    successes.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then(a.diagnostics.vacant_slots.cmp(&b.diagnostics.vacant_slots))
            .then(a.seed.cmp(&b.seed))
    });
    let best = successes.into_iter().next().expect("checked non-empty above");

    let status = if best.diagnostics.vacant_slots == 0 && best.score == 0.0 {
        SolveStatus::Optimal
    } else {
        SolveStatus::Feasible
    };
    info!(seed = best.seed, score = best.score, status = ?status, "driver selected best attempt");

    Ok(SolveResult {
        schedule: Some(best.schedule),
        diagnostics: best.diagnostics,
        score: best.score,
        seed_used: best.seed,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Person;

    fn small_team(n: usize, workdays: u32) -> TeamInput {
        let persons = (0..n).map(|i| Person::new(format!("P{i}"), workdays)).collect();
        TeamInput::new(persons).unwrap()
    }

    #[test]
    fn rejects_invalid_config_before_spawning_attempts() {
        let team = small_team(4, 4);
        let mut config = SolveConfig::default();
        config.weeks = 0;
        assert!(run(&team, &config).is_err());
    }

    #[test]
    fn s1_minimal_feasible_team_solves() {
        // S1: 10 people, workdays=4, weeks=2, no EDO, rest-after-night on.
        let team = small_team(10, 4);
        let mut config = SolveConfig::default();
        config.weeks = 2;
        config.tries = 1;
        config.edo_enabled = false;
        let result = run(&team, &config).unwrap();
        assert!(matches!(result.status, SolveStatus::Optimal | SolveStatus::Feasible));
        assert_eq!(result.diagnostics.vacant_slots, 0);
        assert_eq!(result.diagnostics.duplicates_per_day, 0);
        let schedule = result.schedule.unwrap();
        for person in &team.persons {
            let nights = (1..=config.weeks)
                .flat_map(|w| crate::domain::WEEKDAYS.iter().map(move |d| (w, *d)))
                .filter(|(w, d)| {
                    schedule.shift_of(&person.name, crate::domain::CalendarPosition::new(*w, *d))
                        == crate::domain::Shift::Night
                })
                .count();
            assert!(nights <= 3, "{} had {nights} nights, expected <= 3", person.name);
        }
    }
}
