//! `roster` CLI: wraps [`theatre_roster::solve`] over a CSV team file
//! and a handful of flags mirroring `SolveConfig` (spec §6.4).

use std::fs::File;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use theatre_roster::config::SolveConfig;
use theatre_roster::csv_io::{read_team_csv, write_schedule_csv};
use theatre_roster::{solve, SolveStatus};

/// Operating-theatre staff rotation engine.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the team roster CSV (§6.2).
    #[clap(short, long)]
    team: String,

    /// Path to write the resulting weekday schedule CSV.
    #[clap(short, long)]
    out: String,

    #[clap(long, default_value_t = 4)]
    weeks: u32,

    #[clap(long, default_value_t = 4)]
    tries: u32,

    #[clap(long, default_value_t = 0)]
    seed: u64,

    #[clap(long, default_value_t = 30)]
    time_limit_seconds: u64,

    #[clap(long, default_value_t = true)]
    rest_after_night: bool,

    #[clap(long, default_value_t = true)]
    edo_enabled: bool,

    #[clap(long, default_value_t = 200)]
    post_rebalance_steps: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let team_file = match File::open(&args.team) {
        Ok(f) => f,
        Err(e) => {
            error!(path = %args.team, error = %e, "failed to open team file");
            return ExitCode::from(5);
        }
    };
    let team = match read_team_csv(team_file) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "team csv ingestion failed");
            return ExitCode::from(5);
        }
    };

    let mut config = SolveConfig::default();
    config.weeks = args.weeks;
    config.tries = args.tries;
    config.seed = args.seed;
    config.time_limit_seconds = args.time_limit_seconds;
    config.rest_after_night = args.rest_after_night;
    config.edo_enabled = args.edo_enabled;
    config.post_rebalance_steps = args.post_rebalance_steps;

    info!(weeks = config.weeks, tries = config.tries, "starting solve");

    let result = match solve(&team, &config) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "input error");
            return ExitCode::from(5);
        }
    };

    match result.status {
        SolveStatus::Infeasible => {
            error!("no feasible schedule found");
            ExitCode::from(3)
        }
        SolveStatus::Timeout => {
            error!("solve timed out with no feasible result");
            ExitCode::from(4)
        }
        SolveStatus::Error => {
            error!("solver backend error");
            ExitCode::from(4)
        }
        SolveStatus::Optimal | SolveStatus::Feasible => {
            let schedule = result.schedule.expect("schedule present for optimal/feasible status");
            let out_file = match File::create(&args.out) {
                Ok(f) => f,
                Err(e) => {
                    error!(path = %args.out, error = %e, "failed to create output file");
                    return ExitCode::from(5);
                }
            };
            if let Err(e) = write_schedule_csv(&schedule, out_file) {
                error!(error = %e, "failed to write schedule csv");
                return ExitCode::from(5);
            }

            let has_soft_violations = result.diagnostics.vacant_slots > 0
                || result.diagnostics.weekly_misses > 0
                || result.diagnostics.horizon_misses > 0
                || result.diagnostics.rolling_48h_violations > 0
                || result.diagnostics.contractor_pairs > 0;
            if has_soft_violations {
                warn!(score = result.score, "schedule has outstanding soft-constraint violations");
                ExitCode::from(2)
            } else {
                info!(score = result.score, "schedule solved cleanly");
                ExitCode::SUCCESS
            }
        }
    }
}
