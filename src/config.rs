//! Solve configuration (spec §6.1).

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FairnessCohorts {
    None,
    ByWorkdays,
    ByTeam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FairnessScope {
    Off,
    Global,
    Cohort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NightFairnessMode {
    Count,
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterTeamNightShare {
    Off,
    Proportional,
    Global,
}

/// Mirrors the option table in spec §6.1 exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveConfig {
    pub weeks: u32,
    pub tries: u32,
    pub seed: u64,
    pub time_limit_seconds: u64,
    pub rest_after_night: bool,
    pub edo_enabled: bool,
    pub edo_fixed_day_global: Option<Weekday>,
    pub fairness_cohorts: FairnessCohorts,
    pub night_fairness: FairnessScope,
    pub night_fairness_mode: NightFairnessMode,
    pub evening_fairness: FairnessScope,
    pub inter_team_night_share: InterTeamNightShare,
    pub max_nights_sequence: u32,
    pub post_rebalance_steps: u32,
    pub impose_targets: bool,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            weeks: 4,
            tries: 4,
            seed: 0,
            time_limit_seconds: 30,
            rest_after_night: true,
            edo_enabled: true,
            edo_fixed_day_global: None,
            fairness_cohorts: FairnessCohorts::None,
            night_fairness: FairnessScope::Global,
            night_fairness_mode: NightFairnessMode::Count,
            evening_fairness: FairnessScope::Global,
            inter_team_night_share: InterTeamNightShare::Proportional,
            max_nights_sequence: u32::MAX,
            post_rebalance_steps: 200,
            impose_targets: false,
        }
    }
}

impl SolveConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(1..=24).contains(&self.weeks) {
            return Err(EngineError::input(format!(
                "weeks={} out of range 1..=24",
                self.weeks
            )));
        }
        if !(1..=50).contains(&self.tries) {
            return Err(EngineError::input(format!(
                "tries={} out of range 1..=50",
                self.tries
            )));
        }
        if self.time_limit_seconds == 0 {
            return Err(EngineError::input("time_limit_seconds must be > 0"));
        }
        Ok(())
    }

    /// Resolves `seed ∈ u64 | 0 ⇒ random` (spec §6.1): a non-zero seed is
    /// used as-is, `0` draws fresh entropy so two callers who both pass
    /// `seed: 0` get different runs, matching the documented contract.
    /// Callers that need the resolved value more than once (e.g. to tag a
    /// result after the fact) must call this once and reuse it -- calling
    /// it twice for a `seed: 0` config would otherwise disagree with
    /// itself.
    pub fn resolved_base_seed(&self) -> u64 {
        if self.seed == 0 {
            rand::random()
        } else {
            self.seed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SolveConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_weeks_out_of_range() {
        let mut c = SolveConfig::default();
        c.weeks = 25;
        assert!(c.validate().is_err());
        c.weeks = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_tries_out_of_range() {
        let mut c = SolveConfig::default();
        c.tries = 51;
        assert!(c.validate().is_err());
    }
}
