//! Synthetic team generators (kept from the teacher, re-targeted to the
//! weekday/weekend roster domain). Used by the CLI demo mode and by the
//! property/scenario test fixtures.

use chrono::Weekday;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::{Person, TeamInput, WEEKDAYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                team_count: 10,
                teams: vec!["Theatre A".to_string(), "Theatre B".to_string()],
                workdays_distribution: vec![(3, 1.0), (4, 3.0), (5, 1.0)],
                edo_eligible_rate: 0.4,
                contractor_rate: 0.1,
                no_evening_rate: 0.15,
                weekend_unavailable_rate: 0.1,
            },
            DemoData::Large => DemoDataParameters {
                team_count: 40,
                teams: vec![
                    "Theatre A".to_string(),
                    "Theatre B".to_string(),
                    "Theatre C".to_string(),
                    "Theatre D".to_string(),
                ],
                workdays_distribution: vec![(2, 1.0), (3, 2.0), (4, 4.0), (5, 2.0)],
                edo_eligible_rate: 0.3,
                contractor_rate: 0.2,
                no_evening_rate: 0.1,
                weekend_unavailable_rate: 0.2,
            },
        }
    }
}

struct DemoDataParameters {
    team_count: usize,
    teams: Vec<String>,
    workdays_distribution: Vec<(u32, f64)>,
    edo_eligible_rate: f64,
    contractor_rate: f64,
    no_evening_rate: f64,
    weekend_unavailable_rate: f64,
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Generates a deterministic demo team for the given size.
pub fn generate(demo: DemoData) -> TeamInput {
    generate_seeded(demo, 0)
}

/// Like [`generate`], but with an explicit seed (used by property tests
/// to sample many distinct teams deterministically, P4).
pub fn generate_seeded(demo: DemoData, seed: u64) -> TeamInput {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(seed);
    let name_permutations = generate_name_permutations(&mut rng);

    let mut persons = Vec::with_capacity(params.team_count);
    for i in 0..params.team_count {
        let name = name_permutations[i % name_permutations.len()].clone();
        let workdays_per_week = pick_weighted(&mut rng, &params.workdays_distribution);
        let edo_eligible = rng.gen_bool(params.edo_eligible_rate);
        let fixed_day = if edo_eligible && rng.gen_bool(0.5) {
            WEEKDAYS.choose(&mut rng).copied()
        } else {
            None
        };

        let mut person = Person::new(format!("{name}#{i}"), workdays_per_week)
            .with_no_evening(rng.gen_bool(params.no_evening_rate))
            .with_prefers_night(rng.gen_bool(0.2))
            .with_contractor(rng.gen_bool(params.contractor_rate))
            .with_available_weekends(!rng.gen_bool(params.weekend_unavailable_rate))
            .with_edo(edo_eligible, fixed_day);
        if let Some(team) = params.teams.choose(&mut rng) {
            person = person.with_team(team.clone());
        }
        persons.push(person);
    }

    TeamInput::new(persons).expect("demo generator always produces a valid roster")
}

/// Picks a weighted value from a `(value, weight)` distribution.
fn pick_weighted<T: Copy>(rng: &mut StdRng, distribution: &[(T, f64)]) -> T {
    let total_weight: f64 = distribution.iter().map(|(_, w)| w).sum();
    let mut choice = rng.gen::<f64>() * total_weight;
    for (value, weight) in distribution {
        if choice < *weight {
            return *value;
        }
        choice -= weight;
    }
    distribution.last().map(|(v, _)| *v).unwrap_or(distribution[0].0)
}

const FIRST_NAMES: &[&str] = &[
    "Amy", "Beth", "Carl", "Dan", "Elsa", "Flo", "Gus", "Hugo", "Ivy", "Jay", "Kim", "Leo",
];
const LAST_NAMES: &[&str] = &[
    "Cole", "Fox", "Green", "Jones", "King", "Li", "Poe", "Rye", "Smith", "Watt", "Young", "Zane",
];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{first} {last}"));
        }
    }
    names.shuffle(rng);
    names
}
