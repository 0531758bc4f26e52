//! Domain model for the operating-theatre staff rotation engine.
//!
//! Person, Shift, Day and Calendar types are constructed once at ingest
//! and never mutated afterwards (spec §3, Lifecycles).

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, EngineResult};

/// The five weekday labels plus the two EDO-derived pseudo-shifts.
///
/// Day/Evening/Night consume one pair-slot (arity 2); Admin consumes a
/// single slot (arity 1); Off/Edo/EdoConflict consume none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shift {
    Day,
    Evening,
    Night,
    Admin,
    Off,
    Edo,
    EdoConflict,
}

impl Shift {
    pub fn hours(self) -> u32 {
        match self {
            Shift::Day | Shift::Evening => 10,
            Shift::Night => 12,
            Shift::Admin => 8,
            Shift::Off | Shift::Edo | Shift::EdoConflict => 0,
        }
    }

    /// Shifts that occupy a coverage slot and count toward a person's
    /// weekly workday total.
    pub fn is_working(self) -> bool {
        matches!(self, Shift::Day | Shift::Evening | Shift::Night | Shift::Admin)
    }

    pub fn arity(self) -> u8 {
        match self {
            Shift::Day | Shift::Evening | Shift::Night => 2,
            Shift::Admin => 1,
            Shift::Off | Shift::Edo | Shift::EdoConflict => 0,
        }
    }

    /// The weekday shifts that consume a pair-slot, in staffing-deriver order.
    pub const PAIR_KINDS: [Shift; 3] = [Shift::Day, Shift::Evening, Shift::Night];

    /// Boundary code per spec §6.3.
    pub fn code(self) -> &'static str {
        match self {
            Shift::Day => "J",
            Shift::Evening => "S",
            Shift::Night => "N",
            Shift::Admin => "A",
            Shift::Off => "OFF",
            Shift::Edo => "EDO",
            Shift::EdoConflict => "EDO*",
        }
    }

    pub fn from_code(code: &str) -> EngineResult<Self> {
        match code {
            "J" => Ok(Shift::Day),
            "S" => Ok(Shift::Evening),
            "N" => Ok(Shift::Night),
            "A" => Ok(Shift::Admin),
            "OFF" => Ok(Shift::Off),
            "EDO" => Ok(Shift::Edo),
            "EDO*" => Ok(Shift::EdoConflict),
            other => Err(EngineError::input(format!("unknown shift code '{other}'"))),
        }
    }
}

/// Parses a day token accepting both the French weekday tokens used on
/// the CSV boundary (§6.3) and the English `Mon..Sun` tokens accepted
/// for interoperability.
pub fn day_from_token(token: &str) -> EngineResult<Weekday> {
    match token {
        "Lun" | "Mon" => Ok(Weekday::Mon),
        "Mar" | "Tue" => Ok(Weekday::Tue),
        "Mer" | "Wed" => Ok(Weekday::Wed),
        "Jeu" | "Thu" => Ok(Weekday::Thu),
        "Ven" | "Fri" => Ok(Weekday::Fri),
        "Sam" | "Sat" => Ok(Weekday::Sat),
        "Dim" | "Sun" => Ok(Weekday::Sun),
        other => Err(EngineError::input(format!("unknown day token '{other}'"))),
    }
}

pub fn day_to_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Lun",
        Weekday::Tue => "Mar",
        Weekday::Wed => "Mer",
        Weekday::Thu => "Jeu",
        Weekday::Fri => "Ven",
        Weekday::Sat => "Sam",
        Weekday::Sun => "Dim",
    }
}

/// The five weekdays the weekday planner schedules, Monday-first.
pub const WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

pub const WEEKEND_DAYS: [Weekday; 2] = [Weekday::Sat, Weekday::Sun];

/// A member of the operating-theatre team. Immutable after ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub workdays_per_week: u32,
    #[serde(default)]
    pub prefers_night: bool,
    #[serde(default)]
    pub no_evening: bool,
    #[serde(default = "default_max_nights")]
    pub max_nights: u32,
    #[serde(default)]
    pub edo_eligible: bool,
    #[serde(default)]
    pub edo_fixed_day: Option<Weekday>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub is_contractor: bool,
    #[serde(default = "default_true")]
    pub available_weekends: bool,
}

fn default_max_nights() -> u32 {
    u32::MAX
}

fn default_true() -> bool {
    true
}

impl Person {
    pub fn new(name: impl Into<String>, workdays_per_week: u32) -> Self {
        Self {
            name: name.into(),
            workdays_per_week,
            prefers_night: false,
            no_evening: false,
            max_nights: u32::MAX,
            edo_eligible: false,
            edo_fixed_day: None,
            team: None,
            is_contractor: false,
            available_weekends: true,
        }
    }

    pub fn with_prefers_night(mut self, v: bool) -> Self {
        self.prefers_night = v;
        self
    }

    pub fn with_no_evening(mut self, v: bool) -> Self {
        self.no_evening = v;
        self
    }

    pub fn with_max_nights(mut self, v: u32) -> Self {
        self.max_nights = v;
        self
    }

    pub fn with_edo(mut self, eligible: bool, fixed_day: Option<Weekday>) -> Self {
        self.edo_eligible = eligible;
        self.edo_fixed_day = fixed_day;
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_contractor(mut self, v: bool) -> Self {
        self.is_contractor = v;
        self
    }

    pub fn with_available_weekends(mut self, v: bool) -> Self {
        self.available_weekends = v;
        self
    }
}

/// A validated, immutable team roster. The only way to obtain one is
/// through [`TeamInput::new`], which rejects malformed input loudly
/// (spec §6.2 — no silent fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInput {
    pub persons: Vec<Person>,
}

impl TeamInput {
    pub fn new(persons: Vec<Person>) -> EngineResult<Self> {
        if persons.is_empty() {
            return Err(EngineError::input("team must not be empty"));
        }

        let mut seen = HashSet::with_capacity(persons.len());
        for p in &persons {
            if p.name.trim().is_empty() {
                return Err(EngineError::input("person name must not be empty"));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(EngineError::input(format!(
                    "duplicate person name '{}'",
                    p.name
                )));
            }
            if p.workdays_per_week > 5 {
                return Err(EngineError::input(format!(
                    "person '{}' has workdays_per_week={} out of range 0..=5",
                    p.name, p.workdays_per_week
                )));
            }
            if let Some(d) = p.edo_fixed_day {
                if !WEEKDAYS.contains(&d) {
                    return Err(EngineError::input(format!(
                        "person '{}' has edo_fixed_day={:?} which is not a weekday",
                        p.name, d
                    )));
                }
            }
        }

        Ok(Self { persons })
    }

    pub fn by_name(&self, name: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}

/// A `(week, day)` pair identifying one calendar cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarPosition {
    pub week: u32,
    pub day: Weekday,
}

impl CalendarPosition {
    pub fn new(week: u32, day: Weekday) -> Self {
        Self { week, day }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self.day, Weekday::Sat | Weekday::Sun)
    }
}

/// A `(position, shift, slot_index)` triple demanding `arity` persons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub position: CalendarPosition,
    pub shift: Shift,
    pub slot_index: u32,
    pub arity: u8,
}

/// Binding of one person to one slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub position: CalendarPosition,
    pub shift: Shift,
    pub slot_index: u32,
    pub person: String,
}

/// EDO recipients per week, plus each eligible person's fixed-day
/// preference (carried from [`Person::edo_fixed_day`], or overridden by
/// `SolveConfig::edo_fixed_day_global`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdoPlan {
    pub recipients: HashMap<u32, HashSet<String>>,
    pub fixed_day_pref: HashMap<String, Option<Weekday>>,
}

impl EdoPlan {
    pub fn is_recipient(&self, week: u32, name: &str) -> bool {
        self.recipients
            .get(&week)
            .is_some_and(|set| set.contains(name))
    }
}

/// Computed per-week per-day per-shift slot counts (weekday horizon only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffingPlan {
    pub slots: HashMap<u32, HashMap<Weekday, HashMap<Shift, u32>>>,
}

impl StaffingPlan {
    pub fn count(&self, week: u32, day: Weekday, shift: Shift) -> u32 {
        self.slots
            .get(&week)
            .and_then(|d| d.get(&day))
            .and_then(|s| s.get(&shift))
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, week: u32, day: Weekday, shift: Shift, count: u32) {
        self.slots
            .entry(week)
            .or_default()
            .entry(day)
            .or_default()
            .insert(shift, count);
    }
}

/// The full weekday-schedule output.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub weeks: u32,
    /// position -> shift -> assigned persons (unchunked list; consecutive
    /// runs of `arity(shift)` form one slot).
    pub by_position: HashMap<CalendarPosition, HashMap<Shift, Vec<String>>>,
    /// person -> position -> shift (inverse index).
    pub by_person: HashMap<String, HashMap<CalendarPosition, Shift>>,
    pub edo_plan: EdoPlan,
    pub staffing_plan: StaffingPlan,
    pub seed: u64,
}

impl Schedule {
    pub fn new(weeks: u32, edo_plan: EdoPlan, staffing_plan: StaffingPlan, seed: u64) -> Self {
        Self {
            weeks,
            by_position: HashMap::new(),
            by_person: HashMap::new(),
            edo_plan,
            staffing_plan,
            seed,
        }
    }

    pub fn set_shift(&mut self, position: CalendarPosition, person: &str, shift: Shift) {
        self.by_position
            .entry(position)
            .or_default()
            .entry(shift)
            .or_default()
            .push(person.to_string());
        self.by_person
            .entry(person.to_string())
            .or_default()
            .insert(position, shift);
    }

    /// Removes one person's binding to `shift` at `position`, if present.
    /// Used by the post-rebalancer (C9) to undo or apply a swap without
    /// leaving a stale entry in either index.
    pub fn remove_shift(&mut self, position: CalendarPosition, person: &str, shift: Shift) {
        if let Some(by_shift) = self.by_position.get_mut(&position) {
            if let Some(persons) = by_shift.get_mut(&shift) {
                persons.retain(|p| p != person);
            }
        }
        if let Some(positions) = self.by_person.get_mut(person) {
            if positions.get(&position) == Some(&shift) {
                positions.remove(&position);
            }
        }
    }

    pub fn shift_of(&self, person: &str, position: CalendarPosition) -> Shift {
        self.by_person
            .get(person)
            .and_then(|m| m.get(&position))
            .copied()
            .unwrap_or(Shift::Off)
    }

    pub fn persons_on(&self, position: CalendarPosition, shift: Shift) -> &[String] {
        self.by_position
            .get(&position)
            .and_then(|m| m.get(&shift))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_team() {
        assert!(TeamInput::new(vec![]).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let persons = vec![Person::new("Alice", 4), Person::new("Alice", 3)];
        let err = TeamInput::new(persons).unwrap_err();
        assert!(matches!(err, EngineError::InputError { .. }));
    }

    #[test]
    fn rejects_out_of_range_workdays() {
        let persons = vec![Person::new("Alice", 6)];
        assert!(TeamInput::new(persons).is_err());
    }

    #[test]
    fn day_token_round_trip() {
        for day in WEEKDAYS {
            let token = day_to_token(day);
            assert_eq!(day_from_token(token).unwrap(), day);
        }
    }

    #[test]
    fn english_day_tokens_accepted() {
        assert_eq!(day_from_token("Mon").unwrap(), Weekday::Mon);
        assert_eq!(day_from_token("Sun").unwrap(), Weekday::Sun);
    }

    #[test]
    fn shift_code_round_trip() {
        for s in [
            Shift::Day,
            Shift::Evening,
            Shift::Night,
            Shift::Admin,
            Shift::Off,
            Shift::Edo,
            Shift::EdoConflict,
        ] {
            assert_eq!(Shift::from_code(s.code()).unwrap(), s);
        }
    }
}
