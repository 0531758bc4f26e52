//! Staffing deriver (C2, spec §4.2).
//!
//! Computes the per-week per-day slot counts from team capacity and the
//! EDO plan. Keeps night coverage constant, smooths day/evening across
//! the week, and guarantees an even person-day consumption.

use crate::domain::{CalendarPosition, EdoPlan, Shift, StaffingPlan, TeamInput, WEEKDAYS};
use chrono::Weekday;
use tracing::debug;

const NIGHT_PAIR_PERSON_DAYS: u32 = 2 * WEEKDAYS.len() as u32;

pub fn derive_staffing(team: &TeamInput, edo_plan: &EdoPlan, weeks: u32) -> StaffingPlan {
    let mut plan = StaffingPlan::default();
    let total_workdays: u32 = team.persons.iter().map(|p| p.workdays_per_week).sum();
    debug!(team_size = team.persons.len(), total_workdays, weeks, "deriving staffing plan");

    let cells: Vec<(Weekday, Shift)> = WEEKDAYS
        .iter()
        .flat_map(|d| [(*d, Shift::Day), (*d, Shift::Evening)])
        .collect();

    for week in 1..=weeks {
        for day in WEEKDAYS {
            plan.set(week, day, Shift::Night, 1);
            plan.set(week, day, Shift::Admin, 0);
            plan.set(week, day, Shift::Day, 0);
            plan.set(week, day, Shift::Evening, 0);
        }

        let edo_count = edo_plan
            .recipients
            .get(&week)
            .map(|set| set.len() as u32)
            .unwrap_or(0);
        let mut available = total_workdays.saturating_sub(edo_count);

        if available % 2 == 1 {
            let monday = plan.count(week, Weekday::Mon, Shift::Admin);
            plan.set(week, Weekday::Mon, Shift::Admin, monday + 1);
            available -= 1;
        }

        let remainder = available.saturating_sub(NIGHT_PAIR_PERSON_DAYS);
        let day_evening_pair_slots = remainder / 2;

        for i in 0..day_evening_pair_slots {
            let (day, shift) = cells[i as usize % cells.len()];
            let current = plan.count(week, day, shift);
            plan.set(week, day, shift, current + 1);
        }

        debug!(week, edo_count, day_evening_pair_slots, "week staffing derived");
    }

    plan
}

/// Total planned pair-slots (not person-days) for a position, used by
/// the CP model to size coverage constraints.
pub fn planned_slot_count(plan: &StaffingPlan, position: CalendarPosition, shift: Shift) -> u32 {
    plan.count(position.week, position.day, shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Person;

    fn team_of(n: usize, workdays: u32) -> TeamInput {
        let persons = (0..n)
            .map(|i| Person::new(format!("P{i}"), workdays))
            .collect();
        TeamInput::new(persons).unwrap()
    }

    #[test]
    fn night_pair_reserved_every_weekday() {
        let team = team_of(10, 4);
        let edo = EdoPlan::default();
        let plan = derive_staffing(&team, &edo, 2);
        for week in 1..=2 {
            for day in WEEKDAYS {
                assert_eq!(plan.count(week, day, Shift::Night), 1);
            }
        }
    }

    #[test]
    fn odd_person_days_reserve_monday_admin() {
        // 9 persons * 3 workdays = 27, odd.
        let team = team_of(9, 3);
        let edo = EdoPlan::default();
        let plan = derive_staffing(&team, &edo, 1);
        assert_eq!(plan.count(1, Weekday::Mon, Shift::Admin), 1);
    }

    #[test]
    fn even_person_days_no_admin_reserved() {
        let team = team_of(10, 4); // 40, even
        let edo = EdoPlan::default();
        let plan = derive_staffing(&team, &edo, 1);
        assert_eq!(plan.count(1, Weekday::Mon, Shift::Admin), 0);
    }

    #[test]
    fn small_team_yields_no_day_evening_slack() {
        // 5 persons * 4 workdays = 20 person-days; nights alone need 10,
        // remainder 10 -> 5 day/evening pair-slots distributed round robin.
        let team = team_of(5, 4);
        let edo = EdoPlan::default();
        let plan = derive_staffing(&team, &edo, 1);
        let total_day_evening: u32 = WEEKDAYS
            .iter()
            .map(|d| plan.count(1, *d, Shift::Day) + plan.count(1, *d, Shift::Evening))
            .sum();
        assert_eq!(total_day_evening, 5);
    }
}
