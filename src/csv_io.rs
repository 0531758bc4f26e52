//! CSV boundary (§6.2, §6.3, P5): team roster ingestion and schedule
//! export/import.
//!
//! Grounded in the pack's CSV-driven roster tools (`Thomblin-duty-roster`,
//! `christophcharles-Collomatique`): read into owned `String` records via
//! the `csv` crate, parse field-by-field with row-indexed error messages,
//! never silently default a malformed value.

use std::io::{Read, Write};

use chrono::Weekday;
use csv::{ReaderBuilder, WriterBuilder};

use crate::domain::{day_from_token, day_to_token, CalendarPosition, Person, Schedule, Shift, TeamInput, WEEKDAYS};
use crate::error::{EngineError, EngineResult};

const REQUIRED_NUMERIC_COLUMNS: [&str; 7] = [
    "workdays_per_week",
    "weeks_pattern",
    "prefers_night",
    "no_evening",
    "edo_eligible",
    "is_contractor",
    "available_weekends",
];

/// Parses a team roster CSV. Required column `name`; required numeric
/// columns per §6.2 (booleans encoded 0/1); optional `max_nights`,
/// `edo_fixed_day`, `team`. `weeks_pattern` is validated for shape but
/// has no current engine consumer (reserved by the boundary format).
pub fn read_team_csv<R: Read>(reader: R) -> EngineResult<TeamInput> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| EngineError::input(format!("csv header error: {e}")))?
        .clone();

    if !headers.iter().any(|h| h == "name") {
        return Err(EngineError::input("csv missing required column 'name'"));
    }
    for col in REQUIRED_NUMERIC_COLUMNS {
        if !headers.iter().any(|h| h == col) {
            return Err(EngineError::input(format!("csv missing required column '{col}'")));
        }
    }

    let mut persons = Vec::new();
    for (row_idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| EngineError::input(format!("csv row {row_idx}: {e}")))?;
        let row = CsvRow { headers: &headers, record: &record, row_idx };

        let name = row.field("name")?.to_string();
        let workdays_per_week = row.field_u32("workdays_per_week")?;
        let _weeks_pattern = row.field_u32("weeks_pattern")?;
        let prefers_night = row.field_bool("prefers_night")?;
        let no_evening = row.field_bool("no_evening")?;
        let edo_eligible = row.field_bool("edo_eligible")?;
        let is_contractor = row.field_bool("is_contractor")?;
        let available_weekends = row.field_bool("available_weekends")?;
        let max_nights = row.optional_field_u32("max_nights")?.unwrap_or(u32::MAX);
        let edo_fixed_day = row
            .optional_field("edo_fixed_day")?
            .map(|tok| day_from_token(tok))
            .transpose()
            .map_err(|e| row.reindex(e))?;
        let team = row.optional_field("team")?.map(|s| s.to_string());

        let mut person = Person::new(name, workdays_per_week)
            .with_prefers_night(prefers_night)
            .with_no_evening(no_evening)
            .with_max_nights(max_nights)
            .with_edo(edo_eligible, edo_fixed_day)
            .with_contractor(is_contractor)
            .with_available_weekends(available_weekends);
        if let Some(team) = team {
            person = person.with_team(team);
        }
        persons.push(person);
    }

    TeamInput::new(persons)
}

struct CsvRow<'a> {
    headers: &'a csv::StringRecord,
    record: &'a csv::StringRecord,
    row_idx: usize,
}

impl<'a> CsvRow<'a> {
    fn raw(&self, column: &str) -> Option<&str> {
        self.headers.iter().position(|h| h == column).and_then(|i| self.record.get(i))
    }

    fn reindex(&self, err: EngineError) -> EngineError {
        match err {
            EngineError::InputError { detail } => {
                EngineError::input(format!("csv row {}: {}", self.row_idx, detail))
            }
            other => other,
        }
    }

    fn field(&self, column: &str) -> EngineResult<&str> {
        self.raw(column)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EngineError::input(format!("csv row {}: missing value for '{column}'", self.row_idx)))
    }

    fn optional_field(&self, column: &str) -> EngineResult<Option<&str>> {
        Ok(self.raw(column).filter(|v| !v.trim().is_empty()))
    }

    fn field_u32(&self, column: &str) -> EngineResult<u32> {
        let raw = self.field(column)?;
        raw.trim().parse::<u32>().map_err(|_| {
            EngineError::input(format!(
                "csv row {}: invalid numeric value '{raw}' for column '{column}'",
                self.row_idx
            ))
        })
    }

    fn optional_field_u32(&self, column: &str) -> EngineResult<Option<u32>> {
        match self.optional_field(column)? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| EngineError::input(format!(
                    "csv row {}: invalid numeric value '{raw}' for column '{column}'",
                    self.row_idx
                ))),
        }
    }

    fn field_bool(&self, column: &str) -> EngineResult<bool> {
        let n = self.field_u32(column)?;
        match n {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EngineError::input(format!(
                "csv row {}: boolean column '{column}' must be 0 or 1, got {other}",
                self.row_idx
            ))),
        }
    }
}

/// Exports a weekday schedule as CSV with columns `name,week,day,shift`
/// using the boundary tokens (§6.3). Round-trips with [`read_schedule_csv`]
/// for arbitrary valid schedules (P5).
pub fn write_schedule_csv<W: Write>(schedule: &Schedule, writer: W) -> EngineResult<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    wtr.write_record(["name", "week", "day", "shift"])
        .map_err(|e| EngineError::input(format!("csv write error: {e}")))?;

    for week in 1..=schedule.weeks {
        for day in WEEKDAYS {
            let position = CalendarPosition::new(week, day);
            for shift in Shift::PAIR_KINDS.into_iter().chain([Shift::Admin, Shift::Edo, Shift::EdoConflict]) {
                for person in schedule.persons_on(position, shift) {
                    wtr.write_record([person.as_str(), &week.to_string(), day_to_token(day), shift.code()])
                        .map_err(|e| EngineError::input(format!("csv write error: {e}")))?;
                }
            }
        }
    }

    wtr.flush().map_err(|e| EngineError::input(format!("csv flush error: {e}")))
}

/// Reads back a schedule written by [`write_schedule_csv`]. `weeks` must
/// be supplied since a sparse schedule (all positions Off) carries no
/// row to infer the horizon length from.
pub fn read_schedule_csv<R: Read>(
    reader: R,
    weeks: u32,
    edo_plan: crate::domain::EdoPlan,
    staffing_plan: crate::domain::StaffingPlan,
    seed: u64,
) -> EngineResult<Schedule> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut schedule = Schedule::new(weeks, edo_plan, staffing_plan, seed);

    for (row_idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| EngineError::input(format!("csv row {row_idx}: {e}")))?;
        if record.len() < 4 {
            return Err(EngineError::input(format!("csv row {row_idx}: expected 4 columns, got {}", record.len())));
        }
        let name = &record[0];
        let week: u32 = record[1]
            .parse()
            .map_err(|_| EngineError::input(format!("csv row {row_idx}: invalid week '{}'", &record[1])))?;
        let day: Weekday = day_from_token(&record[2]).map_err(|e| match e {
            EngineError::InputError { detail } => EngineError::input(format!("csv row {row_idx}: {detail}")),
            other => other,
        })?;
        let shift = Shift::from_code(&record[3]).map_err(|e| match e {
            EngineError::InputError { detail } => EngineError::input(format!("csv row {row_idx}: {detail}")),
            other => other,
        })?;
        schedule.set_shift(CalendarPosition::new(week, day), name, shift);
    }

    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EdoPlan;
    use crate::domain::StaffingPlan;

    const HEADER: &str = "name,workdays_per_week,weeks_pattern,prefers_night,no_evening,edo_eligible,is_contractor,available_weekends,max_nights,edo_fixed_day,team";

    #[test]
    fn parses_minimal_valid_roster() {
        let csv = format!("{HEADER}\nAlice,4,1,0,0,1,0,1,3,Lun,A\nBob,5,1,1,0,0,1,1,,,\n");
        let team = read_team_csv(csv.as_bytes()).unwrap();
        assert_eq!(team.len(), 2);
        let alice = team.by_name("Alice").unwrap();
        assert_eq!(alice.workdays_per_week, 4);
        assert!(alice.edo_eligible);
        assert_eq!(alice.edo_fixed_day, Some(Weekday::Mon));
        assert_eq!(alice.max_nights, 3);
        assert_eq!(alice.team.as_deref(), Some("A"));

        let bob = team.by_name("Bob").unwrap();
        assert_eq!(bob.max_nights, u32::MAX);
        assert!(bob.is_contractor);
    }

    #[test]
    fn invalid_numeric_token_fails_loudly_with_row_and_value() {
        let csv = format!("{HEADER}\nAlice,notanumber,1,0,0,1,0,1,,,\n");
        let err = read_team_csv(csv.as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 0"), "{msg}");
        assert!(msg.contains("notanumber"), "{msg}");
    }

    #[test]
    fn duplicate_name_rejected() {
        let csv = format!("{HEADER}\nAlice,4,1,0,0,0,0,1,,,\nAlice,3,1,0,0,0,0,1,,,\n");
        let err = read_team_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Alice"));
    }

    #[test]
    fn schedule_csv_round_trips() {
        let staffing_plan = StaffingPlan::default();
        let mut schedule = Schedule::new(1, EdoPlan::default(), staffing_plan.clone(), 1);
        schedule.set_shift(CalendarPosition::new(1, Weekday::Mon), "Alice", Shift::Night);
        schedule.set_shift(CalendarPosition::new(1, Weekday::Tue), "Bob", Shift::Day);

        let mut buf = Vec::new();
        write_schedule_csv(&schedule, &mut buf).unwrap();

        let round_tripped = read_schedule_csv(buf.as_slice(), 1, EdoPlan::default(), staffing_plan, 1).unwrap();
        assert_eq!(
            round_tripped.shift_of("Alice", CalendarPosition::new(1, Weekday::Mon)),
            Shift::Night
        );
        assert_eq!(
            round_tripped.shift_of("Bob", CalendarPosition::new(1, Weekday::Tue)),
            Shift::Day
        );
    }
}
