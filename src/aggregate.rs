use std::collections::{BTreeMap, HashSet};

use crate::config::{AggregationSettings, Denominator, Rounding, SortOrder};
use crate::error::AttendanceResult;
use crate::models::{
    AttendanceRecord, OverallAttendanceSummary, PersonSummary, RosterRow, Summaries,
};
use crate::roster::RosterTable;

const OPERATION: &str = "operation";
const TRAINING: &str = "training";

pub fn compute_summaries(
    table: &RosterTable,
    settings: &AggregationSettings,
) -> AttendanceResult<Summaries> {
    let rows = table.rows()?;
    Ok(summarize_rows(&rows, settings))
}

pub fn summarize_rows(rows: &[RosterRow], settings: &AggregationSettings) -> Summaries {
    let records = explode_attendance(rows);
    let mut people = person_summaries(&records, settings.rounding);
    let denominator = attendance_denominator(rows, &records, &people, settings.denominator);
    let mut overall = overall_summaries(rows, denominator, settings.rounding);

    match settings.order {
        SortOrder::Name => {
            people.sort_by(|a, b| a.name.cmp(&b.name));
            overall.sort_by(|a, b| a.name.cmp(&b.name));
        }
        SortOrder::CountDesc => {
            people.sort_by(|a, b| {
                b.total_attendance
                    .cmp(&a.total_attendance)
                    .then_with(|| a.name.cmp(&b.name))
            });
            overall.sort_by(|a, b| {
                b.attendance_count
                    .cmp(&a.attendance_count)
                    .then_with(|| a.name.cmp(&b.name))
            });
        }
    }

    log::debug!(
        "summarized {} rows into {} records for {} people (denominator {})",
        rows.len(),
        records.len(),
        people.len(),
        denominator
    );

    Summaries { people, overall }
}

/// Splits each non-blank attendance cell on commas. Tokens that are empty
/// after trimming are dropped.
pub fn split_names(attendance: &str) -> impl Iterator<Item = &str> {
    attendance
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

pub fn explode_attendance(rows: &[RosterRow]) -> Vec<AttendanceRecord> {
    let mut records = Vec::new();

    for row in rows {
        let Some(attendance) = row.attendance.as_deref() else {
            continue;
        };

        for name in split_names(attendance) {
            records.push(AttendanceRecord {
                name: name.to_string(),
                event_type: row.event_type.clone(),
            });
        }
    }

    records
}

pub fn is_operation(event_type: &str) -> bool {
    event_type.to_lowercase().contains(OPERATION)
}

pub fn is_training(event_type: &str) -> bool {
    event_type.to_lowercase().contains(TRAINING)
}

pub fn person_summaries(records: &[AttendanceRecord], rounding: Rounding) -> Vec<PersonSummary> {
    // (total, operation, training)
    let mut counts: BTreeMap<&str, (usize, usize, usize)> = BTreeMap::new();

    for record in records {
        let entry = counts.entry(record.name.as_str()).or_insert((0, 0, 0));
        entry.0 += 1;
        if is_operation(&record.event_type) {
            entry.1 += 1;
        }
        if is_training(&record.event_type) {
            entry.2 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(name, (total, operation, training))| PersonSummary {
            name: name.to_string(),
            total_attendance: total,
            operation_attendance: operation,
            training_attendance: training,
            operation_percent: percent_of(operation, total, rounding),
            training_percent: percent_of(training, total, rounding),
        })
        .collect()
}

pub fn count_names(rows: &[RosterRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();

    for attendance in rows.iter().filter_map(|row| row.attendance.as_deref()) {
        for name in split_names(attendance) {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    counts
}

pub fn attendance_denominator(
    rows: &[RosterRow],
    records: &[AttendanceRecord],
    people: &[PersonSummary],
    policy: Denominator,
) -> usize {
    match policy {
        Denominator::MaxOperationAttendance => people
            .iter()
            .map(|person| person.operation_attendance)
            .max()
            .unwrap_or(0),
        Denominator::DistinctEventTypes => records
            .iter()
            .map(|record| record.event_type.as_str())
            .filter(|event_type| !event_type.is_empty())
            .collect::<HashSet<_>>()
            .len(),
        Denominator::EventTypeRows => rows
            .iter()
            .filter(|row| {
                row.attendance
                    .as_deref()
                    .is_some_and(|attendance| split_names(attendance).next().is_some())
                    && !row.event_type.is_empty()
            })
            .count(),
    }
}

pub fn overall_summaries(
    rows: &[RosterRow],
    denominator: usize,
    rounding: Rounding,
) -> Vec<OverallAttendanceSummary> {
    count_names(rows)
        .into_iter()
        .map(|(name, count)| OverallAttendanceSummary {
            name,
            attendance_count: count,
            attendance_percent: percent_of(count, denominator, rounding).min(100),
        })
        .collect()
}

/// Percentage of `part` in `whole`, rounded to a whole number. A zero
/// `whole` yields 0.
pub fn percent_of(part: usize, whole: usize, rounding: Rounding) -> u32 {
    if whole == 0 {
        return 0;
    }
    round_percent(part as f64 / whole as f64 * 100.0, rounding)
}

pub fn round_percent(value: f64, rounding: Rounding) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = match rounding {
        Rounding::HalfEven => value.round_ties_even(),
        Rounding::HalfUp => (value + 0.5).floor(),
    };
    rounded as u32
}
