use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub attendance: Option<String>,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub name: String,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonSummary {
    pub name: String,
    pub total_attendance: usize,
    pub operation_attendance: usize,
    pub training_attendance: usize,
    pub operation_percent: u32,
    pub training_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverallAttendanceSummary {
    pub name: String,
    pub attendance_count: usize,
    pub attendance_percent: u32,
}

/// Both derived tables for one load of the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summaries {
    pub people: Vec<PersonSummary>,
    pub overall: Vec<OverallAttendanceSummary>,
}
