use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;

/// Unix milliseconds.
pub type Ms = i64;

/// Which schedule a desk, student or slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Recurring weekly schedule, slots keyed by weekday.
    Term,
    /// Break schedule, slots keyed by calendar date.
    Interim,
}

impl ScheduleKind {
    pub fn label(&self) -> &'static str {
        match self {
            ScheduleKind::Term => "term",
            ScheduleKind::Interim => "interim",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "term" => Ok(ScheduleKind::Term),
            "interim" | "break" => Ok(ScheduleKind::Interim),
            other => Err(format!("unknown schedule kind: {other}")),
        }
    }
}

/// The calendar bucket a slot covers. Everything downstream of slot loading
/// treats both variants the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKey {
    ByDate(String),
    ByWeekday(String),
}

impl SlotKey {
    pub fn for_kind(kind: ScheduleKind, date: Option<&str>, day_of_week: Option<&str>) -> Self {
        match kind {
            ScheduleKind::Interim => SlotKey::ByDate(date.unwrap_or_default().to_string()),
            ScheduleKind::Term => SlotKey::ByWeekday(day_of_week.unwrap_or_default().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SlotKey::ByDate(s) | SlotKey::ByWeekday(s) => s,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot key plus rendered `"start - end"` range. Availability is recorded
/// against this, not against a shift id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeKey {
    pub slot: SlotKey,
    pub range: String,
}

impl TimeKey {
    pub fn new(slot: SlotKey, range: impl Into<String>) -> Self {
        Self {
            slot,
            range: range.into(),
        }
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.slot, self.range)
    }
}

/// A student's stated preference for a time key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    FirstChoice,
    SecondChoice,
    NotAvailable,
    /// Anything else, including a desk name written back after assignment.
    Other(String),
}

impl Tier {
    /// Only first and second choice make a student a candidate.
    pub fn is_candidate(&self) -> bool {
        matches!(self, Tier::FirstChoice | Tier::SecondChoice)
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        match s.as_str() {
            FIRST_CHOICE => Tier::FirstChoice,
            SECOND_CHOICE => Tier::SecondChoice,
            NOT_AVAILABLE => Tier::NotAvailable,
            _ => Tier::Other(s),
        }
    }
}

impl From<&str> for Tier {
    fn from(s: &str) -> Self {
        Tier::from(s.to_string())
    }
}

impl From<Tier> for String {
    fn from(t: Tier) -> Self {
        match t {
            Tier::FirstChoice => FIRST_CHOICE.to_string(),
            Tier::SecondChoice => SECOND_CHOICE.to_string(),
            Tier::NotAvailable => NOT_AVAILABLE.to_string(),
            Tier::Other(s) => s,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::FirstChoice => f.write_str(FIRST_CHOICE),
            Tier::SecondChoice => f.write_str(SECOND_CHOICE),
            Tier::NotAvailable => f.write_str(NOT_AVAILABLE),
            Tier::Other(s) => f.write_str(s),
        }
    }
}

// ── Store records ────────────────────────────────────────────────
//
// These mirror the rows the persistence collaborator hands over. Occupant
// lists here still carry the open-seat placeholder.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskRecord {
    pub id: String,
    pub desk_name: String,
    pub year: String,
    pub term_or_break: String,
    pub kind: ScheduleKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub preferred_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Comma-delimited job tags.
    #[serde(default)]
    pub jobs: Option<String>,
    #[serde(default)]
    pub preferred_desk: Option<String>,
    #[serde(default)]
    pub seniority: Option<i64>,
    #[serde(default)]
    pub assigned_shifts: Option<u32>,
    #[serde(default)]
    pub max_shifts: Option<u32>,
    pub year: String,
    pub term_or_break: String,
    pub kind: ScheduleKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub id: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub max_students: Option<u32>,
    #[serde(default)]
    pub students_detailed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: String,
    pub desk_id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub shifts: Vec<ShiftRecord>,
}

impl SlotRecord {
    pub fn key(&self, kind: ScheduleKind) -> SlotKey {
        SlotKey::for_kind(kind, self.date.as_deref(), self.day_of_week.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub id: String,
    pub student_id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<String>,
    pub time_slot: String,
    pub scheduled_status: Tier,
    pub kind: ScheduleKind,
}

impl AvailabilityRecord {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::for_kind(self.kind, self.date.as_deref(), self.day_of_week.as_deref())
    }

    pub fn time_key(&self) -> TimeKey {
        TimeKey::new(self.slot_key(), self.time_slot.clone())
    }
}

// ── Open-seat boundary ───────────────────────────────────────────

/// Drop placeholder entries (case-insensitive) from a stored occupant list.
pub fn strip_open_seats(stored: &[String]) -> Vec<String> {
    stored
        .iter()
        .filter(|name| !name.eq_ignore_ascii_case(OPEN_SEAT))
        .cloned()
        .collect()
}

/// Right-pad occupants with placeholders up to `capacity`.
pub fn pad_open_seats(occupants: &[String], capacity: u32) -> Vec<String> {
    let mut padded = occupants.to_vec();
    let open = (capacity as usize).saturating_sub(occupants.len());
    padded.extend(std::iter::repeat_n(OPEN_SEAT.to_string(), open));
    padded
}

/// Split a comma-delimited job string into trimmed, non-empty tags.
pub fn parse_jobs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Domain types ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub jobs: Vec<String>,
    pub preferred_desk: Option<String>,
    /// Higher is scheduled first.
    pub seniority: i64,
    pub assigned_shifts: u32,
    /// `None` means uncapped.
    pub max_shifts: Option<u32>,
}

impl From<&StudentRecord> for Student {
    fn from(rec: &StudentRecord) -> Self {
        Self {
            id: rec.id.clone(),
            name: rec.preferred_name.clone(),
            jobs: rec.jobs.as_deref().map(parse_jobs).unwrap_or_default(),
            preferred_desk: rec.preferred_desk.clone(),
            seniority: rec.seniority.unwrap_or(0),
            assigned_shifts: rec.assigned_shifts.unwrap_or(0),
            max_shifts: rec.max_shifts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub id: String,
    /// `HH:MM`, compared lexically.
    pub start: String,
    pub end: String,
    pub capacity: u32,
    /// Real occupants only, in assignment order.
    pub occupants: Vec<String>,
}

impl Shift {
    pub fn time_range(&self) -> String {
        format!("{} - {}", self.start, self.end)
    }
}

impl From<&ShiftRecord> for Shift {
    fn from(rec: &ShiftRecord) -> Self {
        Self {
            id: rec.id.clone(),
            start: rec.start_time.clone(),
            end: rec.end_time.clone(),
            capacity: rec.max_students.filter(|&n| n > 0).unwrap_or(DEFAULT_MAX_OCCUPANCY),
            occupants: strip_open_seats(&rec.students_detailed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: String,
    pub key: SlotKey,
    /// Sorted by start time.
    pub shifts: Vec<Shift>,
}

impl Slot {
    pub fn from_record(rec: &SlotRecord, kind: ScheduleKind) -> Self {
        let mut shifts: Vec<Shift> = rec.shifts.iter().map(Shift::from).collect();
        shifts.sort_by(|a, b| a.start.cmp(&b.start));
        Self {
            id: rec.id.clone(),
            key: rec.key(kind),
            shifts,
        }
    }
}

// ── Run input / output ───────────────────────────────────────────

/// A run request as received. Every field is required; see `validate_request`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub desk_name: Option<String>,
    pub year: Option<String>,
    pub term_or_break: Option<String>,
    pub round_number: Option<i64>,
    pub set_to_max_shifts: Option<bool>,
    pub shifts_to_assign: Option<u32>,
    pub consider_preferred_desk: Option<bool>,
}

/// A validated run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub kind: ScheduleKind,
    pub desk_name: String,
    pub year: String,
    pub term_or_break: String,
    pub round_number: i64,
    /// Fill each student to their cap instead of `shifts_to_assign`.
    pub set_to_max_shifts: bool,
    pub shifts_to_assign: u32,
    pub consider_preferred_desk: bool,
}

/// One committed placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub student_id: String,
    pub student_name: String,
    pub shift_id: String,
    pub slot_id: String,
    pub slot_key: SlotKey,
    pub time_range: String,
}

/// Successful run response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub message: String,
    #[serde(rename = "logSummary")]
    pub log_summary: Vec<String>,
    pub assignments: Vec<Assignment>,
    pub total_assigned: u32,
}

/// Audit record persisted at the end of every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Ulid,
    pub kind: ScheduleKind,
    pub year: String,
    pub term_or_break: String,
    pub desk_name: String,
    pub round_number: i64,
    pub set_to_max_shifts: bool,
    pub shifts_to_assign: u32,
    pub consider_preferred_desk: bool,
    pub log_summary: String,
    pub created_at: Ms,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub year: Option<String>,
    pub term_or_break: Option<String>,
    /// Case-insensitive substring of the desk name.
    pub desk: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub student_id: String,
    pub preferred_name: String,
    pub email: Option<String>,
    pub availability_status: Tier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableStudents {
    #[serde(rename = "firstChoice")]
    pub first_choice: Vec<Candidate>,
    #[serde(rename = "secondChoice")]
    pub second_choice: Vec<Candidate>,
}
