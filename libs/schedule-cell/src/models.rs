use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};
use std::fmt;
use thiserror::Error;

/// Grid cell length when the caller does not ask for another one.
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// Longest slot or booking duration a caller may request. The grid is
/// day-scoped; a step past one day cannot label anything.
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;

/// How many simultaneous appointments one slot absorbs before it renders booked.
pub const DEFAULT_CAPACITY_PER_SLOT: usize = 2;

/// Appointment status excluded from availability. The status column is
/// free-form; only this sentinel carries scheduling semantics.
pub const CANCELLED_STATUS: &str = "cancelled";

// ==============================================================================
// FEED MODELS (read-only rows owned by external collaborators)
// ==============================================================================

/// One doctor's declared working block on one date at one branch.
/// `date` and the times stay raw strings on purpose: a malformed row must
/// degrade to off coverage, not fail the whole feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Booked or tentative visit as delivered by the appointment feed. Timestamps
/// stay raw; normalization drops individual bad records instead of rejecting
/// the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub scheduled_at: String,
    #[serde(default)]
    pub end_at: Option<String>,
    pub status: String,
}

impl AppointmentRecord {
    /// The interval this record blocks, or `None` for cancelled records and
    /// unparseable starts. An absent, unparseable, or non-increasing end
    /// falls back to one slot length.
    pub fn booked_interval(&self, slot_minutes: i64) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if self.status == CANCELLED_STATUS {
            return None;
        }

        let start = crate::calendar::parse_instant(&self.scheduled_at)?;
        let end = self
            .end_at
            .as_deref()
            .and_then(crate::calendar::parse_instant)
            .filter(|end| *end > start)
            .unwrap_or_else(|| crate::calendar::add_minutes(start, slot_minutes));

        Some((start, end))
    }
}

/// Flat detail row backing the booked-slot popup (data-plane view joining
/// appointment and patient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    #[serde(flatten)]
    pub patient: PatientRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientRef {
    #[serde(default)]
    pub ovog: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub book_number: Option<String>,
}

impl PatientRef {
    /// Compact calendar-cell label, e.g. "Ч.Бат (A-12)": ovog initial
    /// uppercased before the given name, book number in parentheses. All-empty
    /// input gives an empty label.
    pub fn cell_label(&self) -> String {
        let ovog = self.ovog.as_deref().unwrap_or("");
        let name = self.name.as_deref().unwrap_or("");

        let display = match ovog.chars().next() {
            Some(initial) => format!("{}.{}", initial.to_uppercase(), name),
            None => name.to_string(),
        };

        if display.is_empty() {
            return String::new();
        }

        match self.book_number.as_deref() {
            Some(book) if !book.is_empty() => format!("{} ({})", display, book),
            _ => display,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Parameters of one grid request. `slot_minutes` and `capacity_per_slot`
/// must be positive when given; the service rejects anything else before the
/// builder runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridQueryRequest {
    pub branch_id: Uuid,
    pub date_from: String,
    pub date_to: String,
    #[serde(default)]
    pub slot_minutes: Option<i64>,
    #[serde(default)]
    pub capacity_per_slot: Option<i64>,
}

// ==============================================================================
// AVAILABILITY GRID MODELS (derived per request, never persisted)
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Off,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Off => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: SlotStatus,
    /// Contributing appointment ids, present only when booked, in the order
    /// the appointment feed delivered them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub day_label: String,
    /// True when no working window was recorded for this date; every slot is
    /// off and the UI may show a distinct "no schedule" message.
    pub no_schedule: bool,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Availability {
    pub time_labels: Vec<String>,
    pub days: Vec<DayColumn>,
}

impl Availability {
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.time_labels.iter().position(|l| l == label)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayColumn> {
        self.days.iter().find(|d| d.date == date)
    }

    /// Slot addressed by day and header label; slots align with
    /// `time_labels` index-for-index.
    pub fn slot(&self, date: NaiveDate, label: &str) -> Option<&Slot> {
        let index = self.label_index(label)?;
        self.day(date)?.slots.get(index)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Slot duration must be between 1 and 1440 minutes, got {0}")]
    InvalidSlotMinutes(i64),

    #[error("Slot capacity must be positive")]
    InvalidCapacity,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
