// libs/booking-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status a freshly booked appointment starts in. Confirmation is a later
/// workflow step owned by reception, not by this cell.
pub const PENDING_STATUS: &str = "pending";

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Booking submission produced by the grid's confirmation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub patient_id: Uuid,
    pub slot_start: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Query string for the booked-slot detail lookup, carrying the cell's
/// appointment ids as one comma-separated list.
#[derive(Debug, Deserialize)]
pub struct AppointmentIdsQuery {
    pub ids: String,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Appointment row as the data plane returns it after a successful insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Booking duration must be between 1 and 1440 minutes, got {0}")]
    InvalidDuration(i64),

    #[error("Capacity must be a positive number of appointments, got {0}")]
    InvalidCapacity(usize),

    #[error("Requested slot is already booked to capacity")]
    SlotFull,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
