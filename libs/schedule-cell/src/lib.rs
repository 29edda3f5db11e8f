pub mod calendar;
pub mod clinic_hours;
pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

// Re-export the grid vocabulary for sibling cells
pub use clinic_hours::{ClinicHours, HoursWindow};
pub use models::{
    Availability, AppointmentDetail, AppointmentRecord, DayColumn, PatientRef, Slot,
    SlotStatus, WorkingWindow,
};
pub use services::{AvailabilityService, BookingGateway, GridController, SlotBooking, SlotGridBuilder};
