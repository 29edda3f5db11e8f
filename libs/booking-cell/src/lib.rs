// libs/booking-cell/src/lib.rs
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{BookSlotRequest, BookedAppointment, BookingError};
pub use router::booking_routes;
pub use services::{BookingService, DirectBookingGateway};
