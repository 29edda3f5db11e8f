pub mod availability;
pub mod grid;

pub use availability::{AvailabilityService, SlotGridBuilder};
pub use grid::{BookingGateway, GridController, SlotBooking};
