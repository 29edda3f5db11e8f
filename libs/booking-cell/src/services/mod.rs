// libs/booking-cell/src/services/mod.rs
pub mod booking;
pub mod gateway;

pub use booking::BookingService;
pub use gateway::DirectBookingGateway;
