// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;
use crate::services::booking::BookingService;

/// Booking routes own one long-lived service so the per-doctor day locks
/// cover every request this process handles.
pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    let service = Arc::new(BookingService::new(&state));

    Router::new()
        .route(
            "/appointments",
            post(handlers::book_slot).get(handlers::get_appointment_details),
        )
        .with_state(service)
}
