use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use booking_cell::router::booking_routes;
use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dental Clinic API is running!" }))
        .nest("/schedule", schedule_routes(state.clone()))
        .nest("/booking", booking_routes(state))
}
