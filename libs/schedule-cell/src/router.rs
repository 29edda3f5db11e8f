use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/doctors/{doctor_id}/grid", get(handlers::get_slot_grid))
        .route(
            "/doctors/{doctor_id}/working-windows",
            get(handlers::list_working_windows),
        )
        .with_state(state)
}
