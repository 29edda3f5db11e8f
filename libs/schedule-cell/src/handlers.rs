use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{GridQueryRequest, ScheduleError};
use crate::services::availability::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct WorkingWindowsQuery {
    pub branch_id: Uuid,
    pub date_from: String,
    pub date_to: String,
}

fn schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::InvalidDateRange(msg) => AppError::BadRequest(msg),
        e @ (ScheduleError::InvalidSlotMinutes(_) | ScheduleError::InvalidCapacity) => {
            AppError::ValidationError(e.to_string())
        }
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Day × time-slot availability grid for one doctor at one branch.
#[axum::debug_handler]
pub async fn get_slot_grid(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<GridQueryRequest>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);
    let token = auth.as_ref().map(|TypedHeader(header)| header.token());

    let availability = availability_service
        .slot_grid(doctor_id, query, token)
        .await
        .map_err(schedule_error)?;

    Ok(Json(json!(availability)))
}

/// Raw working-window rows for the schedule-management screens.
#[axum::debug_handler]
pub async fn list_working_windows(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<WorkingWindowsQuery>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);
    let token = auth.as_ref().map(|TypedHeader(header)| header.token());

    let windows = availability_service
        .fetch_working_windows(
            doctor_id,
            query.branch_id,
            &query.date_from,
            &query.date_to,
            token,
        )
        .await
        .map_err(schedule_error)?;

    Ok(Json(json!({
        "working_windows": windows,
        "total": windows.len()
    })))
}
