// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{AppointmentIdsQuery, BookSlotRequest, BookingError};
use crate::services::booking::BookingService;

fn booking_error(e: BookingError) -> AppError {
    match e {
        e @ (BookingError::InvalidDuration(_) | BookingError::InvalidCapacity(_)) => {
            AppError::ValidationError(e.to_string())
        }
        e @ BookingError::SlotFull => AppError::Conflict(e.to_string()),
        BookingError::DatabaseError(message) => AppError::Database(message),
    }
}

/// POST /booking/appointments
#[axum::debug_handler]
pub async fn book_slot(
    State(service): State<Arc<BookingService>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.as_ref().map(|TypedHeader(header)| header.token());

    let appointment = service
        .book_slot(request, token)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!(appointment)))
}

/// GET /booking/appointments?ids=a,b,c
#[axum::debug_handler]
pub async fn get_appointment_details(
    State(service): State<Arc<BookingService>>,
    Query(query): Query<AppointmentIdsQuery>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.as_ref().map(|TypedHeader(header)| header.token());

    let ids = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Uuid::parse_str)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::BadRequest(format!("Invalid appointment id: {}", e)))?;

    let appointments = service
        .fetch_by_ids(&ids, token)
        .await
        .map_err(booking_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
