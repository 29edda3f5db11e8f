// libs/booking-cell/src/services/gateway.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use schedule_cell::{BookingGateway, SlotBooking};

use crate::models::BookSlotRequest;
use crate::services::booking::BookingService;

/// In-process bridge from the grid's booking intents to the write path. One
/// gateway carries the doctor, branch, and patient context of the grid it
/// serves, so the grid itself only ever deals in slot times.
pub struct DirectBookingGateway {
    service: Arc<BookingService>,
    doctor_id: Uuid,
    branch_id: Uuid,
    patient_id: Uuid,
    auth_token: Option<String>,
}

impl DirectBookingGateway {
    pub fn new(
        service: Arc<BookingService>,
        doctor_id: Uuid,
        branch_id: Uuid,
        patient_id: Uuid,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            service,
            doctor_id,
            branch_id,
            patient_id,
            auth_token,
        }
    }
}

#[async_trait]
impl BookingGateway for DirectBookingGateway {
    async fn create_booking(&self, intent: SlotBooking) -> Result<()> {
        let request = BookSlotRequest {
            doctor_id: self.doctor_id,
            branch_id: self.branch_id,
            patient_id: self.patient_id,
            slot_start: intent.slot_start,
            duration_minutes: intent.duration_minutes,
            note: None,
        };

        self.service
            .book_slot(request, self.auth_token.as_deref())
            .await?;

        Ok(())
    }
}
