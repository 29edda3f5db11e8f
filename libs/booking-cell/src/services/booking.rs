// libs/booking-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use schedule_cell::calendar::add_minutes;
use schedule_cell::models::{
    AppointmentDetail, AppointmentRecord, DEFAULT_CAPACITY_PER_SLOT, DEFAULT_SLOT_MINUTES,
    MAX_SLOT_MINUTES,
};
use shared_config::AppConfig;
use shared_database::rest::ClinicDbClient;

use crate::models::{BookSlotRequest, BookedAppointment, BookingError, PENDING_STATUS};

/// Appointment write path. The availability grid is advisory only; this
/// service recounts occupancy under a per-doctor-per-day lock so two clients
/// holding the same stale grid cannot overbook a slot.
pub struct BookingService {
    db: Arc<ClinicDbClient>,
    slot_minutes: i64,
    capacity_per_slot: usize,
    /// Write locks keyed by doctor and day. Entries are created on first
    /// booking and swept once no booking holds them.
    day_locks: Mutex<HashMap<(Uuid, NaiveDate), Arc<Mutex<()>>>>,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_capacity(config, DEFAULT_SLOT_MINUTES, DEFAULT_CAPACITY_PER_SLOT)
    }

    pub fn with_capacity(config: &AppConfig, slot_minutes: i64, capacity_per_slot: usize) -> Self {
        Self {
            db: Arc::new(ClinicDbClient::new(config)),
            slot_minutes,
            capacity_per_slot,
            day_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Book one slot for a patient. Runs the capacity check and the insert
    /// under the doctor's day lock, so concurrent requests for the same day
    /// are serialized within this process.
    pub async fn book_slot(
        &self,
        request: BookSlotRequest,
        auth_token: Option<&str>,
    ) -> Result<BookedAppointment, BookingError> {
        info!(
            "Booking slot {} for patient {} with doctor {}",
            request.slot_start, request.patient_id, request.doctor_id
        );

        // **Step 1: Validate the requested duration and the slot configuration**
        if request.duration_minutes <= 0 || request.duration_minutes > MAX_SLOT_MINUTES {
            return Err(BookingError::InvalidDuration(request.duration_minutes));
        }
        if self.slot_minutes <= 0 || self.slot_minutes > MAX_SLOT_MINUTES {
            return Err(BookingError::InvalidDuration(self.slot_minutes));
        }
        if self.capacity_per_slot == 0 {
            return Err(BookingError::InvalidCapacity(self.capacity_per_slot));
        }

        // **Step 2: Serialize writes for this doctor and day**
        let day = request.slot_start.date_naive();
        let lock = self.day_lock(request.doctor_id, day).await;

        let outcome = {
            let _guard = lock.lock().await;

            // **Step 3: Re-validate capacity against current appointments**
            match self.ensure_capacity(&request, auth_token).await {
                // **Step 4: Create the appointment record**
                Ok(()) => self.create_appointment(&request, auth_token).await,
                Err(e) => Err(e),
            }
        };

        // **Step 5: Sweep day locks no booking holds anymore**
        drop(lock);
        self.evict_idle_day_locks().await;

        let appointment = outcome?;

        info!(
            "Appointment {} booked for doctor {} at {}",
            appointment.id, appointment.doctor_id, appointment.scheduled_at
        );

        Ok(appointment)
    }

    /// Detail rows for the appointments occupying one grid cell, ordered by
    /// start time. Unknown ids are simply absent from the result.
    pub async fn fetch_by_ids(
        &self,
        ids: &[Uuid],
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentDetail>, BookingError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let path = format!(
            "/rest/v1/appointment_details?id=in.({})&order=scheduled_at.asc",
            id_list
        );

        self.db
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    async fn day_lock(&self, doctor_id: Uuid, day: NaiveDate) -> Arc<Mutex<()>> {
        let mut locks = self.day_locks.lock().await;
        locks
            .entry((doctor_id, day))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops registry entries only the registry itself still references: no
    /// clone outstanding means no booking holds or awaits that lock, so past
    /// days cannot accumulate for the process lifetime.
    async fn evict_idle_day_locks(&self) {
        let mut locks = self.day_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Counts current occupancy for every grid cell the requested interval
    /// touches. Any cell already at capacity rejects the whole booking, which
    /// matches what the grid would render after the insert. Cancelled rows
    /// and rows with unparseable timestamps do not block.
    async fn ensure_capacity(
        &self,
        request: &BookSlotRequest,
        auth_token: Option<&str>,
    ) -> Result<(), BookingError> {
        let requested_end = add_minutes(request.slot_start, request.duration_minutes);

        let records = self
            .fetch_day_appointments(
                request.doctor_id,
                request.slot_start.date_naive(),
                requested_end.date_naive(),
                auth_token,
            )
            .await?;

        let booked: Vec<(DateTime<Utc>, DateTime<Utc>)> = records
            .iter()
            .filter_map(|record| record.booked_interval(self.slot_minutes))
            .collect();

        let mut cell_start = request.slot_start;
        while cell_start < requested_end {
            let cell_end = add_minutes(cell_start, self.slot_minutes);

            let occupancy = booked
                .iter()
                .filter(|(start, end)| *start < cell_end && *end > cell_start)
                .count();

            if occupancy >= self.capacity_per_slot {
                warn!(
                    "Slot {} for doctor {} is at capacity ({} of {})",
                    cell_start, request.doctor_id, occupancy, self.capacity_per_slot
                );
                return Err(BookingError::SlotFull);
            }

            cell_start = cell_end;
        }

        Ok(())
    }

    /// All appointments for the doctor between the start of `from` and the
    /// end of `to`. Same day-bound query the availability feed runs, so the
    /// write path and the grid count from the same rows.
    async fn fetch_day_appointments(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentRecord>, BookingError> {
        let range_start = from.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let range_end = to.and_hms_opt(23, 59, 59).unwrap().and_utc();

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&order=scheduled_at.asc",
            doctor_id,
            range_start.to_rfc3339(),
            range_end.to_rfc3339()
        );

        self.db
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    async fn create_appointment(
        &self,
        request: &BookSlotRequest,
        auth_token: Option<&str>,
    ) -> Result<BookedAppointment, BookingError> {
        let end_at = add_minutes(request.slot_start, request.duration_minutes);
        let now = Utc::now();

        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "branch_id": request.branch_id,
            "scheduled_at": request.slot_start.to_rfc3339(),
            "end_at": end_at.to_rfc3339(),
            "status": PENDING_STATUS,
            "note": request.note,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                auth_token,
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Insert returned no appointment row".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            BookingError::DatabaseError(format!("Failed to parse created appointment: {}", e))
        })
    }
}
