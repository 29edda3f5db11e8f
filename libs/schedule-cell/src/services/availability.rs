use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::rest::ClinicDbClient;

use crate::calendar::{
    add_minutes, date_range_inclusive, parse_date_key, parse_time_of_day,
    to_instant, weekday_label,
};
use crate::clinic_hours::ClinicHours;
use crate::models::{
    AppointmentRecord, Availability, DayColumn, GridQueryRequest, ScheduleError, Slot,
    SlotStatus, WorkingWindow, CANCELLED_STATUS, DEFAULT_CAPACITY_PER_SLOT,
    DEFAULT_SLOT_MINUTES, MAX_SLOT_MINUTES,
};

/// Appointment reduced to the interval that matters for overlap counting.
struct BookedInterval {
    id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Pure day × time-slot matrix computation. No I/O, no hidden state:
/// identical inputs always produce a structurally identical grid.
#[derive(Debug, Clone)]
pub struct SlotGridBuilder {
    hours: ClinicHours,
    slot_minutes: i64,
    capacity_per_slot: usize,
}

impl Default for SlotGridBuilder {
    fn default() -> Self {
        Self {
            hours: ClinicHours::default(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            capacity_per_slot: DEFAULT_CAPACITY_PER_SLOT,
        }
    }
}

impl SlotGridBuilder {
    /// `slot_minutes` must be in `1..=MAX_SLOT_MINUTES` and
    /// `capacity_per_slot` positive; the request layer rejects anything else
    /// before a builder is constructed.
    pub fn new(hours: ClinicHours, slot_minutes: i64, capacity_per_slot: usize) -> Self {
        Self {
            hours,
            slot_minutes,
            capacity_per_slot,
        }
    }

    pub fn header_labels(&self) -> Vec<String> {
        self.hours.grid_header_labels(self.slot_minutes)
    }

    /// Build the availability grid for an inclusive date range.
    ///
    /// Malformed calendar input degrades instead of failing: a bad range
    /// yields a grid with no days, a window with an unparseable date
    /// contributes to no day, and days without any window come back fully
    /// off with the `no_schedule` flag set.
    pub fn build(
        &self,
        date_from: &str,
        date_to: &str,
        windows: &[WorkingWindow],
        appointments: &[AppointmentRecord],
    ) -> Availability {
        let time_labels = self.header_labels();
        let windows_by_date = group_windows_by_date(windows);
        let booked = self.normalize_appointments(appointments);

        let days = date_range_inclusive(date_from, date_to)
            .map(|date| {
                let day_windows = windows_by_date
                    .get(&date)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                self.build_day(date, &time_labels, day_windows, &booked)
            })
            .collect();

        Availability { time_labels, days }
    }

    fn build_day(
        &self,
        date: NaiveDate,
        time_labels: &[String],
        day_windows: &[(NaiveTime, NaiveTime)],
        booked: &[BookedInterval],
    ) -> DayColumn {
        let clinic = self.hours.window_for(date);
        let no_schedule = day_windows.is_empty();

        let slots = time_labels
            .iter()
            .map(|label| {
                let start = to_instant(date, label);
                let end = add_minutes(start, self.slot_minutes);
                let label_time = parse_time_of_day(label);

                // A day without a recorded schedule is fully closed, and the
                // clinic window caps every working window that claims more.
                let bookable = !no_schedule
                    && clinic.contains(label_time)
                    && day_windows
                        .iter()
                        .any(|(from, until)| *from <= label_time && label_time < *until);

                if !bookable {
                    return Slot {
                        start,
                        end,
                        status: SlotStatus::Off,
                        appointment_ids: None,
                    };
                }

                let overlapping: Vec<Uuid> = booked
                    .iter()
                    .filter(|interval| interval.start < end && interval.end > start)
                    .map(|interval| interval.id)
                    .collect();

                if overlapping.len() >= self.capacity_per_slot {
                    Slot {
                        start,
                        end,
                        status: SlotStatus::Booked,
                        appointment_ids: Some(
                            overlapping
                                .into_iter()
                                .take(self.capacity_per_slot)
                                .collect(),
                        ),
                    }
                } else {
                    Slot {
                        start,
                        end,
                        status: SlotStatus::Available,
                        appointment_ids: None,
                    }
                }
            })
            .collect();

        DayColumn {
            date,
            day_label: weekday_label(date).to_string(),
            no_schedule,
            slots,
        }
    }

    /// Filter and normalize the appointment feed once per build; the result
    /// is shared across every slot of every day.
    fn normalize_appointments(&self, records: &[AppointmentRecord]) -> Vec<BookedInterval> {
        records
            .iter()
            .filter(|record| record.status != CANCELLED_STATUS)
            .filter_map(|record| match record.booked_interval(self.slot_minutes) {
                Some((start, end)) => Some(BookedInterval {
                    id: record.id,
                    start,
                    end,
                }),
                None => {
                    warn!(
                        "Dropping appointment {} with unparseable start {:?}",
                        record.id, record.scheduled_at
                    );
                    None
                }
            })
            .collect()
    }
}

fn group_windows_by_date(
    windows: &[WorkingWindow],
) -> HashMap<NaiveDate, Vec<(NaiveTime, NaiveTime)>> {
    let mut grouped: HashMap<NaiveDate, Vec<(NaiveTime, NaiveTime)>> = HashMap::new();

    for window in windows {
        let date = match parse_date_key(&window.date) {
            Some(date) => date,
            None => {
                warn!("Ignoring working window with unparseable date {:?}", window.date);
                continue;
            }
        };

        grouped.entry(date).or_default().push((
            parse_time_of_day(&window.start_time),
            parse_time_of_day(&window.end_time),
        ));
    }

    grouped
}

fn parse_range(date_from: &str, date_to: &str) -> Result<(NaiveDate, NaiveDate), ScheduleError> {
    let from = parse_date_key(date_from).ok_or_else(|| {
        ScheduleError::InvalidDateRange(format!("date_from {:?} is not YYYY-MM-DD", date_from))
    })?;
    let to = parse_date_key(date_to).ok_or_else(|| {
        ScheduleError::InvalidDateRange(format!("date_to {:?} is not YYYY-MM-DD", date_to))
    })?;

    Ok((from, to))
}

/// Read side of the availability engine: pulls the two feeds from the data
/// plane and runs the builder. Caller credentials are forwarded per request.
pub struct AvailabilityService {
    db: ClinicDbClient,
    hours: ClinicHours,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: ClinicDbClient::new(config),
            hours: ClinicHours::default(),
        }
    }

    pub fn with_hours(config: &AppConfig, hours: ClinicHours) -> Self {
        Self {
            db: ClinicDbClient::new(config),
            hours,
        }
    }

    /// Feed A: one doctor's working windows at one branch over a date range.
    pub async fn fetch_working_windows(
        &self,
        doctor_id: Uuid,
        branch_id: Uuid,
        date_from: &str,
        date_to: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<WorkingWindow>, ScheduleError> {
        let (from, to) = parse_range(date_from, date_to)?;

        debug!(
            "Fetching working windows for doctor {} at branch {} over {}..{}",
            doctor_id, branch_id, from, to
        );

        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&branch_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            doctor_id, branch_id, from, to
        );

        self.db
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))
    }

    /// Feed B: the doctor's appointments whose start falls inside the range's
    /// day bounds.
    pub async fn fetch_appointments(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<AppointmentRecord>, ScheduleError> {
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
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))
    }

    /// Fetch both feeds concurrently and build the slot grid.
    pub async fn slot_grid(
        &self,
        doctor_id: Uuid,
        request: GridQueryRequest,
        auth_token: Option<&str>,
    ) -> Result<Availability, ScheduleError> {
        let slot_minutes = request.slot_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
        if slot_minutes <= 0 || slot_minutes > MAX_SLOT_MINUTES {
            return Err(ScheduleError::InvalidSlotMinutes(slot_minutes));
        }

        let capacity_per_slot = match request.capacity_per_slot {
            Some(capacity) if capacity <= 0 => return Err(ScheduleError::InvalidCapacity),
            Some(capacity) => capacity as usize,
            None => DEFAULT_CAPACITY_PER_SLOT,
        };

        let (from, to) = parse_range(&request.date_from, &request.date_to)?;
        let builder = SlotGridBuilder::new(self.hours.clone(), slot_minutes, capacity_per_slot);

        // A reversed range is an empty grid, not an error; skip the feeds.
        if to < from {
            debug!("Empty range {}..{} for doctor {}", from, to, doctor_id);
            return Ok(Availability {
                time_labels: builder.header_labels(),
                days: Vec::new(),
            });
        }

        let (windows, appointments) = tokio::try_join!(
            self.fetch_working_windows(
                doctor_id,
                request.branch_id,
                &request.date_from,
                &request.date_to,
                auth_token
            ),
            self.fetch_appointments(doctor_id, from, to, auth_token),
        )?;

        debug!(
            "Building grid for doctor {}: {} windows, {} appointments",
            doctor_id,
            windows.len(),
            appointments.len()
        );

        Ok(builder.build(&request.date_from, &request.date_to, &windows, &appointments))
    }
}
