use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::models::{AppointmentDetail, Availability, SlotStatus};

/// Booking intent raised by the grid: the chosen slot start plus the
/// treatment duration picked in the confirmation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotBooking {
    pub slot_start: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Write-path collaborator the grid hands intents to. The grid itself never
/// creates appointments.
#[async_trait]
pub trait BookingGateway: Send + Sync {
    async fn create_booking(&self, intent: SlotBooking) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
struct PendingBooking {
    date: NaiveDate,
    label: String,
}

fn flip_booked(grid: &mut Availability, date: NaiveDate, label: &str) {
    if let Some(index) = grid.label_index(label) {
        if let Some(day) = grid.days.iter_mut().find(|d| d.date == date) {
            if let Some(slot) = day.slots.get_mut(index) {
                slot.status = SlotStatus::Booked;
            }
        }
    }
}

/// Interaction state over the computed availability: an immutable confirmed
/// snapshot plus at most one optimistic pending booking layered on top. A
/// failed booking discards the overlay and the confirmed grid is what the
/// user sees again; a successful one merges it and asks for a reconciling
/// refetch.
pub struct GridController<G> {
    gateway: G,
    confirmed: Availability,
    pending: Option<PendingBooking>,
    selection: Option<(NaiveDate, String)>,
    generation: u64,
    error: Option<String>,
    needs_reconcile: bool,
}

impl<G: BookingGateway> GridController<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            confirmed: Availability {
                time_labels: Vec::new(),
                days: Vec::new(),
            },
            pending: None,
            selection: None,
            generation: 0,
            error: None,
            needs_reconcile: false,
        }
    }

    /// Start a grid fetch; the returned token must accompany the result.
    /// Starting a newer fetch invalidates every earlier token.
    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Land a fetch result. Results carrying a superseded token are dropped
    /// so a slow response can never paint over a newer grid. A failed fetch
    /// keeps the previous grid on screen and only surfaces the message.
    pub fn apply_loaded(&mut self, token: u64, result: Result<Availability, String>) {
        if token != self.generation {
            debug!(
                "Discarding stale grid fetch (token {}, current {})",
                token, self.generation
            );
            return;
        }

        match result {
            Ok(grid) => {
                self.confirmed = grid;
                self.pending = None;
                self.selection = None;
                self.error = None;
                self.needs_reconcile = false;
            }
            Err(message) => {
                warn!("Grid fetch failed: {}", message);
                self.error = Some(message);
            }
        }
    }

    /// Selecting an available slot opens the duration-choice step; booked and
    /// off slots are not selectable. Nothing else changes until the duration
    /// is confirmed.
    pub fn select_slot(&mut self, date: NaiveDate, label: &str) -> bool {
        let selectable = matches!(self.visible_status(date, label), Some(SlotStatus::Available));
        if selectable {
            self.selection = Some((date, label.to_string()));
        }
        selectable
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<(NaiveDate, &str)> {
        self.selection
            .as_ref()
            .map(|(date, label)| (*date, label.as_str()))
    }

    /// Confirm the chosen duration for the selected slot: flip that one slot
    /// to booked optimistically, raise the intent through the gateway, then
    /// either keep the merge (flagged for a reconciling refetch) or roll the
    /// overlay back and surface the failure inline.
    pub async fn confirm_booking(&mut self, duration_minutes: i64) -> bool {
        if duration_minutes <= 0 {
            self.error = Some("Duration must be a positive number of minutes".to_string());
            return false;
        }

        let (date, label) = match self.selection.clone() {
            Some(selection) => selection,
            None => {
                self.error = Some("No slot selected".to_string());
                return false;
            }
        };

        let slot_start = match self.confirmed.slot(date, &label) {
            Some(slot) => slot.start,
            None => {
                self.error = Some("Selected slot is no longer on the grid".to_string());
                return false;
            }
        };

        self.pending = Some(PendingBooking {
            date,
            label: label.clone(),
        });
        self.error = None;

        let intent = SlotBooking {
            slot_start,
            duration_minutes,
        };

        match self.gateway.create_booking(intent).await {
            Ok(()) => {
                if let Some(pending) = self.pending.take() {
                    flip_booked(&mut self.confirmed, pending.date, &pending.label);
                }
                self.selection = None;
                self.needs_reconcile = true;
                true
            }
            Err(e) => {
                warn!("Booking failed, rolling back optimistic slot: {}", e);
                self.pending = None;
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// The grid as the user sees it: confirmed snapshot with the pending
    /// overlay applied.
    pub fn grid(&self) -> Availability {
        let mut view = self.confirmed.clone();
        if let Some(pending) = &self.pending {
            flip_booked(&mut view, pending.date, &pending.label);
        }
        view
    }

    fn visible_status(&self, date: NaiveDate, label: &str) -> Option<SlotStatus> {
        if let Some(pending) = &self.pending {
            if pending.date == date && pending.label == label {
                return Some(SlotStatus::Booked);
            }
        }
        self.confirmed.slot(date, label).map(|slot| slot.status)
    }

    /// Read-only records behind a booked slot, resolved against the flat list
    /// supplied by the appointment collaborator. Ids missing from the list
    /// are skipped silently; the result is ordered by scheduled time for
    /// display.
    pub fn booked_slot_details(
        &self,
        date: NaiveDate,
        label: &str,
        records: &[AppointmentDetail],
    ) -> Vec<AppointmentDetail> {
        let ids = match self
            .confirmed
            .slot(date, label)
            .and_then(|slot| slot.appointment_ids.as_ref())
        {
            Some(ids) => ids,
            None => return Vec::new(),
        };

        let mut details: Vec<AppointmentDetail> = ids
            .iter()
            .filter_map(|id| records.iter().find(|record| record.id == *id).cloned())
            .collect();
        details.sort_by_key(|record| record.scheduled_at);
        details
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True after a successful booking until the next fetch lands; the owner
    /// should refetch so the optimistic merge is replaced by server truth.
    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }
}
