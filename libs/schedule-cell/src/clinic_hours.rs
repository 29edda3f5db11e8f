use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::calendar::is_weekend;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// One operating window on a wall-clock day, half-open on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoursWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl HoursWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// `start <= time < end`
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Operating-hours policy: a weekday window, a weekend window, and per-date
/// overrides for holidays or branch-specific days. Injected into the grid
/// builder so hours changes never touch the slot algorithm.
#[derive(Debug, Clone)]
pub struct ClinicHours {
    weekday: HoursWindow,
    weekend: HoursWindow,
    overrides: HashMap<NaiveDate, HoursWindow>,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            weekday: HoursWindow::new(hm(9, 0), hm(21, 0)),
            weekend: HoursWindow::new(hm(10, 0), hm(19, 0)),
            overrides: HashMap::new(),
        }
    }
}

impl ClinicHours {
    pub fn new(weekday: HoursWindow, weekend: HoursWindow) -> Self {
        Self {
            weekday,
            weekend,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, date: NaiveDate, window: HoursWindow) -> Self {
        self.overrides.insert(date, window);
        self
    }

    /// The clinic window enforced for one date: override first, then the
    /// weekend/weekday split.
    pub fn window_for(&self, date: NaiveDate) -> HoursWindow {
        if let Some(window) = self.overrides.get(&date) {
            return *window;
        }
        if is_weekend(date) {
            self.weekend
        } else {
            self.weekday
        }
    }

    /// Earliest open to latest close across every configured window. The grid
    /// header spans this; narrower days render their out-of-window labels as
    /// off rather than shrinking the header.
    pub fn header_span(&self) -> HoursWindow {
        let mut start = self.weekday.start.min(self.weekend.start);
        let mut end = self.weekday.end.max(self.weekend.end);

        for window in self.overrides.values() {
            start = start.min(window.start);
            end = end.max(window.end);
        }

        HoursWindow::new(start, end)
    }

    /// "HH:MM" labels from span start to span end inclusive, stepping by
    /// `slot_minutes`. Shared by every day column of a grid.
    pub fn grid_header_labels(&self, slot_minutes: i64) -> Vec<String> {
        if slot_minutes <= 0 {
            return Vec::new();
        }

        let span = self.header_span();
        let last_minute = i64::from(span.end.num_seconds_from_midnight()) / 60;
        let mut minute = i64::from(span.start.num_seconds_from_midnight()) / 60;

        let mut labels = Vec::new();
        while minute <= last_minute {
            labels.push(format!("{:02}:{:02}", minute / 60, minute % 60));
            minute = match minute.checked_add(slot_minutes) {
                Some(next) => next,
                None => break,
            };
        }

        labels
    }
}
