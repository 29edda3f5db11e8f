use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};

/// Strict "YYYY-MM-DD" date key. Malformed input is a soft failure: callers
/// treat `None` as an empty result, never as a fault.
pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Lazy inclusive day sequence. Empty when either bound is malformed or the
/// range is reversed. Clone to restart.
#[derive(Debug, Clone)]
pub struct DateRange {
    cursor: Option<NaiveDate>,
    last: NaiveDate,
}

pub fn date_range_inclusive(from: &str, to: &str) -> DateRange {
    match (parse_date_key(from), parse_date_key(to)) {
        (Some(first), Some(last)) if first <= last => DateRange {
            cursor: Some(first),
            last,
        },
        _ => DateRange {
            cursor: None,
            last: NaiveDate::MIN,
        },
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.cursor?;
        self.cursor = if current < self.last {
            current.succ_opt()
        } else {
            None
        };
        Some(current)
    }
}

/// "HH:MM" (or "HH:MM:SS") time of day; anything unparseable falls back to
/// midnight so a bad label degrades instead of erroring.
pub fn parse_time_of_day(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .unwrap_or(NaiveTime::MIN)
}

/// Places a wall-clock label on the UTC timeline. The whole grid lives on
/// one timeline; there is no per-branch timezone conversion.
pub fn to_instant(date: NaiveDate, time_of_day: &str) -> DateTime<Utc> {
    date.and_time(parse_time_of_day(time_of_day)).and_utc()
}

/// Signed minute shift. A delta the timeline cannot represent leaves the
/// instant unchanged rather than panicking.
pub fn add_minutes(instant: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_milliseconds(minutes.saturating_mul(60_000))
        .and_then(|delta| instant.checked_add_signed(delta))
        .unwrap_or(instant)
}

/// Appointment timestamps arrive as RFC 3339 or as naive "YYYY-MM-DDTHH:MM[:SS]"
/// strings depending on the writer; naive values are taken as UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Short Mongolian weekday label for grid headers.
pub fn weekday_label(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Да",
        Weekday::Tue => "Мя",
        Weekday::Wed => "Лх",
        Weekday::Thu => "Пү",
        Weekday::Fri => "Ба",
        Weekday::Sat => "Бя",
        Weekday::Sun => "Ня",
    }
}
