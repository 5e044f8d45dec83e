//! Day windows and appointment normalisation.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::model::Appointment;

/// Reference zone in which a monitoring day starts at midnight.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::Berlin;

/// Half-open interval `[start, end)` covering one monitoring day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The day containing `now`, from local midnight in `zone` to 24 hours later.
    pub fn containing(now: DateTime<Utc>, zone: Tz) -> Self {
        let midnight = now
            .with_timezone(&zone)
            .date_naive()
            .and_time(NaiveTime::MIN);
        let start = zone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc());

        Self {
            start,
            end: start + Duration::hours(24),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Keeps open appointments and orders them by start time.
///
/// Providers are expected to do this already; the engine relies on it.
pub fn open_in_order(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.retain(|appointment| !appointment.completed);
    appointments.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    appointments
}
