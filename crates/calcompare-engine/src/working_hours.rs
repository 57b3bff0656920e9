//! Daily working-hours masks.
//!
//! A mask is the list of UTC intervals, inside a query window, that fall within
//! local working hours in a given zone. Free time outside the mask is not
//! offered for meetings.

use chrono::{Datelike, Days, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{AvailabilityError, Result};
use crate::interval::TimeInterval;

/// Local working hours applied to every day of a query window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub time_zone: Tz,
    /// Drop Saturdays and Sundays entirely.
    #[serde(default)]
    pub weekdays_only: bool,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime, time_zone: Tz) -> Self {
        Self {
            start,
            end,
            time_zone,
            weekdays_only: false,
        }
    }

    pub fn weekdays_only(mut self) -> Self {
        self.weekdays_only = true;
        self
    }
}

impl Default for WorkingHours {
    /// 09:00-17:00 UTC, every day.
    fn default() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            Tz::UTC,
        )
    }
}

/// Build the working-hours mask for `window`.
///
/// Days are walked in the mask's local zone; each day's `[start, end)` is
/// resolved to UTC (gap times shift forward) and clipped to the window.
///
/// # Errors
/// Returns `AvailabilityError::InvalidQuery` if `hours.start >= hours.end`.
pub fn working_hours_mask(
    hours: &WorkingHours,
    window: &TimeInterval,
) -> Result<Vec<TimeInterval>> {
    if hours.start >= hours.end {
        return Err(AvailabilityError::InvalidQuery(format!(
            "working hours start {} must be before end {}",
            hours.start, hours.end
        )));
    }

    let tz = hours.time_zone;
    let first_day = window.start().with_timezone(&tz).date_naive();
    let last_day = window.end().with_timezone(&tz).date_naive();

    let mut mask = Vec::new();
    let mut day = first_day;
    while day <= last_day {
        let skip = hours.weekdays_only && matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        if !skip {
            let start = resolve_local(day.and_time(hours.start), tz, DstPolicy::ShiftForward);
            let end = resolve_local(day.and_time(hours.end), tz, DstPolicy::ShiftForward);
            if let (Some(start), Some(end)) = (start, end) {
                if let Some(clipped) = TimeInterval::new(start, end)
                    .ok()
                    .and_then(|iv| iv.clip(window))
                {
                    mask.push(clipped);
                }
            }
        }
        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn one_interval_per_day_clipped_to_window() {
        let window = TimeInterval::new(
            Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 18, 10, 0, 0).unwrap(),
        )
        .unwrap();
        let mask = working_hours_mask(&WorkingHours::default(), &window).unwrap();

        assert_eq!(mask.len(), 3);
        assert_eq!(mask[0].start(), Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap());
        assert_eq!(mask[0].end(), Utc.with_ymd_and_hms(2026, 3, 16, 17, 0, 0).unwrap());
        assert_eq!(mask[2].end(), Utc.with_ymd_and_hms(2026, 3, 18, 10, 0, 0).unwrap());
    }

    #[test]
    fn inverted_hours_rejected() {
        let window = TimeInterval::new(
            Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 17, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let hours = WorkingHours::new(hm(17, 0), hm(9, 0), Tz::UTC);
        assert!(matches!(
            working_hours_mask(&hours, &window),
            Err(AvailabilityError::InvalidQuery(_))
        ));
    }
}
