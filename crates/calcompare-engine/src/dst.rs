//! Resolving naive local wall-clock times to UTC across DST transitions.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AvailabilityError, Result};

/// Longest DST gap we search across. Real-world gaps are 30 or 60 minutes.
const MAX_GAP_MINUTES: i64 = 180;

/// Policy for local times that fall inside a DST gap (spring forward).
///
/// Ambiguous local times (fall back) always resolve to the earlier instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Treat the local time as unresolvable (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the first valid instant after the gap
    #[default]
    ShiftForward,
}

/// Convert a local wall-clock time in `tz` to UTC under `policy`.
///
/// Returns `None` only when the time is in a gap and the policy is
/// [`DstPolicy::Skip`].
pub fn resolve_local(naive: NaiveDateTime, tz: Tz, policy: DstPolicy) -> Option<DateTime<Utc>> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Some(dt.with_timezone(&Utc));
    }

    match policy {
        DstPolicy::Skip => None,
        DstPolicy::ShiftForward => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            tz.from_local_datetime(&(naive + Duration::minutes(minutes)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }),
    }
}

/// Look up an IANA zone name such as `"Europe/Berlin"`.
///
/// # Errors
/// Returns `AvailabilityError::InvalidTimezone` for names chrono-tz does not know.
pub fn parse_time_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AvailabilityError::InvalidTimezone(name.to_string()))
}
