//! Recurring-event expansion -- turns a master event plus its RFC 5545
//! recurrence lines into concrete busy intervals inside a horizon.
//!
//! Recurrence lines use the Google Calendar `recurrence` field format, e.g.
//! `["RRULE:FREQ=WEEKLY;BYDAY=MO,WE", "EXDATE;TZID=Europe/Berlin:20260323T090000"]`.
//! Expansion is delegated to the `rrule` crate; wall-clock times are kept in
//! the master event's zone so instances follow DST like the organiser sees them.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{AvailabilityError, Result};
use crate::interval::TimeInterval;

/// Default cap on instances produced per recurring event.
pub const DEFAULT_MAX_INSTANCES: u16 = 500;

/// Instances of one recurring event inside a horizon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// Sorted instances overlapping the horizon.
    pub busy: Vec<TimeInterval>,
    /// The instance cap was hit, so later instances in the horizon are missing.
    pub truncated: bool,
}

/// True if the recurrence lines contain at least one `RRULE:` line.
pub fn has_rule(recurrence: &[String]) -> bool {
    recurrence
        .iter()
        .any(|line| line.trim().to_uppercase().starts_with("RRULE:"))
}

/// Expand a recurring event into busy intervals overlapping `horizon`.
///
/// At most `max_instances` instances are produced; [`Expansion::truncated`]
/// reports when the cap cut the series short.
///
/// # Arguments
/// - `recurrence` -- RRULE/EXDATE/RDATE lines; other lines are ignored
/// - `first` -- the master (first) instance, already in UTC
/// - `tz` -- zone whose wall clock the rule repeats in
/// - `horizon` -- only instances overlapping this interval are returned
/// - `max_instances` -- hard cap on instances considered
///
/// # Errors
/// Returns `AvailabilityError::InvalidRule` if there is no RRULE line or the
/// rule text cannot be parsed.
pub fn expand_recurrence(
    recurrence: &[String],
    first: &TimeInterval,
    tz: Tz,
    horizon: &TimeInterval,
    max_instances: u16,
) -> Result<Expansion> {
    if !has_rule(recurrence) {
        return Err(AvailabilityError::InvalidRule(
            "no RRULE line in recurrence".to_string(),
        ));
    }

    // Series that only begin after the horizon contribute nothing.
    if first.start() >= horizon.end() {
        return Ok(Expansion::default());
    }

    let duration = first.duration();
    let tz_name = tz.name();
    let dtstart_ical = first
        .start()
        .with_timezone(&tz)
        .naive_local()
        .format("%Y%m%dT%H%M%S")
        .to_string();

    // The rrule crate requires UNTIL and DTSTART to share the same timezone.
    // For UTC, UNTIL must end with "Z"; for other timezones, use bare local time.
    let mut until_ical = horizon
        .end()
        .with_timezone(&tz)
        .naive_local()
        .format("%Y%m%dT%H%M%S")
        .to_string();
    if tz == Tz::UTC {
        until_ical.push('Z');
    }

    let mut lines = vec![format!("DTSTART;TZID={}:{}", tz_name, dtstart_ical)];
    for raw in recurrence {
        let line = raw.trim();
        let upper = line.to_uppercase();
        if upper.starts_with("RRULE:") {
            // Bound open-ended rules by the horizon so expansion terminates early.
            if upper.contains("UNTIL=") || upper.contains("COUNT=") {
                lines.push(line.to_string());
            } else {
                lines.push(format!("{};UNTIL={}", line, until_ical));
            }
        } else if upper.starts_with("EXDATE") || upper.starts_with("RDATE") {
            lines.push(line.to_string());
        }
    }
    let rrule_text = lines.join("\n");

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| AvailabilityError::InvalidRule(format!("{}", e)))?;

    // Start just before the earliest instance that could still overlap the
    // horizon, so long-running series do not burn the instance cap on history.
    let after: DateTime<Utc> = horizon.start() - duration - Duration::seconds(1);
    let rrule_set = if after > first.start() {
        rrule_set.after(after.with_timezone(&rrule::Tz::UTC))
    } else {
        rrule_set
    };

    let instances = rrule_set.all(max_instances);
    let truncated = instances.limited;

    let mut busy: Vec<TimeInterval> = instances
        .dates
        .into_iter()
        .filter_map(|dt| {
            let start: DateTime<Utc> = dt.with_timezone(&Utc);
            TimeInterval::new(start, start.checked_add_signed(duration)?).ok()
        })
        .filter(|interval| interval.overlaps(horizon))
        .collect();

    busy.sort_unstable();
    Ok(Expansion { busy, truncated })
}
