//! Busy-interval normalization.
//!
//! Converts heterogeneous calendar events (timed or all-day, any zone,
//! optionally recurring) into a merged list of half-open UTC busy intervals.
//! Problems are per event: a bad event is skipped and counted, and the rest of
//! the participant's calendar is still processed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dst::{parse_time_zone, resolve_local, DstPolicy};
use crate::error::{AvailabilityError, Result};
use crate::interval::{merge_intervals, TimeInterval};
use crate::recurrence::{self, DEFAULT_MAX_INSTANCES};

/// Naive timestamp layouts accepted when no offset is present.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Start or end of a calendar event, shaped like the Google Calendar API.
///
/// Exactly one of `date` (all-day) or `date_time` is expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    /// `YYYY-MM-DD` for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// RFC 3339 timestamp, or a naive ISO timestamp interpreted in `time_zone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// IANA zone name (e.g., "America/New_York").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn date_time(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn date(value: impl Into<String>) -> Self {
        Self {
            date: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn in_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }

    fn is_all_day(&self) -> bool {
        self.date.is_some() && self.date_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
    #[serde(other)]
    Other,
}

/// A calendar event as supplied by the calendar-fetch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    pub start: EventTime,
    /// Missing on all-day events means "one day".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    /// RFC 5545 RRULE/EXDATE/RDATE lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
}

impl RawEvent {
    /// A timed event from two timestamps (RFC 3339 or naive).
    pub fn timed(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::new(EventTime::date_time(start), Some(EventTime::date_time(end)))
    }

    /// An all-day event covering `[start_date, end_date)`.
    pub fn all_day(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self::new(EventTime::date(start_date), Some(EventTime::date(end_date)))
    }

    pub fn new(start: EventTime, end: Option<EventTime>) -> Self {
        Self {
            id: None,
            status: EventStatus::Confirmed,
            start,
            end,
            recurrence: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the zone on both start and end.
    pub fn in_zone(mut self, tz: &str) -> Self {
        self.start.time_zone = Some(tz.to_string());
        if let Some(end) = self.end.as_mut() {
            end.time_zone = Some(tz.to_string());
        }
        self
    }

    pub fn with_recurrence<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recurrence = lines.into_iter().map(Into::into).collect();
        self
    }
}

/// Knobs for event normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Zone for events that carry neither an offset nor a `timeZone`
    /// (typically the calendar's own zone). `None` falls back to UTC with a
    /// warning.
    pub default_time_zone: Option<Tz>,
    pub dst_policy: DstPolicy,
    /// Whether all-day events block the whole day.
    pub all_day_blocks: bool,
    pub max_recurrence_instances: u16,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_time_zone: None,
            dst_policy: DstPolicy::default(),
            all_day_blocks: true,
            max_recurrence_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

/// One diagnostic about a single event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventIssue {
    pub event_id: Option<String>,
    pub message: String,
}

/// Per-participant normalization diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    /// Events dropped as invalid.
    pub skipped_events: usize,
    pub cancelled_events: usize,
    /// All-day events ignored because `all_day_blocks` is off.
    pub all_day_ignored: usize,
    /// Events with no resolvable zone that were read as UTC.
    pub defaulted_to_utc: usize,
    /// Busy instances produced by recurrence expansion.
    pub expanded_instances: usize,
    /// Recurring events cut short by `max_recurrence_instances`.
    pub truncated_series: usize,
    pub issues: Vec<EventIssue>,
}

impl NormalizationReport {
    fn record(&mut self, event: &RawEvent, message: String) {
        self.issues.push(EventIssue {
            event_id: event.id.clone(),
            message,
        });
    }
}

/// Result of normalizing one participant's calendar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBusy {
    /// Merged busy intervals, ascending, non-overlapping and non-touching.
    pub busy: Vec<TimeInterval>,
    pub report: NormalizationReport,
}

/// Normalize one participant's raw events into merged UTC busy intervals.
///
/// `horizon` bounds recurrence expansion; single events are kept whole even
/// if they stick out of it.
pub fn normalize_events(
    events: &[RawEvent],
    horizon: &TimeInterval,
    options: &NormalizeOptions,
) -> NormalizedBusy {
    let mut report = NormalizationReport::default();
    let mut busy = Vec::with_capacity(events.len());

    for event in events {
        if event.status == EventStatus::Cancelled {
            report.cancelled_events += 1;
            continue;
        }
        if event.start.is_all_day() && !options.all_day_blocks {
            report.all_day_ignored += 1;
            continue;
        }

        match normalize_event(event, horizon, options) {
            Ok(normalized) => {
                if normalized.defaulted_to_utc {
                    report.defaulted_to_utc += 1;
                    warn!(
                        event_id = event.id.as_deref().unwrap_or("<none>"),
                        "no resolvable time zone, reading event as UTC"
                    );
                    report.record(event, "no resolvable time zone, read as UTC".to_string());
                }
                if normalized.recurring {
                    report.expanded_instances += normalized.intervals.len();
                }
                if normalized.truncated {
                    report.truncated_series += 1;
                    warn!(
                        event_id = event.id.as_deref().unwrap_or("<none>"),
                        max_instances = options.max_recurrence_instances,
                        "recurring event truncated at instance cap"
                    );
                    report.record(
                        event,
                        format!(
                            "recurrence truncated at {} instances; later instances are not busy",
                            options.max_recurrence_instances
                        ),
                    );
                }
                busy.extend(normalized.intervals);
            }
            Err(e) => {
                report.skipped_events += 1;
                warn!(
                    event_id = event.id.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "skipping calendar event"
                );
                report.record(event, e.to_string());
            }
        }
    }

    NormalizedBusy {
        busy: merge_intervals(busy),
        report,
    }
}

struct NormalizedEvent {
    intervals: Vec<TimeInterval>,
    defaulted_to_utc: bool,
    recurring: bool,
    truncated: bool,
}

struct ResolvedTime {
    at: DateTime<Utc>,
    /// Zone the time was read in, if one was resolvable.
    zone: Option<Tz>,
    defaulted_to_utc: bool,
}

impl ResolvedTime {
    fn tz(&self) -> Tz {
        self.zone.unwrap_or(Tz::UTC)
    }
}

fn normalize_event(
    event: &RawEvent,
    horizon: &TimeInterval,
    options: &NormalizeOptions,
) -> Result<NormalizedEvent> {
    let start = resolve_time(&event.start, None, options)?;

    let (end_at, end_defaulted) = match &event.end {
        // An end without its own zone is read in the start's zone.
        Some(end) => {
            let end = resolve_time(end, start.zone, options)?;
            (end.at, end.defaulted_to_utc)
        }
        None if event.start.is_all_day() => {
            // One local day, not 24 hours: DST days are 23 or 25 hours long.
            let date = parse_date(&event.start)?;
            let next = date.succ_opt().ok_or_else(|| {
                AvailabilityError::InvalidEvent(format!("date out of range: {}", date))
            })?;
            let at = resolve_naive(midnight(next), start.tz(), options.dst_policy)?;
            (at, false)
        }
        None => {
            return Err(AvailabilityError::InvalidEvent(
                "timed event has no end".to_string(),
            ))
        }
    };

    let first = TimeInterval::new(start.at, end_at).map_err(|_| {
        AvailabilityError::InvalidEvent(format!(
            "end {} is not after start {}",
            end_at.to_rfc3339(),
            start.at.to_rfc3339()
        ))
    })?;

    let defaulted_to_utc = start.defaulted_to_utc || end_defaulted;

    if recurrence::has_rule(&event.recurrence) {
        let expansion = recurrence::expand_recurrence(
            &event.recurrence,
            &first,
            start.tz(),
            horizon,
            options.max_recurrence_instances,
        )
        .map_err(|e| AvailabilityError::InvalidEvent(e.to_string()))?;
        return Ok(NormalizedEvent {
            intervals: expansion.busy,
            defaulted_to_utc,
            recurring: true,
            truncated: expansion.truncated,
        });
    }

    Ok(NormalizedEvent {
        intervals: vec![first],
        defaulted_to_utc,
        recurring: false,
        truncated: false,
    })
}

/// Zone chain: the time's own `timeZone`, then `inherited`, then the
/// configured default. `None` means nothing resolvable.
fn lookup_zone(
    time: &EventTime,
    inherited: Option<Tz>,
    options: &NormalizeOptions,
) -> Option<Tz> {
    time.time_zone
        .as_deref()
        .and_then(|name| parse_time_zone(name).ok())
        .or(inherited)
        .or(options.default_time_zone)
}

fn resolve_time(
    time: &EventTime,
    inherited: Option<Tz>,
    options: &NormalizeOptions,
) -> Result<ResolvedTime> {
    let zone = lookup_zone(time, inherited, options);

    if let Some(raw) = time.date_time.as_deref() {
        // An explicit offset pins the instant; the zone only matters for recurrence.
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ResolvedTime {
                at: dt.with_timezone(&Utc),
                zone,
                defaulted_to_utc: false,
            });
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| {
                AvailabilityError::InvalidEvent(format!("unparsable dateTime '{}'", raw))
            })?;
        return Ok(ResolvedTime {
            at: resolve_naive(naive, zone.unwrap_or(Tz::UTC), options.dst_policy)?,
            zone,
            defaulted_to_utc: zone.is_none(),
        });
    }

    if time.date.is_some() {
        let date = parse_date(time)?;
        return Ok(ResolvedTime {
            at: resolve_naive(midnight(date), zone.unwrap_or(Tz::UTC), options.dst_policy)?,
            zone,
            defaulted_to_utc: zone.is_none(),
        });
    }

    Err(AvailabilityError::InvalidEvent(
        "event time has neither date nor dateTime".to_string(),
    ))
}

fn parse_date(time: &EventTime) -> Result<NaiveDate> {
    let raw = time.date.as_deref().unwrap_or_default();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AvailabilityError::InvalidEvent(format!("unparsable date '{}'", raw)))
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn resolve_naive(naive: NaiveDateTime, tz: Tz, policy: DstPolicy) -> Result<DateTime<Utc>> {
    resolve_local(naive, tz, policy).ok_or_else(|| {
        AvailabilityError::InvalidEvent(format!(
            "local time {} does not exist in {}",
            naive,
            tz.name()
        ))
    })
}
