//! Serde-friendly DTOs for the JSON documents the CLI reads and writes.
//!
//! Engine types that already serialize cleanly (`FreeSlot`, `CandidateMeeting`,
//! `NormalizationReport`) are written as-is; these structs only cover the
//! input side and the output envelopes.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use calcompare_engine::{
    CandidateMeeting, FreeSlot, NormalizationReport, QueryWindow, RawEvent, TimeInterval,
    WorkingHours,
};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Input document: a query window plus every participant's raw events.
#[derive(Debug, Deserialize)]
pub struct QueryDocument {
    pub window: WindowInput,
    #[serde(default)]
    pub participants: BTreeMap<String, Vec<RawEvent>>,
}

#[derive(Debug, Deserialize)]
pub struct WindowInput {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub min_duration_minutes: Option<i64>,
    /// Omitted means "everyone must be free".
    #[serde(default)]
    pub quorum: Option<usize>,
    #[serde(default)]
    pub working_hours: Option<WorkingHoursInput>,
}

#[derive(Debug, Deserialize)]
pub struct WorkingHoursInput {
    /// `HH:MM` or `HH:MM:SS`
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub weekdays_only: bool,
}

/// Command-line overrides applied on top of the document's window.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowOverrides {
    pub quorum: Option<usize>,
    pub min_duration_minutes: Option<i64>,
}

impl QueryDocument {
    /// Build the engine query; flags win over the document.
    pub fn query_window(&self, overrides: WindowOverrides) -> Result<QueryWindow> {
        let start = parse_datetime(&self.window.start)?;
        let end = parse_datetime(&self.window.end)?;
        let quorum = overrides
            .quorum
            .or(self.window.quorum)
            .unwrap_or_else(|| self.participants.len().max(1));
        let min_minutes = overrides
            .min_duration_minutes
            .or(self.window.min_duration_minutes)
            .unwrap_or(0);

        let mut window = QueryWindow::new(start, end, quorum)
            .with_min_duration(minutes("min_duration_minutes", min_minutes)?);
        if let Some(hours) = &self.window.working_hours {
            window = window.with_working_hours(hours.to_engine()?);
        }
        Ok(window)
    }

    /// The window as a plain interval (used as the normalization horizon).
    pub fn horizon(&self) -> Result<TimeInterval> {
        let start = parse_datetime(&self.window.start)?;
        let end = parse_datetime(&self.window.end)?;
        TimeInterval::new(start, end).context("window start must be before window end")
    }
}

impl WorkingHoursInput {
    fn to_engine(&self) -> Result<WorkingHours> {
        let tz = match self.time_zone.as_deref() {
            Some(name) => parse_time_zone(name)?,
            None => Tz::UTC,
        };
        let mut hours = WorkingHours::new(parse_time(&self.start)?, parse_time(&self.end)?, tz);
        hours.weekdays_only = self.weekdays_only;
        Ok(hours)
    }
}

/// Output of `calcompare normalize`.
#[derive(Debug, Serialize)]
pub struct NormalizeOutput {
    pub participants: BTreeMap<String, ParticipantBusy>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantBusy {
    pub busy: Vec<TimeInterval>,
    pub report: NormalizationReport,
}

/// Output of `calcompare availability`.
#[derive(Debug, Serialize)]
pub struct AvailabilityOutput {
    pub window: WindowEcho,
    pub slots: Vec<FreeSlot>,
    pub total_slots_found: usize,
    pub total_available_minutes: i64,
    pub diagnostics: BTreeMap<String, NormalizationReport>,
}

/// Output of `calcompare suggest`.
#[derive(Debug, Serialize)]
pub struct SuggestOutput {
    pub window: WindowEcho,
    pub meeting_duration_minutes: i64,
    pub suggestions: Vec<CandidateMeeting>,
    pub diagnostics: BTreeMap<String, NormalizationReport>,
}

/// The effective query, echoed back so callers can see applied defaults.
#[derive(Debug, Serialize)]
pub struct WindowEcho {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_duration_minutes: i64,
    pub quorum: usize,
    pub participant_count: usize,
}

impl WindowEcho {
    pub fn new(window: &QueryWindow, participant_count: usize) -> Self {
        Self {
            start: window.start,
            end: window.end,
            min_duration_minutes: window.min_duration.num_minutes(),
            quorum: window.quorum,
            participant_count,
        }
    }
}

/// Parse an ISO 8601 datetime string into `DateTime<Utc>`.
///
/// Accepts both RFC 3339 (with timezone offset, e.g., "2026-03-16T09:00:00+01:00")
/// and naive local time (e.g., "2026-03-16T09:00:00"), which is interpreted as UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .with_context(|| format!("Invalid datetime '{}'", s))
}

/// Minutes as a `Duration`, rejecting counts chrono cannot represent.
pub fn minutes(name: &str, count: i64) -> Result<Duration> {
    Duration::try_minutes(count)
        .with_context(|| format!("{} of {} minutes is out of range", name, count))
}

pub fn parse_time_zone(name: &str) -> Result<Tz> {
    Ok(calcompare_engine::parse_time_zone(name)?)
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .with_context(|| format!("Invalid time of day '{}', expected HH:MM", s))
}
