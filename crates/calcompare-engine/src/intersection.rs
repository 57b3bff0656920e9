//! Multi-party availability intersection.
//!
//! Derives each participant's free time inside a query window, then sweeps all
//! free intervals on one timeline to find where at least `quorum` participants
//! are free at once. Slots shorter than the window's minimum duration are
//! dropped.
//!
//! All arithmetic is on `DateTime<Utc>` (integer seconds + nanoseconds); there
//! is no floating point anywhere in the interval math.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::error::{AvailabilityError, Result};
use crate::interval::{
    complement_within, intersect_sorted, ParticipantBusySet, ParticipantId, TimeInterval,
};
use crate::normalizer::{normalize_events, NormalizationReport, NormalizeOptions, RawEvent};
use crate::working_hours::{working_hours_mask, WorkingHours};

/// What to search for and where.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Slots shorter than this are discarded.
    pub min_duration: Duration,
    /// Minimum number of participants that must be free simultaneously.
    pub quorum: usize,
    /// Restrict free time to daily local working hours.
    pub working_hours: Option<WorkingHours>,
}

impl QueryWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, quorum: usize) -> Self {
        Self {
            start,
            end,
            min_duration: Duration::zero(),
            quorum,
            working_hours: None,
        }
    }

    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration;
        self
    }

    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = Some(hours);
        self
    }

    /// The window as an interval, validating everything that does not depend
    /// on the participant count.
    pub fn interval(&self) -> Result<TimeInterval> {
        if self.quorum == 0 {
            return Err(AvailabilityError::InvalidQuery(
                "quorum must be at least 1".to_string(),
            ));
        }
        if self.min_duration < Duration::zero() {
            return Err(AvailabilityError::InvalidQuery(format!(
                "min_duration must not be negative (got {} minutes)",
                self.min_duration.num_minutes()
            )));
        }
        TimeInterval::new(self.start, self.end).map_err(|_| {
            AvailabilityError::InvalidQuery(format!(
                "window start {} must be before end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            ))
        })
    }
}

/// A window in which at least `quorum` participants are free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    /// `present_ids.len()`.
    pub present_count: usize,
    /// Everyone who is free at some point during the slot.
    pub present_ids: BTreeSet<ParticipantId>,
    /// Number of participants in the query the slot came from.
    pub participant_count: usize,
    /// Quorum the slot was found under.
    #[serde(default)]
    pub quorum: usize,
    /// Each present participant's free time, clipped to the slot. Empty means
    /// every `present_ids` member is free for the whole slot.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub free_spans: BTreeMap<ParticipantId, Vec<TimeInterval>>,
}

impl FreeSlot {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Participants free for all of `span`. Empty if `span` leaves the slot.
    pub fn free_throughout(&self, span: &TimeInterval) -> BTreeSet<ParticipantId> {
        if span.start() < self.start || span.end() > self.end {
            return BTreeSet::new();
        }
        if self.free_spans.is_empty() {
            return self.present_ids.clone();
        }
        self.free_spans
            .iter()
            .filter(|(_, spans)| spans.iter().any(|free| free.covers(span)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// `present_count / participant_count`, or 0 for an empty query.
    pub fn coverage(&self) -> f64 {
        if self.participant_count == 0 {
            0.0
        } else {
            self.present_count as f64 / self.participant_count as f64
        }
    }
}

/// Result of [`compute_availability`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Availability {
    /// Quorum-free slots, ascending by start.
    pub slots: Vec<FreeSlot>,
    /// Per-participant normalization diagnostics.
    pub diagnostics: BTreeMap<ParticipantId, NormalizationReport>,
}

impl Availability {
    /// Total events skipped as invalid across all participants.
    pub fn skipped_events(&self) -> usize {
        self.diagnostics.values().map(|r| r.skipped_events).sum()
    }
}

/// Compute quorum availability straight from raw calendar events with default
/// normalization options.
pub fn compute_availability(
    participants: &BTreeMap<ParticipantId, Vec<RawEvent>>,
    window: &QueryWindow,
) -> Result<Availability> {
    compute_availability_with(participants, window, &NormalizeOptions::default())
}

/// Compute quorum availability from raw calendar events.
///
/// # Errors
/// Returns `AvailabilityError::InvalidQuery` when the window is empty or
/// inverted, the quorum is 0 or exceeds the participant count, the minimum
/// duration is negative, or the working hours are inverted. No partial result
/// is returned in those cases. Bad individual events never fail the call; they
/// show up in [`Availability::diagnostics`].
pub fn compute_availability_with(
    participants: &BTreeMap<ParticipantId, Vec<RawEvent>>,
    window: &QueryWindow,
    options: &NormalizeOptions,
) -> Result<Availability> {
    let horizon = window.interval()?;
    if participants.is_empty() {
        return Ok(Availability::default());
    }
    check_quorum(window.quorum, participants.len())?;

    let mut busy_set = ParticipantBusySet::new();
    let mut diagnostics = BTreeMap::new();
    for (id, events) in participants {
        let _span = debug_span!("normalize", participant = %id).entered();
        let normalized = normalize_events(events, &horizon, options);
        busy_set.insert(id.clone(), normalized.busy);
        diagnostics.insert(id.clone(), normalized.report);
    }

    let slots = find_quorum_slots(&busy_set, window)?;
    Ok(Availability { slots, diagnostics })
}

/// Free time of one participant inside the window (and mask, if any).
pub fn free_intervals(
    busy: &[TimeInterval],
    window: &TimeInterval,
    mask: Option<&[TimeInterval]>,
) -> Vec<TimeInterval> {
    let free = complement_within(busy, window);
    match mask {
        Some(mask) => intersect_sorted(&free, mask),
        None => free,
    }
}

/// Find the slots in which at least `window.quorum` participants are free.
///
/// Boundaries sharing an instant are all applied before the quorum is checked,
/// with ends ordered before starts, so availability that merely touches never
/// yields a zero-length slot.
pub fn find_quorum_slots(
    busy: &ParticipantBusySet,
    window: &QueryWindow,
) -> Result<Vec<FreeSlot>> {
    let bounds = window.interval()?;
    if busy.is_empty() {
        return Ok(Vec::new());
    }
    check_quorum(window.quorum, busy.len())?;

    let mask = window
        .working_hours
        .as_ref()
        .map(|hours| working_hours_mask(hours, &bounds))
        .transpose()?;

    let ids: Vec<&ParticipantId> = busy.iter().map(|(id, _)| id).collect();
    let free_by_participant: Vec<Vec<TimeInterval>> = busy
        .iter()
        .map(|(_, intervals)| free_intervals(intervals, &bounds, mask.as_deref()))
        .collect();

    let mut boundaries = Vec::new();
    for (index, free_list) in free_by_participant.iter().enumerate() {
        for free in free_list {
            boundaries.push(Boundary {
                at: free.start(),
                edge: Edge::Start,
                participant: index,
            });
            boundaries.push(Boundary {
                at: free.end(),
                edge: Edge::End,
                participant: index,
            });
        }
    }
    boundaries.sort_unstable_by_key(|b| (b.at, b.edge, b.participant));

    let raw = sweep(&boundaries, ids.len(), window.quorum);

    let slots: Vec<FreeSlot> = raw
        .into_iter()
        .filter(|(start, end, _)| *end - *start >= window.min_duration)
        .map(|(start, end, present)| {
            let free_spans: BTreeMap<ParticipantId, Vec<TimeInterval>> = present
                .into_iter()
                .map(|i| {
                    let spans = free_by_participant[i]
                        .iter()
                        .filter_map(|free| {
                            TimeInterval::new(start.max(free.start()), end.min(free.end())).ok()
                        })
                        .collect();
                    (ids[i].clone(), spans)
                })
                .collect();
            let present_ids: BTreeSet<ParticipantId> = free_spans.keys().cloned().collect();
            FreeSlot {
                start,
                end,
                duration_minutes: (end - start).num_minutes(),
                present_count: present_ids.len(),
                present_ids,
                participant_count: ids.len(),
                quorum: window.quorum,
                free_spans,
            }
        })
        .collect();

    debug!(
        participants = ids.len(),
        quorum = window.quorum,
        boundaries = boundaries.len(),
        slots = slots.len(),
        "quorum sweep finished"
    );

    Ok(slots)
}

fn check_quorum(quorum: usize, participant_count: usize) -> Result<()> {
    if quorum > participant_count {
        return Err(AvailabilityError::InvalidQuery(format!(
            "quorum {} exceeds participant count {}",
            quorum, participant_count
        )));
    }
    Ok(())
}

/// Ends sort before starts at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    End,
    Start,
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    at: DateTime<Utc>,
    edge: Edge,
    participant: usize,
}

type RawSlot = (DateTime<Utc>, DateTime<Utc>, BTreeSet<usize>);

/// Sweep sorted boundaries and emit `[start, end)` runs where the free count
/// is at least `quorum`, with every participant seen free during the run.
fn sweep(boundaries: &[Boundary], participants: usize, quorum: usize) -> Vec<RawSlot> {
    let mut free_now = vec![false; participants];
    let mut count = 0usize;
    let mut open: Option<(DateTime<Utc>, BTreeSet<usize>)> = None;
    let mut slots = Vec::new();

    let mut i = 0;
    while i < boundaries.len() {
        let at = boundaries[i].at;
        let group_start = i;
        while i < boundaries.len() && boundaries[i].at == at {
            let b = boundaries[i];
            match b.edge {
                Edge::End => {
                    free_now[b.participant] = false;
                    count -= 1;
                }
                Edge::Start => {
                    free_now[b.participant] = true;
                    count += 1;
                }
            }
            i += 1;
        }

        let quorate = count >= quorum;
        open = match open.take() {
            // Falling edge.
            Some((start, present)) if !quorate => {
                slots.push((start, at, present));
                None
            }
            // Still open: anyone who just became free joins the slot.
            Some((start, mut present)) => {
                present.extend(
                    boundaries[group_start..i]
                        .iter()
                        .filter(|b| b.edge == Edge::Start)
                        .map(|b| b.participant),
                );
                Some((start, present))
            }
            // Rising edge.
            None if quorate => {
                let present = (0..participants).filter(|&p| free_now[p]).collect();
                Some((at, present))
            }
            None => None,
        };
    }

    slots
}
