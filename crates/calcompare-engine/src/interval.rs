//! Half-open UTC intervals and the set operations the engine is built on.
//!
//! Every list-returning function here produces intervals that are sorted by
//! start and pairwise disjoint with a real gap between neighbours, so the
//! output of one operation can be fed straight into the next.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AvailabilityError, Result};

/// Opaque participant identifier (user id, email, ...).
pub type ParticipantId = String;

/// A half-open interval `[start, end)` in UTC with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IntervalFields")]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Unchecked wire form; deserialization goes through [`TimeInterval::new`].
#[derive(Deserialize)]
struct IntervalFields {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<IntervalFields> for TimeInterval {
    type Error = AvailabilityError;

    fn try_from(fields: IntervalFields) -> Result<Self> {
        TimeInterval::new(fields.start, fields.end)
    }
}

impl TimeInterval {
    /// Build an interval, rejecting empty and inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(AvailabilityError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True if the instant lies inside `[start, end)`.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// True if `other` lies entirely inside this interval.
    pub fn covers(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Two intervals overlap iff `a.start < b.end && b.start < a.end`.
    /// Touching intervals do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The common part of two intervals, if any.
    pub fn intersect(&self, other: &TimeInterval) -> Option<TimeInterval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeInterval { start, end })
    }

    /// Clip this interval to `window`, returning `None` if nothing is left.
    pub fn clip(&self, window: &TimeInterval) -> Option<TimeInterval> {
        self.intersect(window)
    }
}

/// Sort intervals and union every overlapping or touching pair.
///
/// The result satisfies the busy-set invariant: ascending by start, with no
/// two intervals overlapping or touching.
pub fn merge_intervals(mut intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    if intervals.len() < 2 {
        return intervals;
    }

    intervals.sort_unstable();

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start <= last.end {
                last.end = last.end.max(interval.end);
                continue;
            }
        }
        merged.push(interval);
    }

    merged
}

/// Complement of a merged busy list inside `window`.
///
/// `busy` must already be merged (see [`merge_intervals`]); intervals partly
/// outside the window are clipped and intervals entirely outside are ignored.
pub fn complement_within(busy: &[TimeInterval], window: &TimeInterval) -> Vec<TimeInterval> {
    let mut free = Vec::with_capacity(busy.len() + 1);
    let mut cursor = window.start;

    for interval in busy {
        if interval.end <= window.start {
            continue;
        }
        if interval.start >= window.end {
            break;
        }
        if cursor < interval.start {
            free.push(TimeInterval {
                start: cursor,
                end: interval.start,
            });
        }
        cursor = cursor.max(interval.end);
    }

    // Trailing gap after the last busy period.
    if cursor < window.end {
        free.push(TimeInterval {
            start: cursor,
            end: window.end,
        });
    }

    free
}

/// Intersection of two sorted, disjoint interval lists (two-pointer walk).
pub fn intersect_sorted(a: &[TimeInterval], b: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if let Some(common) = a[i].intersect(&b[j]) {
            out.push(common);
        }
        // Advance whichever interval finishes first.
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }

    out
}

/// Busy intervals per participant, each list kept merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantBusySet {
    participants: BTreeMap<ParticipantId, Vec<TimeInterval>>,
}

impl ParticipantBusySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add busy time for a participant. Repeated inserts for the same id are
    /// unioned with what is already there.
    pub fn insert(&mut self, id: impl Into<ParticipantId>, busy: Vec<TimeInterval>) {
        let entry = self.participants.entry(id.into()).or_default();
        if entry.is_empty() {
            *entry = merge_intervals(busy);
        } else {
            let mut combined = std::mem::take(entry);
            combined.extend(busy);
            *entry = merge_intervals(combined);
        }
    }

    pub fn get(&self, id: &str) -> Option<&[TimeInterval]> {
        self.participants.get(id).map(Vec::as_slice)
    }

    /// Participants in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &[TimeInterval])> {
        self.participants
            .iter()
            .map(|(id, busy)| (id, busy.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl FromIterator<(ParticipantId, Vec<TimeInterval>)> for ParticipantBusySet {
    fn from_iter<I: IntoIterator<Item = (ParticipantId, Vec<TimeInterval>)>>(iter: I) -> Self {
        let mut set = ParticipantBusySet::new();
        for (id, busy) in iter {
            set.insert(id, busy);
        }
        set
    }
}
