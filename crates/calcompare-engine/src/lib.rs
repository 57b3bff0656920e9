//! # calcompare-engine
//!
//! Deterministic multi-party availability for group scheduling.
//!
//! Given each participant's calendar events, the engine computes the windows
//! in which a quorum of participants is free at the same time, then proposes
//! and ranks fixed-duration meeting slots inside those windows. Everything is
//! pure computation: no I/O, no wall clock, no shared state.
//!
//! ## Pipeline
//!
//! raw events → [`normalizer`] → busy intervals → [`intersection`] → free
//! slots → [`ranker`] → candidate meetings
//!
//! ## Modules
//!
//! - [`interval`]: Half-open UTC intervals, merge/complement/intersect
//! - [`normalizer`]: Calendar events → merged UTC busy intervals
//! - [`recurrence`]: RRULE/EXDATE expansion of recurring events
//! - [`dst`]: Resolving local wall-clock times across DST transitions
//! - [`working_hours`]: Daily working-hours masks
//! - [`intersection`]: Quorum sweep over all participants' free time
//! - [`ranker`]: Candidate generation and quality scoring
//! - [`error`]: Error types

pub mod dst;
pub mod error;
pub mod intersection;
pub mod interval;
pub mod normalizer;
pub mod ranker;
pub mod recurrence;
pub mod working_hours;

pub use dst::{parse_time_zone, DstPolicy};
pub use error::AvailabilityError;
pub use intersection::{
    compute_availability, compute_availability_with, find_quorum_slots, Availability, FreeSlot,
    QueryWindow,
};
pub use interval::{
    complement_within, intersect_sorted, merge_intervals, ParticipantBusySet, ParticipantId,
    TimeInterval,
};
pub use normalizer::{
    normalize_events, EventStatus, EventTime, NormalizationReport, NormalizeOptions, RawEvent,
};
pub use ranker::{
    suggest_meetings, CandidateMeeting, RankingWeights, SuggestionRequest, TimeOfDay,
    WeekdayScores,
};
pub use recurrence::{expand_recurrence, Expansion};
pub use working_hours::{working_hours_mask, WorkingHours};
