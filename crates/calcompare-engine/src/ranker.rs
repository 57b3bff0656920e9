//! Meeting slot ranking.
//!
//! Slices quorum-free slots into fixed-duration candidates on a step grid and
//! scores each one with a weighted heuristic. The ranking never reads the wall
//! clock: "now" is an explicit input, so identical requests always produce
//! identical output.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AvailabilityError, Result};
use crate::intersection::FreeSlot;
use crate::interval::{ParticipantId, TimeInterval};

/// Local times (minutes after midnight) where the time-of-day score peaks.
const TIME_OF_DAY_PEAKS: [f64; 2] = [10.0 * 60.0, 14.0 * 60.0];
/// Distance from the nearest peak at which the time-of-day score reaches 0.
const TIME_OF_DAY_FALLOFF_MINUTES: f64 = 4.0 * 60.0;

/// Relative importance of each scoring factor. Weights need not sum to 1;
/// the score is divided by their total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub time_of_day: f64,
    pub weekday: f64,
    pub coverage: f64,
    /// Sooner is better. Meant as a tie-breaker.
    pub proximity: f64,
    /// Slack left in the slot after the meeting ends.
    pub buffer: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            time_of_day: 0.35,
            weekday: 0.25,
            coverage: 0.25,
            proximity: 0.05,
            buffer: 0.10,
        }
    }
}

impl RankingWeights {
    fn as_array(&self) -> [(&'static str, f64); 5] {
        [
            ("time_of_day", self.time_of_day),
            ("weekday", self.weekday),
            ("coverage", self.coverage),
            ("proximity", self.proximity),
            ("buffer", self.buffer),
        ]
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in self.as_array() {
            if !value.is_finite() || value < 0.0 {
                return Err(AvailabilityError::InvalidQuery(format!(
                    "weight '{}' must be a finite non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    fn total(&self) -> f64 {
        self.as_array().iter().map(|(_, w)| w).sum()
    }
}

/// Preference score in [0,1] for each day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekdayScores {
    pub monday: f64,
    pub tuesday: f64,
    pub wednesday: f64,
    pub thursday: f64,
    pub friday: f64,
    pub saturday: f64,
    pub sunday: f64,
}

impl Default for WeekdayScores {
    /// Mid-week first, then Monday/Friday, weekends last.
    fn default() -> Self {
        Self {
            monday: 0.75,
            tuesday: 1.0,
            wednesday: 1.0,
            thursday: 1.0,
            friday: 0.75,
            saturday: 0.25,
            sunday: 0.25,
        }
    }
}

impl WeekdayScores {
    pub fn score(&self, day: Weekday) -> f64 {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    fn validate(&self) -> Result<()> {
        let days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        for day in days {
            let value = self.score(day);
            if !(0.0..=1.0).contains(&value) {
                return Err(AvailabilityError::InvalidQuery(format!(
                    "weekday score for {} must be within [0, 1] (got {})",
                    day, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// Before 12:00 is morning, 12:00-17:00 afternoon, 17:00 on evening.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }
}

/// A scored, fixed-duration meeting proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateMeeting {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    /// Weighted quality in [0,1]; higher is better.
    pub quality_score: f64,
    /// Local to the request's time zone.
    pub day_of_week: Weekday,
    pub time_of_day: TimeOfDay,
    pub present_count: usize,
    pub present_ids: BTreeSet<ParticipantId>,
}

/// Parameters for [`suggest_meetings`].
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRequest {
    pub requested_duration: Duration,
    pub max_suggestions: usize,
    /// Spacing between candidate start points within a slot.
    pub step: Duration,
    pub weights: RankingWeights,
    pub weekday_scores: WeekdayScores,
    /// Zone used for time-of-day and weekday evaluation.
    pub time_zone: Tz,
    /// Reference instant for proximity; candidates before it are dropped.
    pub now: Option<DateTime<Utc>>,
}

impl SuggestionRequest {
    pub fn new(requested_duration: Duration, max_suggestions: usize) -> Self {
        Self {
            requested_duration,
            max_suggestions,
            step: Duration::minutes(30),
            weights: RankingWeights::default(),
            weekday_scores: WeekdayScores::default(),
            time_zone: Tz::UTC,
            now: None,
        }
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_weekday_scores(mut self, scores: WeekdayScores) -> Self {
        self.weekday_scores = scores;
        self
    }

    pub fn with_time_zone(mut self, tz: Tz) -> Self {
        self.time_zone = tz;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.requested_duration <= Duration::zero() {
            return Err(AvailabilityError::InvalidQuery(
                "requested meeting duration must be positive".to_string(),
            ));
        }
        if self.step <= Duration::zero() {
            return Err(AvailabilityError::InvalidQuery(
                "candidate step must be positive".to_string(),
            ));
        }
        self.weights.validate()?;
        self.weekday_scores.validate()
    }
}

/// Turn free slots into ranked meeting proposals.
///
/// Every slot long enough for the meeting yields candidates at `slot.start`,
/// `slot.start + step`, ... while the meeting still fits. A candidate's
/// attendees are the participants free for the whole meeting; candidates with
/// fewer attendees than the slot's quorum are dropped. All candidates are
/// scored before sorting (descending score, then earliest start) and the list
/// is truncated to `max_suggestions` last, since scores are not monotonic in
/// time.
///
/// # Errors
/// Returns `AvailabilityError::InvalidQuery` for a non-positive duration or
/// step, or for invalid weights or weekday scores.
pub fn suggest_meetings(
    free_slots: &[FreeSlot],
    request: &SuggestionRequest,
) -> Result<Vec<CandidateMeeting>> {
    request.validate()?;
    if request.max_suggestions == 0 {
        return Ok(Vec::new());
    }

    let duration = request.requested_duration;
    let mut drafts: Vec<Draft<'_>> = Vec::new();
    for slot in free_slots {
        if slot.duration() < duration {
            continue;
        }
        let needed = slot.quorum.max(1);
        let mut start = slot.start;
        while let Some(end) = start.checked_add_signed(duration) {
            if end > slot.end {
                break;
            }
            if request.now.is_none_or(|now| start >= now) {
                if let Ok(meeting) = TimeInterval::new(start, end) {
                    let attendees = slot.free_throughout(&meeting);
                    if attendees.len() >= needed {
                        drafts.push(Draft {
                            start,
                            end,
                            slot,
                            attendees,
                        });
                    }
                }
            }
            start = match start.checked_add_signed(request.step) {
                Some(next) => next,
                None => break,
            };
        }
    }

    let Some(earliest) = drafts.iter().map(|d| d.start).min() else {
        return Ok(Vec::new());
    };
    let latest = drafts.iter().map(|d| d.start).max().unwrap_or(earliest);
    let reference = request.now.unwrap_or(earliest);

    let total_weight = request.weights.total();
    let mut candidates: Vec<CandidateMeeting> = drafts
        .into_iter()
        .map(|draft| {
            let Draft {
                start,
                end,
                slot,
                attendees,
            } = draft;
            let local = start.with_timezone(&request.time_zone);
            let w = &request.weights;
            let coverage = if slot.participant_count == 0 {
                0.0
            } else {
                attendees.len() as f64 / slot.participant_count as f64
            };

            let weighted = w.time_of_day * time_of_day_score(local.hour(), local.minute())
                + w.weekday * request.weekday_scores.score(local.weekday())
                + w.coverage * coverage
                + w.proximity * proximity_score(start, reference, latest)
                + w.buffer * buffer_score(slot.end - end);
            let quality_score = if total_weight > 0.0 {
                (weighted / total_weight).clamp(0.0, 1.0)
            } else {
                0.0
            };

            CandidateMeeting {
                start,
                end,
                duration_minutes: duration.num_minutes(),
                quality_score,
                day_of_week: local.weekday(),
                time_of_day: TimeOfDay::from_hour(local.hour()),
                present_count: attendees.len(),
                present_ids: attendees,
            }
        })
        .collect();

    let generated = candidates.len();
    candidates.sort_by(|a, b| {
        b.quality_score
            .total_cmp(&a.quality_score)
            .then_with(|| a.start.cmp(&b.start))
    });
    candidates.truncate(request.max_suggestions);

    debug!(generated, returned = candidates.len(), "ranked meeting candidates");
    Ok(candidates)
}

/// A candidate start that fits its slot, before scoring.
struct Draft<'a> {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    slot: &'a FreeSlot,
    /// Participants free for the whole meeting.
    attendees: BTreeSet<ParticipantId>,
}

/// 1.0 at 10:00 and 14:00 local, falling linearly to 0 four hours away.
pub fn time_of_day_score(hour: u32, minute: u32) -> f64 {
    let minutes = f64::from(hour * 60 + minute);
    let distance = TIME_OF_DAY_PEAKS
        .iter()
        .map(|peak| (minutes - peak).abs())
        .fold(f64::INFINITY, f64::min);
    (1.0 - distance / TIME_OF_DAY_FALLOFF_MINUTES).max(0.0)
}

/// Linear from 1.0 at `reference` to 0.0 at `latest`.
fn proximity_score(start: DateTime<Utc>, reference: DateTime<Utc>, latest: DateTime<Utc>) -> f64 {
    let span = (latest - reference).num_seconds();
    if span <= 0 {
        return 1.0;
    }
    let offset = (start - reference).num_seconds().clamp(0, span);
    1.0 - offset as f64 / span as f64
}

/// Room left in the slot after the meeting: 30+ min is ideal, 15+ is okay.
fn buffer_score(slack: Duration) -> f64 {
    if slack >= Duration::minutes(30) {
        1.0
    } else if slack >= Duration::minutes(15) {
        0.5
    } else {
        0.0
    }
}
