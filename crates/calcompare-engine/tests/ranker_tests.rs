//! Tests for meeting candidate generation and ranking.

use std::collections::{BTreeMap, BTreeSet};

use calcompare_engine::intersection::{find_quorum_slots, QueryWindow};
use calcompare_engine::ranker::{suggest_meetings, SuggestionRequest};
use calcompare_engine::{
    AvailabilityError, FreeSlot, ParticipantBusySet, RankingWeights, TimeInterval, TimeOfDay,
};
use chrono::{DateTime, Duration, TimeZone, Utc, Weekday};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, min, 0).unwrap()
}

fn slot(start: DateTime<Utc>, end: DateTime<Utc>, present: &[&str], total: usize) -> FreeSlot {
    let present_ids: BTreeSet<String> = present.iter().map(|s| s.to_string()).collect();
    FreeSlot {
        start,
        end,
        duration_minutes: (end - start).num_minutes(),
        present_count: present_ids.len(),
        present_ids,
        participant_count: total,
        quorum: 1,
        free_spans: BTreeMap::new(),
    }
}

fn interval(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeInterval {
    TimeInterval::new(start, end).unwrap()
}

fn coverage_only() -> RankingWeights {
    RankingWeights {
        time_of_day: 0.0,
        weekday: 0.0,
        coverage: 1.0,
        proximity: 0.0,
        buffer: 0.0,
    }
}

/// Monday 2026-03-16 09:00-12:00 UTC, both participants free.
fn three_hour_slot() -> Vec<FreeSlot> {
    vec![slot(at(16, 9, 0), at(16, 12, 0), &["alice", "bob"], 2)]
}

fn hour_meeting(max: usize) -> SuggestionRequest {
    SuggestionRequest::new(Duration::minutes(60), max)
}

// ── Stepping ────────────────────────────────────────────────────────────────

#[test]
fn three_hour_slot_yields_half_hour_stepped_candidates() {
    let candidates = suggest_meetings(&three_hour_slot(), &hour_meeting(10)).unwrap();

    assert_eq!(candidates.len(), 5, "09:00, 09:30, 10:00, 10:30, 11:00");

    let mut starts: Vec<_> = candidates.iter().map(|c| c.start).collect();
    starts.sort();
    for pair in starts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::minutes(30));
    }
    assert_eq!(starts[0], at(16, 9, 0));
    assert_eq!(starts[4], at(16, 11, 0));

    for c in &candidates {
        assert_eq!(c.end - c.start, Duration::minutes(60));
        assert_eq!(c.duration_minutes, 60);
        assert!(c.end <= at(16, 12, 0));
    }
}

#[test]
fn candidates_sorted_by_score_descending() {
    let candidates = suggest_meetings(&three_hour_slot(), &hour_meeting(10)).unwrap();

    for pair in candidates.windows(2) {
        assert!(pair[0].quality_score >= pair[1].quality_score);
    }

    // 10:00 sits on the morning peak; 11:00 leaves no buffer and is last.
    let order: Vec<_> = candidates.iter().map(|c| c.start).collect();
    assert_eq!(
        order,
        vec![
            at(16, 10, 0),
            at(16, 9, 30),
            at(16, 10, 30),
            at(16, 9, 0),
            at(16, 11, 0),
        ]
    );
}

#[test]
fn custom_step_changes_grid() {
    let request = hour_meeting(20).with_step(Duration::minutes(15));
    let candidates = suggest_meetings(&three_hour_slot(), &request).unwrap();
    assert_eq!(candidates.len(), 9);
}

#[test]
fn slots_shorter_than_meeting_are_ignored() {
    let slots = vec![slot(at(16, 9, 0), at(16, 9, 45), &["alice"], 1)];
    let candidates = suggest_meetings(&slots, &hour_meeting(5)).unwrap();
    assert!(candidates.is_empty());
}

// ── Truncation and determinism ──────────────────────────────────────────────

#[test]
fn truncates_after_sorting() {
    let candidates = suggest_meetings(&three_hour_slot(), &hour_meeting(2)).unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].start, at(16, 10, 0));
    assert_eq!(candidates[1].start, at(16, 9, 30));
}

#[test]
fn zero_max_suggestions_returns_empty() {
    let candidates = suggest_meetings(&three_hour_slot(), &hour_meeting(0)).unwrap();
    assert!(candidates.is_empty());
}

#[test]
fn identical_requests_give_identical_output() {
    let slots = vec![
        slot(at(16, 9, 0), at(16, 12, 0), &["alice", "bob"], 3),
        slot(at(17, 13, 0), at(17, 18, 0), &["alice", "bob", "carol"], 3),
        slot(at(21, 10, 0), at(21, 16, 0), &["carol"], 3),
    ];
    let request = hour_meeting(8).with_now(at(16, 9, 0));

    let first = suggest_meetings(&slots, &request).unwrap();
    let second = suggest_meetings(&slots, &request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn ties_broken_by_earliest_start() {
    let weights = RankingWeights {
        time_of_day: 0.0,
        weekday: 0.0,
        coverage: 0.0,
        proximity: 0.0,
        buffer: 0.0,
    };
    let request = hour_meeting(10).with_weights(weights);

    let candidates = suggest_meetings(&three_hour_slot(), &request).unwrap();
    let starts: Vec<_> = candidates.iter().map(|c| c.start).collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
    assert!(candidates.iter().all(|c| c.quality_score == 0.0));
}

// ── Scoring factors ─────────────────────────────────────────────────────────

#[test]
fn now_drops_past_candidates() {
    let request = hour_meeting(10).with_now(at(16, 10, 0));
    let candidates = suggest_meetings(&three_hour_slot(), &request).unwrap();

    assert_eq!(candidates.len(), 3);
    assert!(candidates.iter().all(|c| c.start >= at(16, 10, 0)));
}

#[test]
fn weekday_beats_earlier_weekend() {
    // Saturday 14th is earlier (better proximity) but Tuesday 17th wins.
    let slots = vec![
        slot(at(14, 10, 0), at(14, 11, 0), &["alice"], 1),
        slot(at(17, 10, 0), at(17, 11, 0), &["alice"], 1),
    ];
    let candidates = suggest_meetings(&slots, &hour_meeting(5)).unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].day_of_week, Weekday::Tue);
    assert_eq!(candidates[1].day_of_week, Weekday::Sat);
}

#[test]
fn coverage_only_weights_score_equals_coverage() {
    let weights = RankingWeights {
        time_of_day: 0.0,
        weekday: 0.0,
        coverage: 1.0,
        proximity: 0.0,
        buffer: 0.0,
    };
    let slots = vec![
        slot(at(16, 10, 0), at(16, 11, 0), &["alice"], 3),
        slot(at(17, 10, 0), at(17, 11, 0), &["alice", "bob", "carol"], 3),
    ];
    let candidates = suggest_meetings(&slots, &hour_meeting(5).with_weights(weights)).unwrap();

    assert_eq!(candidates[0].start, at(17, 10, 0));
    assert_eq!(candidates[0].quality_score, 1.0);
    assert_eq!(candidates[0].present_count, 3);
    assert!((candidates[1].quality_score - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn labels_use_request_time_zone() {
    // 13:00 UTC is 09:00 in New York (EDT).
    let slots = vec![slot(at(16, 13, 0), at(16, 14, 0), &["alice"], 1)];

    let utc = suggest_meetings(&slots, &hour_meeting(1)).unwrap();
    assert_eq!(utc[0].time_of_day, TimeOfDay::Afternoon);

    let request = hour_meeting(1).with_time_zone(chrono_tz::America::New_York);
    let local = suggest_meetings(&slots, &request).unwrap();
    assert_eq!(local[0].time_of_day, TimeOfDay::Morning);
    assert_eq!(local[0].day_of_week, Weekday::Mon);
}

#[test]
fn scores_stay_in_unit_range() {
    let slots = vec![
        slot(at(14, 0, 0), at(14, 23, 0), &["alice"], 4),
        slot(at(16, 6, 0), at(16, 20, 0), &["alice", "bob", "carol", "dave"], 4),
    ];
    let weights = RankingWeights {
        time_of_day: 5.0,
        weekday: 0.1,
        coverage: 2.0,
        proximity: 7.0,
        buffer: 0.3,
    };
    let candidates =
        suggest_meetings(&slots, &hour_meeting(1000).with_weights(weights)).unwrap();

    assert!(!candidates.is_empty());
    for c in &candidates {
        assert!((0.0..=1.0).contains(&c.quality_score), "score {}", c.quality_score);
    }
}

// ── Partial quorum ──────────────────────────────────────────────────────────

#[test]
fn attendees_are_those_free_for_the_whole_meeting() {
    // Alice busy 9-10, Bob busy 14-15; with quorum 1 the whole day is one slot.
    let busy: ParticipantBusySet = vec![
        ("alice".to_string(), vec![interval(at(16, 9, 0), at(16, 10, 0))]),
        ("bob".to_string(), vec![interval(at(16, 14, 0), at(16, 15, 0))]),
    ]
    .into_iter()
    .collect();
    let window = QueryWindow::new(at(16, 9, 0), at(16, 17, 0), 1);
    let slots = find_quorum_slots(&busy, &window).unwrap();
    assert_eq!(slots.len(), 1);

    let request = hour_meeting(20)
        .with_step(Duration::minutes(60))
        .with_weights(coverage_only());
    let candidates = suggest_meetings(&slots, &request).unwrap();
    assert_eq!(candidates.len(), 8);

    let by_start = |h: u32| candidates.iter().find(|c| c.start == at(16, h, 0)).unwrap();

    let nine = by_start(9);
    assert_eq!(nine.present_ids, BTreeSet::from(["bob".to_string()]));
    assert_eq!(nine.present_count, 1);
    assert_eq!(nine.quality_score, 0.5);

    let two_pm = by_start(14);
    assert_eq!(two_pm.present_ids, BTreeSet::from(["alice".to_string()]));
    assert_eq!(two_pm.quality_score, 0.5);

    let eleven = by_start(11);
    assert_eq!(eleven.present_count, 2);
    assert_eq!(eleven.quality_score, 1.0);
}

#[test]
fn meeting_without_anyone_free_throughout_is_dropped() {
    // Alice is free 9:00-9:30 and Bob 9:30-10:00: someone is always free,
    // but nobody could attend a full hour.
    let busy: ParticipantBusySet = vec![
        ("alice".to_string(), vec![interval(at(16, 9, 30), at(16, 10, 0))]),
        ("bob".to_string(), vec![interval(at(16, 9, 0), at(16, 9, 30))]),
    ]
    .into_iter()
    .collect();
    let window = QueryWindow::new(at(16, 9, 0), at(16, 10, 0), 1);
    let slots = find_quorum_slots(&busy, &window).unwrap();
    assert_eq!(slots.len(), 1);

    let candidates = suggest_meetings(&slots, &hour_meeting(5)).unwrap();
    assert!(candidates.is_empty());

    let half_hour = SuggestionRequest::new(Duration::minutes(30), 5);
    let candidates = suggest_meetings(&slots, &half_hour).unwrap();
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.present_count == 1));
}

#[test]
fn free_spans_limit_hand_built_slot() {
    let mut s = slot(at(16, 9, 0), at(16, 11, 0), &["alice", "bob"], 2);
    s.free_spans = BTreeMap::from([
        ("alice".to_string(), vec![interval(at(16, 9, 0), at(16, 11, 0))]),
        ("bob".to_string(), vec![interval(at(16, 10, 0), at(16, 11, 0))]),
    ]);

    let request = hour_meeting(5).with_weights(coverage_only());
    let candidates = suggest_meetings(&[s], &request).unwrap();

    let order: Vec<_> = candidates.iter().map(|c| (c.start, c.present_count)).collect();
    assert_eq!(order, vec![(at(16, 10, 0), 2), (at(16, 9, 0), 1), (at(16, 9, 30), 1)]);
}

// ── Invalid requests ────────────────────────────────────────────────────────

#[test]
fn non_positive_duration_is_invalid_query() {
    let request = SuggestionRequest::new(Duration::zero(), 5);
    assert!(matches!(
        suggest_meetings(&three_hour_slot(), &request),
        Err(AvailabilityError::InvalidQuery(_))
    ));
}

#[test]
fn non_positive_step_is_invalid_query() {
    let request = hour_meeting(5).with_step(Duration::minutes(-30));
    assert!(matches!(
        suggest_meetings(&three_hour_slot(), &request),
        Err(AvailabilityError::InvalidQuery(_))
    ));
}

#[test]
fn huge_step_stops_instead_of_overflowing() {
    let request = hour_meeting(5).with_step(Duration::days(200_000_000));
    let candidates = suggest_meetings(&three_hour_slot(), &request).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].start, at(16, 9, 0));
}

#[test]
fn non_finite_weight_is_invalid_query() {
    let weights = RankingWeights {
        proximity: f64::NAN,
        ..RankingWeights::default()
    };
    let request = hour_meeting(5).with_weights(weights);
    assert!(matches!(
        suggest_meetings(&three_hour_slot(), &request),
        Err(AvailabilityError::InvalidQuery(_))
    ));
}
