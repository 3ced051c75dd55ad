use attune_lib::activity::{ActivityTracker, Metadata};
use attune_lib::config::HistoryConfig;
use attune_lib::hub::BroadcastHub;
use attune_lib::state::LearnerSession;
use attune_lib::{Coach, EngineConfig, LearnerState, Metrics, Observation};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

fn session() -> LearnerSession {
    LearnerSession::new(
        "learner-1",
        &HistoryConfig::default(),
        8,
        BroadcastHub::new(Metrics::new()),
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    )
}

fn meta(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

#[test]
fn test_new_session_is_neutral() {
    let s = session();
    let snap = s.snapshot();
    assert_eq!(snap.state.mood, 0.0);
    assert_eq!(snap.error_rate, 0.0);
    assert_eq!(snap.sequence, 0);
    assert!(s.history().emotion.is_empty());
}

#[test]
fn test_mood_delta_clamps() {
    let s = session();
    let now = Utc::now();
    s.apply(&Observation::mood_delta(1.5), now).unwrap();
    assert_eq!(s.state().mood, 1.0);
    s.apply(&Observation::mood_delta(-2.0), now).unwrap();
    assert_eq!(s.state().mood, -1.0);
}

#[test]
fn test_invalid_observation_leaves_state_unchanged() {
    let s = session();
    let before = s.snapshot();

    let err = s.apply(&Observation::full(0.0, 1.5, 0.5, 0.5, 0.5), Utc::now()).unwrap_err();
    assert!(err.is_validation());
    let err = s.apply(&Observation::mood_delta(f64::NAN), Utc::now()).unwrap_err();
    assert!(err.is_validation());
    let err = s
        .apply(&Observation::mood_delta(0.1).with_error_rate(1.2), Utc::now())
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(s.snapshot(), before);
    assert!(s.history().emotion.is_empty());
}

#[test]
fn test_observed_at_never_moves_backwards() {
    let s = session();
    let later = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

    s.apply(&Observation::full(0.2, 0.3, 0.5, 0.5, 0.5).at(later), later).unwrap();
    s.apply(&Observation::full(0.1, 0.3, 0.5, 0.5, 0.5).at(earlier), earlier).unwrap();

    let state = s.state();
    assert_eq!(state.observed_at, later);
    assert_eq!(state.mood, 0.1);
}

#[test]
fn test_error_rate_is_kept_between_observations() {
    let s = session();
    s.apply(&Observation::mood_delta(0.1).with_error_rate(0.4), Utc::now()).unwrap();
    s.apply(&Observation::mood_delta(0.1), Utc::now()).unwrap();
    assert_eq!(s.snapshot().error_rate, 0.4);
}

#[test]
fn test_emotion_history_is_bounded() {
    let s = session();
    for i in 0..120 {
        let delta = if i % 2 == 0 { 0.1 } else { -0.1 };
        s.apply(&Observation::mood_delta(delta), Utc::now()).unwrap();
    }
    let history = s.history();
    assert_eq!(history.emotion.len(), 50);
    assert_eq!(s.snapshot().sequence, 120);
}

#[test]
fn test_activity_log_is_bounded_oldest_first() {
    let mut tracker = ActivityTracker::new(100);
    let state = LearnerState::neutral(Utc::now());
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

    for i in 0..130 {
        let at = start + Duration::minutes(i * 10);
        let id = tracker.start("learner-1", "quiz", Metadata::new(), state, at).unwrap();
        tracker
            .end(&id, 0.5, Metadata::new(), state, at + Duration::minutes(5))
            .unwrap();
    }

    let records = tracker.records();
    assert_eq!(records.len(), 100);
    // First 30 were evicted
    assert_eq!(records[0].started_at, start + Duration::minutes(300));
}

#[test]
fn test_start_twice_is_conflict() {
    let s = session();
    let now = Utc::now();
    let first = s.start_activity("reading", Metadata::new(), now).unwrap();
    let err = s.start_activity("quiz", Metadata::new(), now).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(s.in_flight().unwrap().id, first);
}

#[test]
fn test_end_unknown_id_is_not_found() {
    let s = session();
    let now = Utc::now();
    let err = s.end_activity("act_missing", 0.5, Metadata::new(), now).unwrap_err();
    assert!(err.is_not_found());

    let id = s.start_activity("reading", Metadata::new(), now).unwrap();
    let err = s.end_activity("act_other", 0.5, Metadata::new(), now).unwrap_err();
    assert!(err.is_not_found());
    // Still open
    assert_eq!(s.in_flight().unwrap().id, id);
}

#[test]
fn test_end_rejects_bad_performance() {
    let s = session();
    let now = Utc::now();
    let id = s.start_activity("reading", Metadata::new(), now).unwrap();
    let err = s.end_activity(&id, 1.5, Metadata::new(), now).unwrap_err();
    assert!(err.is_validation());
    assert!(s.in_flight().is_some());
}

#[test]
fn test_activity_captures_before_and_after_snapshots() {
    let s = session();
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    s.apply(&Observation::full(0.5, 0.2, 0.8, 0.7, 0.9), start).unwrap();
    let before = s.state();

    let id = s
        .start_activity("practice", meta(json!({"topic": "algebra", "level": 1})), start)
        .unwrap();
    s.apply(&Observation::mood_delta(-0.4), start + Duration::minutes(10)).unwrap();
    let after = s.state();

    let end = start + Duration::minutes(40);
    let record = s
        .end_activity(&id, 0.75, meta(json!({"level": 2, "score": 15})), end)
        .unwrap();

    assert_eq!(record.state_before, before);
    assert_eq!(record.state_after, after);
    assert_eq!(record.duration_minutes, 40);
    assert_eq!(record.activity_kind, "practice");
    assert_eq!(record.metadata["topic"], json!("algebra"));
    assert_eq!(record.metadata["level"], json!(2));
    assert_eq!(record.metadata["score"], json!(15));
    assert!((record.mood_delta() + 0.4).abs() < 1e-9);

    // Later writes do not touch the stored record
    s.apply(&Observation::mood_delta(0.3), end).unwrap();
    assert_eq!(s.history().activities[0], record);
}

#[test]
fn test_duration_never_negative() {
    let s = session();
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let id = s.start_activity("reading", Metadata::new(), start).unwrap();
    let record = s
        .end_activity(&id, 0.5, Metadata::new(), start - Duration::minutes(5))
        .unwrap();
    assert_eq!(record.duration_minutes, 0);
    assert!(record.ended_at >= record.started_at);
}

#[test]
fn test_coach_rejects_empty_learner_id() {
    let coach = Coach::offline(EngineConfig::default()).unwrap();
    let err = coach.push_observation("  ", Observation::mood_delta(0.1)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(coach.metrics().validation_rejections, 1);
}

#[test]
fn test_learners_are_independent() {
    let coach = Coach::offline(EngineConfig::default()).unwrap();
    coach.push_observation("a", Observation::mood_delta(0.5)).unwrap();
    coach.start_activity("a", "quiz", Metadata::new()).unwrap();

    // b is unaffected by a's open activity and mood
    coach.start_activity("b", "quiz", Metadata::new()).unwrap();
    assert_eq!(coach.state("b").unwrap().mood, 0.0);
    assert_eq!(coach.app().learner_ids(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_concurrent_writers_are_serialized() {
    let coach = std::sync::Arc::new(Coach::offline(EngineConfig::default()).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coach = coach.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    coach.push_observation("shared", Observation::mood_delta(0.0)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(coach.snapshot("shared").unwrap().sequence, 200);
    assert_eq!(coach.metrics().observations, 200);
}
