use attune_lib::activity::{ActivityRecord, Metadata};
use attune_lib::analytics::{
    best_performing_hour, compute_analytics, hourly_performance, predict_trend, session_stats,
    stress_pattern, DEFAULT_BEST_HOUR,
};
use attune_lib::state::{EmotionHistoryEntry, HistorySnapshot};
use attune_lib::{LearnerState, MoodTrend};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn entries(moods: &[f64]) -> Vec<EmotionHistoryEntry> {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    moods
        .iter()
        .enumerate()
        .map(|(i, &mood)| {
            let state = LearnerState {
                mood,
                ..LearnerState::neutral(start + Duration::minutes(i as i64))
            };
            EmotionHistoryEntry::from_state(&state)
        })
        .collect()
}

fn record(ended_at: DateTime<Utc>, minutes: i64, performance: f64, stress: (f64, f64)) -> ActivityRecord {
    let started_at = ended_at - Duration::minutes(minutes);
    ActivityRecord {
        id: format!("act_{}", ended_at.timestamp_millis()),
        activity_kind: "quiz".into(),
        state_before: LearnerState { stress: stress.0, ..LearnerState::neutral(started_at) },
        state_after: LearnerState { stress: stress.1, ..LearnerState::neutral(ended_at) },
        performance,
        duration_minutes: minutes,
        started_at,
        ended_at,
        metadata: Metadata::new(),
    }
}

fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 30, 0).unwrap()
}

#[test]
fn test_trend_needs_five_entries() {
    assert_eq!(predict_trend(&entries(&[])), MoodTrend::Stable);
    assert_eq!(predict_trend(&entries(&[-1.0, 0.0, 0.5, 1.0])), MoodTrend::Stable);
}

#[test]
fn test_trend_directions() {
    assert_eq!(predict_trend(&entries(&[0.0, 0.1, 0.2, 0.3, 0.4])), MoodTrend::Improving);
    assert_eq!(predict_trend(&entries(&[0.4, 0.3, 0.2, 0.1, 0.0])), MoodTrend::Declining);
    assert_eq!(predict_trend(&entries(&[0.0, 0.05, 0.1, 0.1, 0.15])), MoodTrend::Stable);
}

#[test]
fn test_trend_uses_last_five_only() {
    // Early decline is outside the window
    let moods = [0.9, 0.5, 0.0, -0.2, -0.1, 0.0, 0.1, 0.2];
    assert_eq!(predict_trend(&entries(&moods)), MoodTrend::Improving);
}

#[test]
fn test_best_hour_defaults_to_nine() {
    assert_eq!(best_performing_hour(&[]), DEFAULT_BEST_HOUR);
    assert_eq!(DEFAULT_BEST_HOUR, 9);
}

#[test]
fn test_best_hour_by_mean_performance() {
    let records = vec![
        record(at_hour(8), 30, 0.9, (0.2, 0.2)),
        record(at_hour(8), 30, 0.3, (0.2, 0.2)),
        record(at_hour(14), 30, 0.7, (0.2, 0.2)),
        record(at_hour(20), 30, 0.5, (0.2, 0.2)),
    ];
    let hourly = hourly_performance(&records);
    assert_eq!(hourly.len(), 3);
    assert!((hourly[&8] - 0.6).abs() < 1e-9);
    assert_eq!(best_performing_hour(&records), 14);
}

#[test]
fn test_best_hour_tie_goes_to_earliest() {
    let records = vec![
        record(at_hour(16), 30, 0.8, (0.2, 0.2)),
        record(at_hour(10), 30, 0.8, (0.2, 0.2)),
    ];
    assert_eq!(best_performing_hour(&records), 10);
}

#[test]
fn test_session_stats() {
    let empty = session_stats(&[]);
    assert_eq!(empty.mean_duration_minutes, 25.0);
    assert_eq!(empty.sample_count, 0);

    let records = vec![
        record(at_hour(9), 20, 0.5, (0.2, 0.2)),
        record(at_hour(10), 40, 0.5, (0.2, 0.2)),
    ];
    let stats = session_stats(&records);
    assert_eq!(stats.mean_duration_minutes, 30.0);
    assert_eq!(stats.sample_count, 2);
}

#[test]
fn test_stress_pattern() {
    assert_eq!(stress_pattern(&[]).sample_count, 0);

    let records = vec![
        record(at_hour(9), 20, 0.5, (0.8, 0.4)),
        record(at_hour(10), 20, 0.5, (0.2, 0.4)),
    ];
    let pattern = stress_pattern(&records);
    assert!((pattern.mean_stress_before - 0.5).abs() < 1e-9);
    assert!((pattern.mean_stress_after - 0.4).abs() < 1e-9);
    assert!((pattern.mean_stress_change + 0.1).abs() < 1e-9);
    assert_eq!(pattern.high_stress_start_ratio, 0.5);
}

#[test]
fn test_compute_analytics_bundles_everything() {
    let history = HistorySnapshot {
        emotion: entries(&[0.0, 0.1, 0.2, 0.3, 0.4]),
        activities: vec![record(at_hour(7), 50, 0.9, (0.3, 0.2))],
    };
    let report = compute_analytics(&history);
    assert_eq!(report.trend, MoodTrend::Improving);
    assert_eq!(report.best_hour, 7);
    assert_eq!(report.session_stats.mean_duration_minutes, 50.0);
    assert_eq!(report.stress_pattern.sample_count, 1);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("bestHour").is_some());
    assert!(json.get("sessionStats").is_some());
}
