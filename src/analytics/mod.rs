use std::collections::BTreeMap;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use crate::activity::ActivityRecord;
use crate::fusion::BREAK_STRESS_THRESHOLD;
use crate::state::learner::EmotionHistoryEntry;
use crate::state::session::HistorySnapshot;

/// Entries considered by the mood trend
pub const TREND_WINDOW: usize = 5;
pub const TREND_THRESHOLD: f64 = 0.2;
/// Reported when there are no activities to learn from (UTC hour)
pub const DEFAULT_BEST_HOUR: u32 = 9;
pub const DEFAULT_SESSION_MINUTES: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoodTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub mean_duration_minutes: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressPattern {
    pub mean_stress_before: f64,
    pub mean_stress_after: f64,
    pub mean_stress_change: f64,
    /// Fraction of activities started above the break threshold
    pub high_stress_start_ratio: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub trend: MoodTrend,
    pub best_hour: u32,
    pub session_stats: SessionStats,
    pub stress_pattern: StressPattern,
    /// Mean performance per hour of day, hours with no data omitted
    pub hourly_performance: BTreeMap<u32, f64>,
}

/// Sum of consecutive mood deltas across the last five entries.
/// Fewer than five entries is `Stable`.
pub fn predict_trend(history: &[EmotionHistoryEntry]) -> MoodTrend {
    if history.len() < TREND_WINDOW {
        return MoodTrend::Stable;
    }
    let recent = &history[history.len() - TREND_WINDOW..];
    let change: f64 = recent.windows(2).map(|pair| pair[1].mood - pair[0].mood).sum();

    if change > TREND_THRESHOLD {
        MoodTrend::Improving
    } else if change < -TREND_THRESHOLD {
        MoodTrend::Declining
    } else {
        MoodTrend::Stable
    }
}

pub fn hourly_performance(records: &[ActivityRecord]) -> BTreeMap<u32, f64> {
    let mut buckets: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for record in records {
        let bucket = buckets.entry(record.ended_at.hour()).or_insert((0.0, 0));
        bucket.0 += record.performance;
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(hour, (sum, count))| (hour, sum / count as f64))
        .collect()
}

/// Hour of day (UTC, of `ended_at`) with the best mean performance.
/// Ties go to the earliest hour.
pub fn best_performing_hour(records: &[ActivityRecord]) -> u32 {
    let mut best: Option<(u32, f64)> = None;
    for (hour, mean) in hourly_performance(records) {
        match best {
            Some((_, best_mean)) if mean <= best_mean => {}
            _ => best = Some((hour, mean)),
        }
    }
    best.map(|(hour, _)| hour).unwrap_or(DEFAULT_BEST_HOUR)
}

pub fn session_stats(records: &[ActivityRecord]) -> SessionStats {
    if records.is_empty() {
        return SessionStats {
            mean_duration_minutes: DEFAULT_SESSION_MINUTES,
            sample_count: 0,
        };
    }
    let total: i64 = records.iter().map(|r| r.duration_minutes).sum();
    SessionStats {
        mean_duration_minutes: total as f64 / records.len() as f64,
        sample_count: records.len(),
    }
}

pub fn stress_pattern(records: &[ActivityRecord]) -> StressPattern {
    if records.is_empty() {
        return StressPattern::default();
    }
    let n = records.len() as f64;
    let before: f64 = records.iter().map(|r| r.state_before.stress).sum::<f64>() / n;
    let after: f64 = records.iter().map(|r| r.state_after.stress).sum::<f64>() / n;
    let high = records
        .iter()
        .filter(|r| r.state_before.stress > BREAK_STRESS_THRESHOLD)
        .count();

    StressPattern {
        mean_stress_before: before,
        mean_stress_after: after,
        mean_stress_change: after - before,
        high_stress_start_ratio: high as f64 / n,
        sample_count: records.len(),
    }
}

pub fn compute_analytics(history: &HistorySnapshot) -> AnalyticsReport {
    AnalyticsReport {
        trend: predict_trend(&history.emotion),
        best_hour: best_performing_hour(&history.activities),
        session_stats: session_stats(&history.activities),
        stress_pattern: stress_pattern(&history.activities),
        hourly_performance: hourly_performance(&history.activities),
    }
}
