//! Pure scoring functions over a learner state.
//!
//! Nothing here reads a clock or touches shared state; inputs are expected to
//! be pre-clamped by the state model, and every output is clamped again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::state::learner::LearnerState;

/// Mood strictly above this is `High`
pub const HIGH_MOOD_THRESHOLD: f64 = 0.33;
/// Mood at or above this (and not `High`) is `Medium`
pub const LOW_MOOD_THRESHOLD: f64 = -0.33;

pub const BREAK_STRESS_THRESHOLD: f64 = 0.7;
pub const BREAK_FOCUS_THRESHOLD: f64 = 0.3;
pub const BREAK_ENERGY_THRESHOLD: f64 = 0.3;

pub const HARD_READINESS_THRESHOLD: f64 = 0.7;
pub const EASY_READINESS_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionBand {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CbtDifficulty {
    Easy,
    Normal,
    Hard,
}

pub fn emotion_band(mood: f64) -> EmotionBand {
    if mood > HIGH_MOOD_THRESHOLD {
        EmotionBand::High
    } else if mood >= LOW_MOOD_THRESHOLD {
        EmotionBand::Medium
    } else {
        EmotionBand::Low
    }
}

/// Remediation stress: `0.6·errorRate + 0.4·(1 − mood)`, clamped to [0, 1].
pub fn stress_score(error_rate: f64, mood: f64) -> f64 {
    unit(0.6 * error_rate + 0.4 * (1.0 - mood))
}

/// Stress used when generating a full routine:
/// `0.5·errorRate + 0.3·(1 − mood) + 0.2·fatigue`, clamped to [0, 1].
///
/// Kept separate from [`stress_score`]; the two weightings feed different
/// call paths and are not interchangeable.
pub fn routine_stress_score(error_rate: f64, mood: f64, fatigue: f64) -> f64 {
    unit(0.5 * error_rate + 0.3 * (1.0 - mood) + 0.2 * fatigue)
}

pub fn cbt_readiness(confidence: f64, focus: f64, stress: f64) -> f64 {
    unit(0.4 * confidence + 0.3 * focus + 0.3 * (1.0 - stress))
}

pub fn cbt_difficulty(confidence: f64, focus: f64, stress: f64) -> CbtDifficulty {
    let readiness = cbt_readiness(confidence, focus, stress);
    if readiness > HARD_READINESS_THRESHOLD {
        CbtDifficulty::Hard
    } else if readiness < EASY_READINESS_THRESHOLD {
        CbtDifficulty::Easy
    } else {
        CbtDifficulty::Normal
    }
}

pub fn should_break(stress: f64, focus: f64, energy: f64) -> bool {
    stress > BREAK_STRESS_THRESHOLD
        || focus < BREAK_FOCUS_THRESHOLD
        || energy < BREAK_ENERGY_THRESHOLD
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A stress score together with the inputs it was computed from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressScore {
    pub value: f64,
    pub error_rate: f64,
    pub mood_at_computation: f64,
    pub computed_at: DateTime<Utc>,
}

impl StressScore {
    pub fn compute(error_rate: f64, mood: f64, at: DateTime<Utc>) -> Self {
        StressScore {
            value: stress_score(error_rate, mood),
            error_rate,
            mood_at_computation: mood,
            computed_at: at,
        }
    }
}

/// Every derived score for one state snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedScores {
    pub band: EmotionBand,
    pub stress: StressScore,
    pub routine_stress: f64,
    pub fatigue: f64,
    pub readiness: f64,
    pub cbt_difficulty: CbtDifficulty,
    pub should_break: bool,
}

pub fn fuse(state: &LearnerState, error_rate: f64, at: DateTime<Utc>) -> FusedScores {
    let fatigue = state.fatigue();
    FusedScores {
        band: emotion_band(state.mood),
        stress: StressScore::compute(error_rate, state.mood, at),
        routine_stress: routine_stress_score(error_rate, state.mood, fatigue),
        fatigue,
        readiness: cbt_readiness(state.confidence, state.focus, state.stress),
        cbt_difficulty: cbt_difficulty(state.confidence, state.focus, state.stress),
        should_break: should_break(state.stress, state.focus, state.energy),
    }
}
