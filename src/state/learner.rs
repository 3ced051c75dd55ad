use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{check_range, Result};
use crate::fusion::{emotion_band, EmotionBand};

pub const MOOD_MIN: f64 = -1.0;
pub const MOOD_MAX: f64 = 1.0;
/// Largest single mood step a delta observation may carry
pub const MAX_MOOD_DELTA: f64 = 2.0;

/// Current affective/cognitive reading for one learner.
///
/// `mood` is in [-1, 1]; every other scalar is in [0, 1]. Values are clamped
/// on every write made through [`LearnerState::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    pub mood: f64,
    pub stress: f64,
    pub focus: f64,
    pub confidence: f64,
    pub energy: f64,
    pub observed_at: DateTime<Utc>,
}

impl LearnerState {
    /// Neutral starting point for a learner with no observations yet
    pub fn neutral(at: DateTime<Utc>) -> Self {
        LearnerState {
            mood: 0.0,
            stress: 0.2,
            focus: 0.6,
            confidence: 0.5,
            energy: 0.7,
            observed_at: at,
        }
    }

    pub fn clamped(self) -> Self {
        LearnerState {
            mood: clamp_or(self.mood, MOOD_MIN, MOOD_MAX, 0.0),
            stress: clamp_or(self.stress, 0.0, 1.0, 0.0),
            focus: clamp_or(self.focus, 0.0, 1.0, 0.0),
            confidence: clamp_or(self.confidence, 0.0, 1.0, 0.0),
            energy: clamp_or(self.energy, 0.0, 1.0, 0.0),
            observed_at: self.observed_at,
        }
    }

    /// Fatigue is the complement of energy
    pub fn fatigue(&self) -> f64 {
        (1.0 - self.energy).clamp(0.0, 1.0)
    }

    pub fn emotion_band(&self) -> EmotionBand {
        emotion_band(self.mood)
    }
}

fn clamp_or(value: f64, min: f64, max: f64, nan_value: f64) -> f64 {
    if value.is_nan() {
        nan_value
    } else {
        value.clamp(min, max)
    }
}

/// Raw reading pushed by an external caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Observation {
    /// Shift the current mood; other fields keep their values.
    #[serde(rename_all = "camelCase")]
    MoodDelta {
        delta: f64,
        #[serde(default)]
        error_rate: Option<f64>,
    },
    /// Replace the whole vector.
    #[serde(rename_all = "camelCase")]
    Full {
        mood: f64,
        stress: f64,
        focus: f64,
        confidence: f64,
        energy: f64,
        #[serde(default)]
        error_rate: Option<f64>,
        #[serde(default)]
        observed_at: Option<DateTime<Utc>>,
    },
}

impl Observation {
    pub fn mood_delta(delta: f64) -> Self {
        Observation::MoodDelta { delta, error_rate: None }
    }

    pub fn full(mood: f64, stress: f64, focus: f64, confidence: f64, energy: f64) -> Self {
        Observation::Full {
            mood,
            stress,
            focus,
            confidence,
            energy,
            error_rate: None,
            observed_at: None,
        }
    }

    pub fn with_error_rate(mut self, rate: f64) -> Self {
        match &mut self {
            Observation::MoodDelta { error_rate, .. } | Observation::Full { error_rate, .. } => {
                *error_rate = Some(rate);
            }
        }
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        if let Observation::Full { observed_at, .. } = &mut self {
            *observed_at = Some(at);
        }
        self
    }

    pub fn error_rate(&self) -> Option<f64> {
        match self {
            Observation::MoodDelta { error_rate, .. } | Observation::Full { error_rate, .. } => {
                *error_rate
            }
        }
    }

    /// Reject out-of-range or non-finite input before anything is written
    pub fn validate(&self) -> Result<()> {
        match *self {
            Observation::MoodDelta { delta, .. } => {
                check_range("delta", delta, -MAX_MOOD_DELTA, MAX_MOOD_DELTA)?;
            }
            Observation::Full { mood, stress, focus, confidence, energy, .. } => {
                check_range("mood", mood, MOOD_MIN, MOOD_MAX)?;
                check_range("stress", stress, 0.0, 1.0)?;
                check_range("focus", focus, 0.0, 1.0)?;
                check_range("confidence", confidence, 0.0, 1.0)?;
                check_range("energy", energy, 0.0, 1.0)?;
            }
        }
        if let Some(rate) = self.error_rate() {
            check_range("error_rate", rate, 0.0, 1.0)?;
        }
        Ok(())
    }

    /// Apply to `current`. `observed_at` never moves backwards.
    pub(crate) fn apply(&self, current: &LearnerState, now: DateTime<Utc>) -> LearnerState {
        let next = match *self {
            Observation::MoodDelta { delta, .. } => LearnerState {
                mood: current.mood + delta,
                observed_at: now,
                ..*current
            },
            Observation::Full { mood, stress, focus, confidence, energy, observed_at, .. } => {
                LearnerState {
                    mood,
                    stress,
                    focus,
                    confidence,
                    energy,
                    observed_at: observed_at.unwrap_or(now),
                }
            }
        };
        LearnerState {
            observed_at: next.observed_at.max(current.observed_at),
            ..next.clamped()
        }
    }
}

/// Snapshot appended to the emotion history on every mood update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionHistoryEntry {
    pub mood: f64,
    pub band: EmotionBand,
    pub observed_at: DateTime<Utc>,
}

impl EmotionHistoryEntry {
    pub fn from_state(state: &LearnerState) -> Self {
        EmotionHistoryEntry {
            mood: state.mood,
            band: state.emotion_band(),
            observed_at: state.observed_at,
        }
    }
}
