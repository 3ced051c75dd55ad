//! Deterministic work/rest partition used whenever the external generator
//! cannot be used. Same inputs, same blocks: no clock, no randomness.

use serde::{Deserialize, Serialize};
use crate::schedule::model::{BlockDifficulty, ScheduleBlock};

pub const HIGH_FATIGUE: f64 = 0.6;
pub const ELEVATED_STRESS: f64 = 0.30;
pub const LOW_CONFIDENCE: f64 = 0.5;
/// Rest is only inserted when at least this much time is left after a work block
pub const MIN_REMAINING_FOR_REST: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackInputs {
    pub daily_hours: f64,
    pub fatigue: f64,
    pub stress_score: f64,
    pub confidence: f64,
}

pub fn session_length(fatigue: f64, stress_score: f64) -> u32 {
    if fatigue >= HIGH_FATIGUE {
        30
    } else if stress_score >= ELEVATED_STRESS {
        45
    } else {
        60
    }
}

pub fn rest_length(fatigue: f64) -> u32 {
    if fatigue >= HIGH_FATIGUE {
        15
    } else {
        10
    }
}

pub fn work_difficulty(confidence: f64, stress_score: f64) -> BlockDifficulty {
    if confidence < LOW_CONFIDENCE {
        BlockDifficulty::Easy
    } else if stress_score >= ELEVATED_STRESS {
        BlockDifficulty::Medium
    } else {
        BlockDifficulty::Hard
    }
}

/// Split a work budget of `daily_hours × 60` minutes into alternating work
/// and rest blocks.
///
/// Only work draws on the budget; rest is interleaved on top of it. Output
/// is truncated to `max_blocks`.
pub fn fallback_blocks(inputs: &FallbackInputs, max_blocks: usize) -> Vec<ScheduleBlock> {
    let total = if inputs.daily_hours.is_finite() && inputs.daily_hours > 0.0 {
        (inputs.daily_hours * 60.0).round() as u32
    } else {
        0
    };
    let session = session_length(inputs.fatigue, inputs.stress_score);
    let rest = rest_length(inputs.fatigue);
    let difficulty = work_difficulty(inputs.confidence, inputs.stress_score);

    let mut blocks = Vec::new();
    let mut remaining = total;
    while remaining > 0 && blocks.len() < max_blocks {
        let work = session.min(remaining);
        remaining -= work;
        blocks.push(ScheduleBlock::work(work, difficulty, "focused study"));

        if remaining >= MIN_REMAINING_FOR_REST && blocks.len() < max_blocks {
            blocks.push(ScheduleBlock::rest(rest));
        }
    }
    blocks
}
