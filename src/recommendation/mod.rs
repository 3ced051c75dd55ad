use serde::{Deserialize, Serialize};
use crate::fusion::CbtDifficulty;
use crate::state::learner::LearnerState;

pub const RELAXATION_STRESS: f64 = 0.7;
pub const INTENSIVE_FOCUS: f64 = 0.8;
pub const INTENSIVE_ENERGY: f64 = 0.7;
pub const BREAK_ENERGY: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationMode {
    Relaxation,
    Intensive,
    Normal,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// One task directive in a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskDirective {
    Study { topic: String },
    Practice { cbt_difficulty: CbtDifficulty },
    Rest { activity: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub mode: RecommendationMode,
    pub duration_minutes: u32,
    pub task_list: Vec<TaskDirective>,
    pub priority: Priority,
    pub cbt_difficulty: CbtDifficulty,
    pub study_intensity: f64,
    pub break_frequency_minutes: u32,
    /// Which rule fired
    pub reason: String,
}

/// Classify the current snapshot. First matching rule wins:
/// high stress, then high focus with high energy, then low energy, else normal.
pub fn recommend(state: &LearnerState) -> Recommendation {
    if state.stress > RELAXATION_STRESS {
        Recommendation {
            mode: RecommendationMode::Relaxation,
            duration_minutes: 20,
            task_list: vec![
                TaskDirective::Rest { activity: "guided breathing".into() },
                TaskDirective::Practice { cbt_difficulty: CbtDifficulty::Easy },
                TaskDirective::Study { topic: "light review".into() },
            ],
            priority: Priority::Urgent,
            cbt_difficulty: CbtDifficulty::Easy,
            study_intensity: 0.3,
            break_frequency_minutes: 15,
            reason: format!("stress {:.2} > {}", state.stress, RELAXATION_STRESS),
        }
    } else if state.focus > INTENSIVE_FOCUS && state.energy > INTENSIVE_ENERGY {
        Recommendation {
            mode: RecommendationMode::Intensive,
            duration_minutes: 90,
            task_list: vec![
                TaskDirective::Study { topic: "new material".into() },
                TaskDirective::Study { topic: "timed practice set".into() },
                TaskDirective::Practice { cbt_difficulty: CbtDifficulty::Hard },
            ],
            priority: Priority::High,
            cbt_difficulty: CbtDifficulty::Hard,
            study_intensity: 0.9,
            break_frequency_minutes: 50,
            reason: format!(
                "focus {:.2} > {} and energy {:.2} > {}",
                state.focus, INTENSIVE_FOCUS, state.energy, INTENSIVE_ENERGY
            ),
        }
    } else if state.energy < BREAK_ENERGY {
        Recommendation {
            mode: RecommendationMode::Break,
            duration_minutes: 15,
            task_list: vec![
                TaskDirective::Rest { activity: "step away from the screen".into() },
                TaskDirective::Rest { activity: "hydrate".into() },
            ],
            priority: Priority::High,
            cbt_difficulty: CbtDifficulty::Easy,
            study_intensity: 0.2,
            break_frequency_minutes: 20,
            reason: format!("energy {:.2} < {}", state.energy, BREAK_ENERGY),
        }
    } else {
        Recommendation {
            mode: RecommendationMode::Normal,
            duration_minutes: 45,
            task_list: vec![
                TaskDirective::Study { topic: "review".into() },
                TaskDirective::Study { topic: "practice set".into() },
                TaskDirective::Practice { cbt_difficulty: CbtDifficulty::Normal },
            ],
            priority: Priority::Normal,
            cbt_difficulty: CbtDifficulty::Normal,
            study_intensity: 0.6,
            break_frequency_minutes: 30,
            reason: "default".into(),
        }
    }
}
