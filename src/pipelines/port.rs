use std::future::Future;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::correction::FeedbackAnalysis;
use crate::error::CollaboratorError;
use crate::fusion::{fuse, CbtDifficulty, EmotionBand};
use crate::schedule::{Schedule, ScheduleBlock};
use crate::state::session::StateSnapshot;

/// Scores sent to the generator alongside a request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub mood: f64,
    pub stress: f64,
    pub focus: f64,
    pub confidence: f64,
    pub energy: f64,
    pub fatigue: f64,
    pub error_rate: f64,
    pub stress_score: f64,
    pub routine_stress_score: f64,
    pub emotion_band: EmotionBand,
    pub cbt_difficulty: CbtDifficulty,
}

impl ScoreSummary {
    pub fn from_snapshot(snapshot: &StateSnapshot, at: DateTime<Utc>) -> Self {
        let state = &snapshot.state;
        let scores = fuse(state, snapshot.error_rate, at);
        ScoreSummary {
            mood: state.mood,
            stress: state.stress,
            focus: state.focus,
            confidence: state.confidence,
            energy: state.energy,
            fatigue: scores.fatigue,
            error_rate: snapshot.error_rate,
            stress_score: scores.stress.value,
            routine_stress_score: scores.routine_stress,
            emotion_band: scores.band,
            cbt_difficulty: scores.cbt_difficulty,
        }
    }
}

/// Present when the request regenerates an issued schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionHint {
    pub original: Schedule,
    pub feedback: FeedbackAnalysis,
    /// 0 at the bottom of the correction band, 1 at the top
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub learner_id: String,
    pub exam_type: String,
    pub study_minutes: u32,
    pub max_blocks: usize,
    pub scores: ScoreSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<CorrectionHint>,
}

/// Outbound port to the external text-generation service.
///
/// Implementations return validated blocks or a `CollaboratorError`; the
/// caller decides provenance and handles every failure locally.
pub trait ScheduleGenerator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<Vec<ScheduleBlock>, CollaboratorError>> + Send;
}

impl<G: ScheduleGenerator> ScheduleGenerator for Arc<G> {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<Vec<ScheduleBlock>, CollaboratorError>> + Send {
        (**self).generate(request)
    }
}

/// Generator for deployments with no text-generation service; every call
/// fails immediately so the local fallback is always used.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

impl ScheduleGenerator for OfflineGenerator {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
        Err(CollaboratorError::unavailable("no schedule generator configured"))
    }
}
