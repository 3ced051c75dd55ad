use std::future::Future;
use serde::{Deserialize, Serialize};
use crate::config::CorrectionConfig;
use crate::error::{check_range, CoachError, CollaboratorError, Result};
use crate::pipelines::port::{GenerationRequest, ScheduleGenerator};
use crate::pipelines::router::GenerationRouter;
use crate::schedule::model::fingerprint_blocks;
use crate::schedule::{Provenance, Schedule, ScheduleBlock};

pub const WORK_SHRINK_FACTOR: f64 = 0.8;
pub const REST_STRETCH_FACTOR: f64 = 1.5;
/// Work blocks never shrink below this
pub const MIN_WORK_MINUTES: u32 = 5;

/// Aggregate community feedback on one issued schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnalysis {
    pub negative_ratio: f64,
    pub delta: f64,
    pub sample_size: u32,
    pub average_sentiment: f64,
}

impl FeedbackAnalysis {
    pub fn with_ratio(negative_ratio: f64) -> Self {
        FeedbackAnalysis {
            negative_ratio,
            delta: 0.0,
            sample_size: 0,
            average_sentiment: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("negative_ratio", self.negative_ratio, 0.0, 1.0)?;
        if !self.delta.is_finite() {
            return Err(CoachError::validation("delta", "must be finite"));
        }
        if !self.average_sentiment.is_finite() {
            return Err(CoachError::validation("average_sentiment", "must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum CorrectionDecision {
    /// Below the band: the schedule is fine
    Healthy,
    /// Inside the band: soft automatic correction
    Correct { strength: f64 },
    /// Above the band: needs a different remediation path than soft correction
    Escalate,
}

pub fn decide(negative_ratio: f64, band: &CorrectionConfig) -> CorrectionDecision {
    if negative_ratio < band.lower_ratio {
        CorrectionDecision::Healthy
    } else if negative_ratio > band.upper_ratio {
        CorrectionDecision::Escalate
    } else {
        CorrectionDecision::Correct {
            strength: adjustment_strength(negative_ratio, band),
        }
    }
}

/// Position of `negative_ratio` inside the band, 0 at the bottom and 1 at the top
pub fn adjustment_strength(negative_ratio: f64, band: &CorrectionConfig) -> f64 {
    let width = band.upper_ratio - band.lower_ratio;
    if width <= 0.0 {
        return 1.0;
    }
    ((negative_ratio - band.lower_ratio) / width).clamp(0.0, 1.0)
}

/// Shrink work, stretch rest and ease difficulty one step. Cannot fail.
pub fn local_correction(blocks: &[ScheduleBlock]) -> Vec<ScheduleBlock> {
    blocks
        .iter()
        .map(|block| {
            if block.is_work() {
                let minutes = (block.minutes as f64 * WORK_SHRINK_FACTOR).round() as u32;
                ScheduleBlock {
                    minutes: minutes.max(MIN_WORK_MINUTES),
                    difficulty: block.difficulty.map(|d| d.easier()),
                    ..block.clone()
                }
            } else {
                ScheduleBlock {
                    minutes: (block.minutes as f64 * REST_STRETCH_FACTOR).round() as u32,
                    ..block.clone()
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CorrectionResult {
    #[serde(rename_all = "camelCase")]
    NotNeeded {
        schedule_id: String,
        negative_ratio: f64,
    },
    #[serde(rename_all = "camelCase")]
    Corrected {
        original_id: String,
        schedule: Schedule,
        strength: f64,
        /// Why the local path was used, when it was
        fallback_reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Escalated {
        schedule_id: String,
        negative_ratio: f64,
        reason: String,
    },
}

impl CorrectionResult {
    pub fn is_triggered(&self) -> bool {
        matches!(self, CorrectionResult::Corrected { .. })
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, CorrectionResult::Escalated { .. })
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        match self {
            CorrectionResult::Corrected { schedule, .. } => Some(schedule),
            _ => None,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.schedule().map(|s| s.provenance)
    }
}

/// Corrected blocks with their provenance and, for the local path, the reason
pub struct Regenerated {
    pub blocks: Vec<ScheduleBlock>,
    pub provenance: Provenance,
    pub fallback_reason: Option<String>,
}

/// Ask the generator for a corrected schedule, falling back to
/// [`local_correction`] on failure, timeout, cancellation, or a result
/// identical to the original.
pub async fn regenerate<G, C>(
    router: &GenerationRouter<G>,
    request: &GenerationRequest,
    original: &Schedule,
    cancel: C,
) -> Regenerated
where
    G: ScheduleGenerator,
    C: Future<Output = ()>,
{
    let outcome = tokio::select! {
        biased;
        _ = cancel => Err(CollaboratorError::cancelled()),
        result = router.generate(request) => result,
    };

    let outcome = outcome.and_then(|blocks| {
        if fingerprint_blocks(&blocks) == original.fingerprint() {
            Err(CollaboratorError::malformed("generator returned the original schedule unchanged"))
        } else {
            Ok(blocks)
        }
    });

    match outcome {
        Ok(blocks) => Regenerated {
            blocks,
            provenance: Provenance::External,
            fallback_reason: None,
        },
        Err(e) => Regenerated {
            blocks: local_correction(&original.blocks),
            provenance: Provenance::LocalFallback,
            fallback_reason: Some(e.to_string()),
        },
    }
}
