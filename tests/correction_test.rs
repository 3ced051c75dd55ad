use std::sync::Arc;
use std::time::{Duration, Instant};
use attune_lib::config::CorrectionConfig;
use attune_lib::correction::{adjustment_strength, decide, local_correction, CorrectionDecision};
use attune_lib::schedule::BlockDifficulty;
use attune_lib::{
    Coach, CollaboratorError, CorrectionResult, EngineConfig, FeedbackAnalysis, GenerationRequest,
    NoopSink, Observation, Provenance, ScheduleBlock, ScheduleGenerator,
};
use parking_lot::Mutex;

#[derive(Clone, Copy)]
enum OnCorrection {
    Fixed,
    Echo,
    Sleep(Duration),
    Fail,
}

/// Fails every plain request so originals come from the local fallback,
/// then answers correction requests as scripted.
struct Scripted {
    on_correction: OnCorrection,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl Scripted {
    fn new(on_correction: OnCorrection) -> Arc<Self> {
        Arc::new(Scripted {
            on_correction,
            seen: Mutex::new(Vec::new()),
        })
    }
}

fn corrected_blocks() -> Vec<ScheduleBlock> {
    vec![
        ScheduleBlock::work(25, BlockDifficulty::Easy, "short review"),
        ScheduleBlock::rest(20),
        ScheduleBlock::work(25, BlockDifficulty::Easy, "flashcards"),
    ]
}

impl ScheduleGenerator for Scripted {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
        self.seen.lock().push(request.clone());
        let Some(hint) = &request.correction else {
            return Err(CollaboratorError::unavailable("plain requests are not scripted"));
        };
        match self.on_correction {
            OnCorrection::Fixed => Ok(corrected_blocks()),
            OnCorrection::Echo => Ok(hint.original.blocks.clone()),
            OnCorrection::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(corrected_blocks())
            }
            OnCorrection::Fail => Err(CollaboratorError::malformed("not a schedule")),
        }
    }
}

fn config(timeout_secs: f64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.generator.timeout_secs = timeout_secs;
    config.generator.max_retries = 0;
    config.generator.circuit_failure_threshold = 10;
    config
}

async fn coach_with_schedule(
    on_correction: OnCorrection,
    timeout_secs: f64,
) -> (Coach<Arc<Scripted>, NoopSink>, Arc<Scripted>, String) {
    let generator = Scripted::new(on_correction);
    let coach = Coach::new(config(timeout_secs), generator.clone(), NoopSink).unwrap();
    coach
        .push_observation("learner-1", Observation::full(0.1, 0.4, 0.6, 0.6, 0.6).with_error_rate(0.2))
        .unwrap();
    let schedule = coach.request_schedule("learner-1", "calculus", 4.0).await.unwrap();
    assert_eq!(schedule.provenance, Provenance::LocalFallback);
    (coach, generator, schedule.id)
}

#[test]
fn test_decide_band() {
    let band = CorrectionConfig::default();
    assert_eq!(decide(0.05, &band), CorrectionDecision::Healthy);
    assert_eq!(decide(0.45, &band), CorrectionDecision::Escalate);
    assert!(matches!(decide(0.10, &band), CorrectionDecision::Correct { .. }));
    assert!(matches!(decide(0.30, &band), CorrectionDecision::Correct { .. }));
    match decide(0.20, &band) {
        CorrectionDecision::Correct { strength } => assert!((strength - 0.5).abs() < 1e-9),
        other => panic!("expected correction, got {:?}", other),
    }
}

#[test]
fn test_adjustment_strength_endpoints() {
    let band = CorrectionConfig::default();
    assert!(adjustment_strength(0.10, &band).abs() < 1e-9);
    assert!((adjustment_strength(0.30, &band) - 1.0).abs() < 1e-9);
}

#[test]
fn test_local_correction_factors() {
    let original = vec![
        ScheduleBlock::work(60, BlockDifficulty::Hard, "focused study"),
        ScheduleBlock::rest(10),
        ScheduleBlock::work(5, BlockDifficulty::Easy, "recap"),
    ];
    let corrected = local_correction(&original);

    assert_eq!(corrected[0].minutes, 48);
    assert_eq!(corrected[0].difficulty, Some(BlockDifficulty::Medium));
    assert_eq!(corrected[0].label, "focused study");
    assert_eq!(corrected[1].minutes, 15);
    assert_eq!(corrected[1].difficulty, None);
    assert_eq!(corrected[2].minutes, 5);
    assert_eq!(corrected[2].difficulty, Some(BlockDifficulty::Easy));
}

#[test]
fn test_feedback_validation() {
    assert!(FeedbackAnalysis::with_ratio(0.5).validate().is_ok());
    assert!(FeedbackAnalysis::with_ratio(1.5).validate().is_err());
    assert!(FeedbackAnalysis::with_ratio(-0.1).validate().is_err());
    assert!(FeedbackAnalysis::with_ratio(f64::NAN).validate().is_err());
}

#[tokio::test]
async fn test_low_ratio_does_not_trigger() {
    let (coach, generator, id) = coach_with_schedule(OnCorrection::Fixed, 5.0).await;
    let result = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(0.05))
        .await
        .unwrap();

    assert!(matches!(result, CorrectionResult::NotNeeded { .. }));
    assert!(!result.is_triggered());
    // Only the initial request reached the generator
    assert_eq!(generator.seen.lock().len(), 1);
    assert_eq!(coach.metrics().corrections, 0);
}

#[tokio::test]
async fn test_in_band_ratio_triggers_external_correction() {
    let (coach, generator, id) = coach_with_schedule(OnCorrection::Fixed, 5.0).await;
    let result = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(0.20))
        .await
        .unwrap();

    assert!(result.is_triggered());
    assert_eq!(result.provenance(), Some(Provenance::External));
    let schedule = result.schedule().unwrap();
    assert_eq!(schedule.blocks, corrected_blocks());
    assert_eq!(schedule.corrects.as_deref(), Some(id.as_str()));
    assert_ne!(schedule.id, id);

    // The corrected schedule can itself receive feedback
    assert_eq!(coach.issued_schedule("learner-1", &schedule.id).unwrap(), *schedule);

    let seen = generator.seen.lock();
    let hint = seen[1].correction.as_ref().unwrap();
    assert_eq!(hint.original.id, id);
    assert!((hint.strength - 0.5).abs() < 1e-9);
    assert!((seen[1].scores.error_rate - 0.2).abs() < 1e-9);

    let metrics = coach.metrics();
    assert_eq!(metrics.corrections, 1);
    assert_eq!(metrics.external_successes, 1);
}

#[tokio::test]
async fn test_out_of_band_ratio_is_escalated() {
    let (coach, generator, id) = coach_with_schedule(OnCorrection::Fixed, 5.0).await;
    let result = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(0.45))
        .await
        .unwrap();

    match &result {
        CorrectionResult::Escalated { schedule_id, negative_ratio, reason } => {
            assert_eq!(schedule_id, &id);
            assert_eq!(*negative_ratio, 0.45);
            assert!(!reason.is_empty());
        }
        other => panic!("expected escalation, got {:?}", other),
    }
    assert!(result.is_escalated());
    assert_eq!(generator.seen.lock().len(), 1);

    let metrics = coach.metrics();
    assert_eq!(metrics.escalations, 1);
    assert_eq!(metrics.corrections, 0);
    assert_eq!(metrics.schedules_issued, 1);
}

#[tokio::test]
async fn test_timeout_falls_back_within_bound() {
    let (coach, _generator, id) =
        coach_with_schedule(OnCorrection::Sleep(Duration::from_secs(10)), 0.2).await;
    let original = coach.issued_schedule("learner-1", &id).unwrap();

    let started = Instant::now();
    let result = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(0.20))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    assert_eq!(result.provenance(), Some(Provenance::LocalFallback));
    assert_eq!(result.schedule().unwrap().blocks, local_correction(&original.blocks));
    match result {
        CorrectionResult::Corrected { fallback_reason, .. } => {
            assert!(fallback_reason.unwrap().contains("timed out"));
        }
        other => panic!("expected correction, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_falls_back() {
    let (coach, _generator, id) =
        coach_with_schedule(OnCorrection::Sleep(Duration::from_secs(10)), 30.0).await;

    let started = Instant::now();
    let result = coach
        .submit_feedback_until(
            "learner-1",
            &id,
            FeedbackAnalysis::with_ratio(0.25),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.provenance(), Some(Provenance::LocalFallback));
    match result {
        CorrectionResult::Corrected { fallback_reason, .. } => {
            assert!(fallback_reason.unwrap().contains("cancelled"));
        }
        other => panic!("expected correction, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_correction_falls_back() {
    let (coach, _generator, id) = coach_with_schedule(OnCorrection::Fail, 5.0).await;
    let result = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(0.15))
        .await
        .unwrap();
    assert_eq!(result.provenance(), Some(Provenance::LocalFallback));
    assert_eq!(coach.metrics().fallbacks, 2);
}

#[tokio::test]
async fn test_unchanged_correction_is_rejected() {
    let (coach, _generator, id) = coach_with_schedule(OnCorrection::Echo, 5.0).await;
    let original = coach.issued_schedule("learner-1", &id).unwrap();
    let result = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(0.15))
        .await
        .unwrap();

    assert_eq!(result.provenance(), Some(Provenance::LocalFallback));
    assert_ne!(result.schedule().unwrap().fingerprint(), original.fingerprint());
}

#[tokio::test]
async fn test_unknown_schedule_is_not_found() {
    let (coach, _generator, _id) = coach_with_schedule(OnCorrection::Fixed, 5.0).await;
    let err = coach
        .submit_feedback("learner-1", "sched_0_missing", FeedbackAnalysis::with_ratio(0.2))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_invalid_ratio_is_rejected() {
    let (coach, generator, id) = coach_with_schedule(OnCorrection::Fixed, 5.0).await;
    let err = coach
        .submit_feedback("learner-1", &id, FeedbackAnalysis::with_ratio(1.2))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(generator.seen.lock().len(), 1);
    assert_eq!(coach.metrics().validation_rejections, 1);
}
