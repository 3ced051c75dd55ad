use std::future::{self, Future};
use chrono::{DateTime, Utc};
use crate::activity::{ActivityRecord, Metadata};
use crate::analytics::{compute_analytics, AnalyticsReport};
use crate::config::EngineConfig;
use crate::correction::{self, decide, CorrectionDecision, CorrectionResult, FeedbackAnalysis};
use crate::error::{check_range, CoachError, Result};
use crate::fusion::{fuse, CbtDifficulty, FusedScores, StressScore};
use crate::hub::{StateUpdate, Subscription, Unsubscribe};
use crate::logging::log_fallback;
use crate::metrics::MetricsSnapshot;
use crate::persist::{JsonlSink, NoopSink, PersistRecord, SnapshotSink};
use crate::pipelines::{
    CorrectionHint, GenerationRequest, GenerationRouter, HttpScheduleGenerator, OfflineGenerator,
    ScheduleGenerator, ScoreSummary,
};
use crate::recommendation::{recommend, Recommendation};
use crate::schedule::{fallback_blocks, FallbackInputs, Provenance, Schedule};
use crate::state::{AppState, HistorySnapshot, LearnerState, Observation, StateSnapshot};

/// Entry point for every inbound operation, keyed by learner id.
///
/// Synchronous operations finish under the learner's lock. The two async
/// ones (`request_schedule`, `submit_feedback`) copy a snapshot first and
/// never hold a lock while waiting on the generator.
pub struct Coach<G, S = NoopSink> {
    app: AppState,
    router: GenerationRouter<G>,
    sink: S,
}

impl Coach<OfflineGenerator, NoopSink> {
    /// Coach with no generator and no persistence; every schedule is local
    pub fn offline(config: EngineConfig) -> Result<Self> {
        Coach::new(config, OfflineGenerator, NoopSink)
    }
}

impl Coach<HttpScheduleGenerator, Option<JsonlSink>> {
    /// HTTP generator from `config.generator`, plus a JSON-lines sink when
    /// `config.persist.path` is set. Must be called inside a tokio runtime
    /// when a sink path is configured.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let generator = HttpScheduleGenerator::new(&config.generator)?;
        let app = AppState::new(config);
        let sink = app
            .config
            .persist
            .path
            .clone()
            .map(|path| JsonlSink::spawn(path, app.metrics.clone()));
        Coach::with_state(app, generator, sink)
    }
}

impl<G: ScheduleGenerator, S: SnapshotSink> Coach<G, S> {
    pub fn new(config: EngineConfig, generator: G, sink: S) -> Result<Self> {
        Coach::with_state(AppState::new(config), generator, sink)
    }

    /// Build around an existing state container, e.g. one whose metrics a
    /// sink already shares
    pub fn with_state(app: AppState, generator: G, sink: S) -> Result<Self> {
        app.config.validate()?;
        let router = GenerationRouter::new(generator, &app.config.generator);
        tracing::info!(
            deadline_ms = router.deadline().as_millis() as u64,
            max_blocks = app.config.schedule.max_blocks,
            "Coach initialized"
        );
        Ok(Coach { app, router, sink })
    }

    pub fn app(&self) -> &AppState {
        &self.app
    }

    pub fn config(&self) -> &EngineConfig {
        &self.app.config
    }

    pub fn router(&self) -> &GenerationRouter<G> {
        &self.router
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.app.metrics.snapshot()
    }

    /// Count validation rejections on the way out
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_validation() {
                self.app.metrics.record_validation_rejection();
                tracing::debug!(error = %e, "Inbound call rejected");
            }
        }
        result
    }

    // ---- state ----

    pub fn push_observation(&self, learner_id: &str, observation: Observation) -> Result<StateUpdate> {
        self.push_observation_at(learner_id, observation, Utc::now())
    }

    pub fn push_observation_at(
        &self,
        learner_id: &str,
        observation: Observation,
        now: DateTime<Utc>,
    ) -> Result<StateUpdate> {
        let update = self.track(
            self.app
                .session(learner_id)
                .and_then(|session| session.apply(&observation, now)),
        )?;
        self.app.metrics.record_observation();
        self.sink.persist(PersistRecord::State {
            learner_id: update.learner_id.clone(),
            sequence: update.sequence,
            state: update.state,
        });
        Ok(update)
    }

    pub fn state(&self, learner_id: &str) -> Result<LearnerState> {
        Ok(self.track(self.app.session(learner_id))?.state())
    }

    pub fn snapshot(&self, learner_id: &str) -> Result<StateSnapshot> {
        Ok(self.track(self.app.session(learner_id))?.snapshot())
    }

    pub fn history(&self, learner_id: &str) -> Result<HistorySnapshot> {
        Ok(self.track(self.app.session(learner_id))?.history())
    }

    // ---- activities ----

    pub fn start_activity(&self, learner_id: &str, kind: &str, metadata: Metadata) -> Result<String> {
        self.start_activity_at(learner_id, kind, metadata, Utc::now())
    }

    pub fn start_activity_at(
        &self,
        learner_id: &str,
        kind: &str,
        metadata: Metadata,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let id = self.track(
            self.app
                .session(learner_id)
                .and_then(|session| session.start_activity(kind, metadata, at)),
        )?;
        self.app.metrics.record_activity_started();
        tracing::debug!(learner_id = learner_id, activity_id = %id, kind = kind, "Activity started");
        Ok(id)
    }

    pub fn end_activity(
        &self,
        learner_id: &str,
        activity_id: &str,
        performance: f64,
        metadata: Metadata,
    ) -> Result<ActivityRecord> {
        self.end_activity_at(learner_id, activity_id, performance, metadata, Utc::now())
    }

    pub fn end_activity_at(
        &self,
        learner_id: &str,
        activity_id: &str,
        performance: f64,
        metadata: Metadata,
        at: DateTime<Utc>,
    ) -> Result<ActivityRecord> {
        let record = self.track(
            self.app
                .session(learner_id)
                .and_then(|session| session.end_activity(activity_id, performance, metadata, at)),
        )?;
        self.app.metrics.record_activity_ended();
        tracing::debug!(
            learner_id = learner_id,
            activity_id = %record.id,
            duration_minutes = record.duration_minutes,
            performance = record.performance,
            "Activity ended"
        );
        self.sink.persist(PersistRecord::Activity {
            learner_id: learner_id.trim().to_string(),
            record: record.clone(),
        });
        Ok(record)
    }

    // ---- derived scores ----

    pub fn fused_scores(&self, learner_id: &str) -> Result<FusedScores> {
        let snapshot = self.snapshot(learner_id)?;
        Ok(fuse(&snapshot.state, snapshot.error_rate, Utc::now()))
    }

    pub fn stress_score(&self, learner_id: &str) -> Result<StressScore> {
        Ok(self.fused_scores(learner_id)?.stress)
    }

    pub fn cbt_difficulty(&self, learner_id: &str) -> Result<CbtDifficulty> {
        Ok(self.fused_scores(learner_id)?.cbt_difficulty)
    }

    pub fn should_take_break(&self, learner_id: &str) -> Result<bool> {
        Ok(self.fused_scores(learner_id)?.should_break)
    }

    pub fn recommendation(&self, learner_id: &str) -> Result<Recommendation> {
        Ok(recommend(&self.state(learner_id)?))
    }

    pub fn analytics(&self, learner_id: &str) -> Result<AnalyticsReport> {
        Ok(compute_analytics(&self.history(learner_id)?))
    }

    // ---- schedules ----

    pub fn issued_schedule(&self, learner_id: &str, schedule_id: &str) -> Result<Schedule> {
        self.track(self.app.session(learner_id))?
            .issued_schedule(schedule_id)
            .ok_or_else(|| CoachError::not_found("schedule", schedule_id))
    }

    /// Ask the generator for a study routine; any failure falls back to the
    /// deterministic local partition. Only validation errors reach the caller.
    pub async fn request_schedule(&self, learner_id: &str, exam_type: &str, daily_hours: f64) -> Result<Schedule> {
        let validated = check_range("daily_hours", daily_hours, 0.0, 24.0).and_then(|hours| {
            if hours <= 0.0 {
                Err(CoachError::validation("daily_hours", "must be greater than 0"))
            } else if exam_type.trim().is_empty() {
                Err(CoachError::validation("exam_type", "must not be empty"))
            } else {
                Ok(hours)
            }
        });
        let daily_hours = self.track(validated)?;
        let session = self.track(self.app.session(learner_id))?;

        let now = Utc::now();
        let snapshot = session.snapshot();
        let scores = ScoreSummary::from_snapshot(&snapshot, now);
        let max_blocks = self.app.config.schedule.max_blocks;
        let request = GenerationRequest {
            learner_id: session.learner_id().to_string(),
            exam_type: exam_type.trim().to_string(),
            study_minutes: (daily_hours * 60.0).round() as u32,
            max_blocks,
            scores,
            correction: None,
        };

        let (blocks, provenance) = match self.router.generate(&request).await {
            Ok(blocks) => {
                self.app.metrics.record_external_success();
                (blocks, Provenance::External)
            }
            Err(e) => {
                self.app.metrics.record_fallback();
                log_fallback(session.learner_id(), "fallback_schedule", &e.to_string());
                let inputs = FallbackInputs {
                    daily_hours,
                    fatigue: scores.fatigue,
                    stress_score: scores.routine_stress_score,
                    confidence: scores.confidence,
                };
                (fallback_blocks(&inputs, max_blocks), Provenance::LocalFallback)
            }
        };

        let schedule = Schedule::new(session.learner_id(), &request.exam_type, blocks, provenance, Utc::now());
        session.remember_schedule(schedule.clone());
        self.app.metrics.record_schedule_issued();
        tracing::info!(
            learner_id = %schedule.learner_id,
            schedule_id = %schedule.id,
            provenance = ?schedule.provenance,
            blocks = schedule.blocks.len(),
            work_minutes = schedule.work_minutes(),
            "Schedule issued"
        );
        Ok(schedule)
    }

    // ---- correction loop ----

    pub async fn submit_feedback(
        &self,
        learner_id: &str,
        schedule_id: &str,
        feedback: FeedbackAnalysis,
    ) -> Result<CorrectionResult> {
        self.submit_feedback_until(learner_id, schedule_id, feedback, future::pending()).await
    }

    /// Like [`Coach::submit_feedback`], but if `cancel` resolves before the
    /// generator answers the local correction is used.
    pub async fn submit_feedback_until<C>(
        &self,
        learner_id: &str,
        schedule_id: &str,
        feedback: FeedbackAnalysis,
        cancel: C,
    ) -> Result<CorrectionResult>
    where
        C: Future<Output = ()>,
    {
        self.track(feedback.validate())?;
        let session = self.track(self.app.session(learner_id))?;
        let original = session
            .issued_schedule(schedule_id)
            .ok_or_else(|| CoachError::not_found("schedule", schedule_id))?;
        let band = &self.app.config.correction;

        let strength = match decide(feedback.negative_ratio, band) {
            CorrectionDecision::Healthy => {
                tracing::debug!(
                    learner_id = session.learner_id(),
                    schedule_id = schedule_id,
                    negative_ratio = feedback.negative_ratio,
                    "Feedback below correction band"
                );
                return Ok(CorrectionResult::NotNeeded {
                    schedule_id: original.id,
                    negative_ratio: feedback.negative_ratio,
                });
            }
            CorrectionDecision::Escalate => {
                self.app.metrics.record_escalation();
                let reason = format!(
                    "negative ratio {:.2} is above the automatic correction band ({:.2}..={:.2})",
                    feedback.negative_ratio, band.lower_ratio, band.upper_ratio
                );
                tracing::warn!(
                    learner_id = session.learner_id(),
                    schedule_id = schedule_id,
                    negative_ratio = feedback.negative_ratio,
                    sample_size = feedback.sample_size,
                    "Feedback out of band, escalating"
                );
                return Ok(CorrectionResult::Escalated {
                    schedule_id: original.id,
                    negative_ratio: feedback.negative_ratio,
                    reason,
                });
            }
            CorrectionDecision::Correct { strength } => strength,
        };

        let now = Utc::now();
        let request = GenerationRequest {
            learner_id: session.learner_id().to_string(),
            exam_type: original.exam_type.clone(),
            study_minutes: original.total_minutes(),
            max_blocks: self.app.config.schedule.max_blocks,
            scores: ScoreSummary::from_snapshot(&session.snapshot(), now),
            correction: Some(CorrectionHint {
                original: original.clone(),
                feedback,
                strength,
            }),
        };

        let regenerated = correction::regenerate(&self.router, &request, &original, cancel).await;
        match (&regenerated.provenance, &regenerated.fallback_reason) {
            (Provenance::LocalFallback, Some(reason)) => {
                self.app.metrics.record_fallback();
                log_fallback(session.learner_id(), "local_correction", reason);
            }
            _ => self.app.metrics.record_external_success(),
        }

        let schedule = Schedule::new(
            session.learner_id(),
            &original.exam_type,
            regenerated.blocks,
            regenerated.provenance,
            Utc::now(),
        )
        .correcting(&original.id);
        session.remember_schedule(schedule.clone());
        self.app.metrics.record_correction();
        self.app.metrics.record_schedule_issued();
        tracing::info!(
            learner_id = session.learner_id(),
            original_id = %original.id,
            schedule_id = %schedule.id,
            provenance = ?schedule.provenance,
            strength = strength,
            "Schedule corrected"
        );

        Ok(CorrectionResult::Corrected {
            original_id: original.id,
            schedule,
            strength,
            fallback_reason: regenerated.fallback_reason,
        })
    }

    // ---- broadcast ----

    /// Every update for every learner
    pub fn subscribe(&self) -> Subscription {
        self.app.hub.subscribe()
    }

    pub fn subscribe_learner(&self, learner_id: &str) -> Subscription {
        self.app.hub.subscribe_learner(learner_id)
    }

    /// Run `callback` on a spawned task for each update. Requires a tokio runtime.
    pub fn subscribe_with<F>(&self, learner_id: Option<&str>, callback: F) -> Unsubscribe
    where
        F: FnMut(StateUpdate) + Send + 'static,
    {
        self.app.hub.subscribe_with(learner_id, callback)
    }
}
