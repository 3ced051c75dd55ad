use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use crate::activity::{ActivityRecord, ActivityTracker, InFlightActivity, Metadata};
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::hub::{BroadcastHub, StateUpdate, UpdateCause};
use crate::schedule::{IssuedSchedules, Schedule};
use crate::state::learner::{EmotionHistoryEntry, LearnerState, Observation};
use crate::state::push_bounded;

/// Current state plus the inputs the stress formulas need
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub state: LearnerState,
    pub error_rate: f64,
    pub sequence: u64,
}

/// Copy of both bounded logs, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub emotion: Vec<EmotionHistoryEntry>,
    pub activities: Vec<ActivityRecord>,
}

struct SessionInner {
    state: LearnerState,
    error_rate: f64,
    sequence: u64,
    emotion_history: VecDeque<EmotionHistoryEntry>,
    emotion_capacity: usize,
    activities: ActivityTracker,
}

/// Sole owner of one learner's state and logs.
///
/// Every write goes through one mutex, so writes are linearizable per
/// learner. Readers copy what they need and release the lock before
/// computing anything.
pub struct LearnerSession {
    learner_id: String,
    inner: Mutex<SessionInner>,
    issued: Mutex<IssuedSchedules>,
    hub: BroadcastHub,
}

impl LearnerSession {
    pub fn new(
        learner_id: &str,
        history: &HistoryConfig,
        issued_capacity: usize,
        hub: BroadcastHub,
        now: DateTime<Utc>,
    ) -> Self {
        LearnerSession {
            learner_id: learner_id.to_string(),
            inner: Mutex::new(SessionInner {
                state: LearnerState::neutral(now),
                error_rate: 0.0,
                sequence: 0,
                emotion_history: VecDeque::with_capacity(history.emotion_capacity.min(64)),
                emotion_capacity: history.emotion_capacity,
                activities: ActivityTracker::new(history.activity_capacity),
            }),
            issued: Mutex::new(IssuedSchedules::new(issued_capacity)),
            hub,
        }
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.lock();
        StateSnapshot {
            state: inner.state,
            error_rate: inner.error_rate,
            sequence: inner.sequence,
        }
    }

    pub fn state(&self) -> LearnerState {
        self.inner.lock().state
    }

    pub fn history(&self) -> HistorySnapshot {
        let inner = self.inner.lock();
        HistorySnapshot {
            emotion: inner.emotion_history.iter().copied().collect(),
            activities: inner.activities.records(),
        }
    }

    /// Validate and apply an observation, append to the emotion history and
    /// publish the new state. Invalid input leaves everything unchanged.
    pub fn apply(&self, observation: &Observation, now: DateTime<Utc>) -> Result<StateUpdate> {
        observation.validate()?;

        let mut inner = self.inner.lock();
        let next = observation.apply(&inner.state, now);
        inner.state = next;
        if let Some(rate) = observation.error_rate() {
            inner.error_rate = rate;
        }
        let capacity = inner.emotion_capacity;
        push_bounded(&mut inner.emotion_history, EmotionHistoryEntry::from_state(&next), capacity);
        inner.sequence += 1;

        let update = StateUpdate {
            learner_id: self.learner_id.clone(),
            sequence: inner.sequence,
            cause: match observation {
                Observation::MoodDelta { .. } => UpdateCause::MoodDelta,
                Observation::Full { .. } => UpdateCause::FullVector,
            },
            state: next,
        };
        // Published under the lock so every subscriber sees sequence order.
        self.hub.publish(&update);
        tracing::debug!(
            learner_id = %self.learner_id,
            sequence = update.sequence,
            mood = next.mood,
            stress = next.stress,
            "Learner state updated"
        );
        Ok(update)
    }

    pub fn start_activity(&self, kind: &str, metadata: Metadata, at: DateTime<Utc>) -> Result<String> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        inner.activities.start(&self.learner_id, kind, metadata, state, at)
    }

    /// `state_after` is the state at the moment this call takes the lock
    pub fn end_activity(
        &self,
        activity_id: &str,
        performance: f64,
        metadata: Metadata,
        at: DateTime<Utc>,
    ) -> Result<ActivityRecord> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        inner.activities.end(activity_id, performance, metadata, state, at)
    }

    pub fn in_flight(&self) -> Option<InFlightActivity> {
        self.inner.lock().activities.in_flight().cloned()
    }

    pub fn remember_schedule(&self, schedule: Schedule) {
        self.issued.lock().remember(schedule);
    }

    pub fn issued_schedule(&self, schedule_id: &str) -> Option<Schedule> {
        self.issued.lock().get(schedule_id)
    }
}
