use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use crate::error::{check_range, CoachError, Result};
use crate::state::learner::LearnerState;
use crate::state::push_bounded;

/// Opaque caller-supplied key/value data attached to an activity
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The single unit of work a learner currently has open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightActivity {
    pub id: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    pub state_at_start: LearnerState,
    pub metadata: Metadata,
}

/// A finished unit of work. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub activity_kind: String,
    pub state_before: LearnerState,
    pub state_after: LearnerState,
    pub performance: f64,
    pub duration_minutes: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl ActivityRecord {
    /// Change in mood across the activity
    pub fn mood_delta(&self) -> f64 {
        self.state_after.mood - self.state_before.mood
    }

    pub fn stress_delta(&self) -> f64 {
        self.state_after.stress - self.state_before.stress
    }
}

/// Start/end protocol plus the bounded log of finished activities.
///
/// Lives inside a learner session and is only touched under that session's
/// lock.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    in_flight: Option<InFlightActivity>,
    log: VecDeque<ActivityRecord>,
    capacity: usize,
    started: u64,
}

impl ActivityTracker {
    pub fn new(capacity: usize) -> Self {
        ActivityTracker {
            in_flight: None,
            log: VecDeque::with_capacity(capacity.min(128)),
            capacity,
            started: 0,
        }
    }

    /// Open a new activity, capturing `state` by value.
    /// Fails with `Conflict` while another one is open.
    pub fn start(
        &mut self,
        learner_id: &str,
        kind: &str,
        metadata: Metadata,
        state: LearnerState,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(CoachError::validation("kind", "must not be empty"));
        }
        if let Some(open) = &self.in_flight {
            return Err(CoachError::Conflict {
                learner_id: learner_id.to_string(),
                in_flight: open.id.clone(),
            });
        }

        self.started += 1;
        let id = format!("act_{}_{}", at.timestamp_millis(), self.started);
        self.in_flight = Some(InFlightActivity {
            id: id.clone(),
            kind: kind.to_string(),
            started_at: at,
            state_at_start: state,
            metadata,
        });
        Ok(id)
    }

    /// Close the open activity with id `activity_id`.
    ///
    /// `state` is the snapshot taken at end time and becomes `state_after`.
    /// End metadata is merged over the start metadata.
    pub fn end(
        &mut self,
        activity_id: &str,
        performance: f64,
        metadata: Metadata,
        state: LearnerState,
        at: DateTime<Utc>,
    ) -> Result<ActivityRecord> {
        check_range("performance", performance, 0.0, 1.0)?;
        let matches = self
            .in_flight
            .as_ref()
            .map(|open| open.id == activity_id)
            .unwrap_or(false);
        if !matches {
            return Err(CoachError::not_found("activity", activity_id));
        }
        let open = match self.in_flight.take() {
            Some(open) => open,
            None => return Err(CoachError::not_found("activity", activity_id)),
        };

        let mut merged = open.metadata;
        merged.extend(metadata);

        let record = ActivityRecord {
            id: open.id,
            activity_kind: open.kind,
            state_before: open.state_at_start,
            state_after: state,
            performance,
            duration_minutes: (at - open.started_at).num_minutes().max(0),
            started_at: open.started_at,
            ended_at: at.max(open.started_at),
            metadata: merged,
        };
        push_bounded(&mut self.log, record.clone(), self.capacity);
        Ok(record)
    }

    pub fn in_flight(&self) -> Option<&InFlightActivity> {
        self.in_flight.as_ref()
    }

    /// Oldest first
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.log.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
