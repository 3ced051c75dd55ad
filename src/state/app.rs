use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use parking_lot::RwLock;
use crate::config::EngineConfig;
use crate::error::{CoachError, Result};
use crate::hub::BroadcastHub;
use crate::metrics::Metrics;
use crate::state::session::LearnerSession;

/// Application-wide state container.
/// Learner sessions are independent; nothing here locks across learners
/// except the registry map itself, and only while looking a session up.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub hub: BroadcastHub,
    pub metrics: Metrics,
    sessions: Arc<RwLock<HashMap<String, Arc<LearnerSession>>>>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        let metrics = Metrics::new();
        AppState {
            config: Arc::new(config),
            hub: BroadcastHub::new(metrics.clone()),
            metrics,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Session for `learner_id`, created with a neutral state on first use
    pub fn session(&self, learner_id: &str) -> Result<Arc<LearnerSession>> {
        let learner_id = learner_id.trim();
        if learner_id.is_empty() {
            return Err(CoachError::validation("learner_id", "must not be empty"));
        }

        if let Some(session) = self.sessions.read().get(learner_id) {
            return Ok(session.clone());
        }

        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(learner_id.to_string())
            .or_insert_with(|| {
                tracing::info!(learner_id = learner_id, "Learner session created");
                Arc::new(LearnerSession::new(
                    learner_id,
                    &self.config.history,
                    self.config.schedule.issued_capacity,
                    self.hub.clone(),
                    Utc::now(),
                ))
            })
            .clone();
        Ok(session)
    }

    /// Existing session only
    pub fn existing_session(&self, learner_id: &str) -> Option<Arc<LearnerSession>> {
        self.sessions.read().get(learner_id.trim()).cloned()
    }

    pub fn learner_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn learner_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
