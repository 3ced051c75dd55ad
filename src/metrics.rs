use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

/// Process-wide counters. Cheap to clone; all clones share the same atomics.
#[derive(Clone, Default)]
pub struct Metrics {
    observations: Arc<AtomicU64>,
    validation_rejections: Arc<AtomicU64>,
    activities_started: Arc<AtomicU64>,
    activities_ended: Arc<AtomicU64>,
    broadcasts_delivered: Arc<AtomicU64>,
    schedules_issued: Arc<AtomicU64>,
    external_successes: Arc<AtomicU64>,
    fallbacks: Arc<AtomicU64>,
    corrections: Arc<AtomicU64>,
    escalations: Arc<AtomicU64>,
    persist_failures: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub observations: u64,
    pub validation_rejections: u64,
    pub activities_started: u64,
    pub activities_ended: u64,
    pub broadcasts_delivered: u64,
    pub schedules_issued: u64,
    pub external_successes: u64,
    pub fallbacks: u64,
    pub corrections: u64,
    pub escalations: u64,
    pub persist_failures: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_observation(&self) {
        self.observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activity_started(&self) {
        self.activities_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activity_ended(&self) {
        self.activities_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcasts(&self, delivered: u64) {
        self.broadcasts_delivered.fetch_add(delivered, Ordering::Relaxed);
    }

    pub fn record_schedule_issued(&self) {
        self.schedules_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_external_success(&self) {
        self.external_successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Collaborator failed and a local path produced the result
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_correction(&self) {
        self.corrections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &Arc<AtomicU64>| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            observations: load(&self.observations),
            validation_rejections: load(&self.validation_rejections),
            activities_started: load(&self.activities_started),
            activities_ended: load(&self.activities_ended),
            broadcasts_delivered: load(&self.broadcasts_delivered),
            schedules_issued: load(&self.schedules_issued),
            external_successes: load(&self.external_successes),
            fallbacks: load(&self.fallbacks),
            corrections: load(&self.corrections),
            escalations: load(&self.escalations),
            persist_failures: load(&self.persist_failures),
        }
    }
}
