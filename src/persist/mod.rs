use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use crate::activity::ActivityRecord;
use crate::metrics::Metrics;
use crate::state::LearnerState;

/// One line in the snapshot log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PersistRecord {
    #[serde(rename_all = "camelCase")]
    State {
        learner_id: String,
        sequence: u64,
        state: LearnerState,
    },
    #[serde(rename_all = "camelCase")]
    Activity {
        learner_id: String,
        record: ActivityRecord,
    },
}

impl PersistRecord {
    pub fn learner_id(&self) -> &str {
        match self {
            PersistRecord::State { learner_id, .. } | PersistRecord::Activity { learner_id, .. } => learner_id,
        }
    }
}

/// Outbound port to an external store. Must return immediately; failures
/// are the sink's problem.
pub trait SnapshotSink: Send + Sync {
    fn persist(&self, record: PersistRecord);
}

impl<S: SnapshotSink> SnapshotSink for Arc<S> {
    fn persist(&self, record: PersistRecord) {
        (**self).persist(record)
    }
}

/// `None` discards, so an optional configured sink is itself a sink
impl<S: SnapshotSink> SnapshotSink for Option<S> {
    fn persist(&self, record: PersistRecord) {
        if let Some(sink) = self {
            sink.persist(record)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl SnapshotSink for NoopSink {
    fn persist(&self, _record: PersistRecord) {}
}

/// Appends one JSON object per line from a background task.
///
/// `persist` only enqueues. Write errors are logged and counted in
/// [`Metrics`]; the writer keeps running.
#[derive(Clone)]
pub struct JsonlSink {
    path: PathBuf,
    sender: mpsc::UnboundedSender<PersistRecord>,
    metrics: Metrics,
}

impl JsonlSink {
    /// Must be called inside a tokio runtime
    pub fn spawn(path: impl Into<PathBuf>, metrics: Metrics) -> Self {
        let path = path.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(path.clone(), receiver, metrics.clone()));
        tracing::info!(path = ?path, "Snapshot sink started");
        JsonlSink { path, sender, metrics }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonlSink {
    fn persist(&self, record: PersistRecord) {
        if self.sender.send(record).is_err() {
            self.metrics.record_persist_failure();
            tracing::warn!(path = ?self.path, "Snapshot writer has stopped, record dropped");
        }
    }
}

async fn write_loop(path: PathBuf, mut receiver: mpsc::UnboundedReceiver<PersistRecord>, metrics: Metrics) {
    while let Some(record) = receiver.recv().await {
        if let Err(e) = append_line(&path, &record).await {
            metrics.record_persist_failure();
            tracing::warn!(
                path = ?path,
                learner_id = %record.learner_id(),
                error = %e,
                "Failed to persist snapshot"
            );
        }
    }
    tracing::debug!(path = ?path, "Snapshot writer finished");
}

async fn append_line(path: &Path, record: &PersistRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await
}

/// Read a snapshot log back, skipping lines that fail to parse
pub async fn read_records(path: &Path) -> std::io::Result<Vec<PersistRecord>> {
    let data = tokio::fs::read_to_string(path).await?;
    Ok(data
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Skipping unreadable snapshot line");
                None
            }
        })
        .collect())
}
