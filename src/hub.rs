use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use crate::metrics::Metrics;
use crate::state::learner::LearnerState;

pub type SubscriberId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateCause {
    MoodDelta,
    FullVector,
}

/// One state mutation as seen by subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub learner_id: String,
    /// Per-learner, strictly increasing
    pub sequence: u64,
    pub cause: UpdateCause,
    pub state: LearnerState,
}

struct Subscriber {
    learner_filter: Option<String>,
    sender: mpsc::UnboundedSender<StateUpdate>,
}

impl Subscriber {
    fn matches(&self, update: &StateUpdate) -> bool {
        match &self.learner_filter {
            Some(id) => *id == update.learner_id,
            None => true,
        }
    }
}

struct HubInner {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    metrics: Metrics,
}

/// Fan-out of state mutations.
///
/// Each subscriber owns an unbounded channel, so a publisher never waits on
/// a slow consumer and every subscriber sees updates in publish order.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    pub fn new(metrics: Metrics) -> Self {
        BroadcastHub {
            inner: Arc::new(HubInner {
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(HashMap::new()),
                metrics,
            }),
        }
    }

    /// Deliver `update` to every matching subscriber; returns the delivery count.
    /// Subscribers whose receiver is gone are pruned.
    pub fn publish(&self, update: &StateUpdate) -> usize {
        let mut delivered = 0usize;
        let mut closed = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.matches(update) {
                    continue;
                }
                match subscriber.sender.send(update.clone()) {
                    Ok(()) => delivered += 1,
                    Err(_) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in &closed {
                subscribers.remove(id);
            }
        }

        self.inner.metrics.record_broadcasts(delivered as u64);
        tracing::debug!(
            learner_id = %update.learner_id,
            sequence = update.sequence,
            sent_to = delivered,
            pruned = closed.len(),
            "State update published"
        );
        delivered
    }

    /// Receive updates for every learner
    pub fn subscribe(&self) -> Subscription {
        self.register(None)
    }

    /// Receive updates for one learner only. The id is trimmed the same way
    /// session lookups trim it.
    pub fn subscribe_learner(&self, learner_id: &str) -> Subscription {
        self.register(Some(learner_id.trim().to_string()))
    }

    /// Run `callback` on a background task for every update.
    /// Must be called inside a tokio runtime.
    pub fn subscribe_with<F>(&self, learner_filter: Option<&str>, mut callback: F) -> Unsubscribe
    where
        F: FnMut(StateUpdate) + Send + 'static,
    {
        let mut subscription = self.register(learner_filter.map(|id| id.trim().to_string()));
        let id = subscription.id;
        let task = tokio::spawn(async move {
            while let Some(update) = subscription.recv().await {
                callback(update);
            }
        });
        Unsubscribe {
            id,
            hub: self.clone(),
            task,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    fn register(&self, learner_filter: Option<String>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().insert(
            id,
            Subscriber {
                learner_filter,
                sender,
            },
        );
        tracing::debug!(subscriber_id = id, "New subscription created");
        Subscription {
            id,
            receiver,
            hub: self.clone(),
        }
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.write().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber_id = id, "Subscription removed");
        }
        removed
    }
}

/// Ordered stream of updates for one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<StateUpdate>,
    hub: BroadcastHub,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next update; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<StateUpdate> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StateUpdate> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    /// Use as a `Stream`. Dropping the stream unsubscribes.
    pub fn into_stream(self) -> impl Stream<Item = StateUpdate> + Send + Unpin {
        self
    }
}

impl Stream for Subscription {
    type Item = StateUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StateUpdate>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

/// Handle returned by [`BroadcastHub::subscribe_with`]
pub struct Unsubscribe {
    id: SubscriberId,
    hub: BroadcastHub,
    task: JoinHandle<()>,
}

impl Unsubscribe {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop delivery. Updates already queued may still be processed.
    pub fn unsubscribe(self) {
        self.hub.remove(self.id);
    }

    /// Stop delivery and cancel the callback task immediately
    pub fn abort(self) {
        self.hub.remove(self.id);
        self.task.abort();
    }
}
