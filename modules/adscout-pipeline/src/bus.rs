//! Per-keyword broadcast bus with bounded subscriber queues.
//!
//! One critical section covers snapshot maintenance and fan-out, which
//! serializes publishes per keyword: every subscriber sees events for a
//! keyword in publish order. Delivery is best-effort — a subscriber whose
//! queue stays full for the publish timeout is dropped, never waited on.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{Envelope, PipelineEvent};

pub type SubscriberId = Uuid;

/// Bounded queue depth per subscriber.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// How long a publish will wait on one slow subscriber before dropping it.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Running,
    Completed,
    Failed,
}

/// Last known state for a keyword, retained for late joiners. History is
/// unbounded within a run; it lives only as long as the snapshot itself.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub status: StreamStatus,
    pub started_at: DateTime<Utc>,
    pub current_step: u8,
    pub events: Vec<Envelope>,
}

#[derive(Default)]
struct BusState {
    subscribers: HashMap<String, HashMap<SubscriberId, mpsc::Sender<Envelope>>>,
    snapshots: HashMap<String, PipelineState>,
}

#[derive(Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber for a keyword. If a run snapshot exists,
    /// a state_sync event is already queued when this returns, so late
    /// joiners see current progress before any live event.
    pub async fn subscribe(&self, keyword: &str) -> (SubscriberId, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = Uuid::new_v4();

        let mut state = self.state.lock().await;
        if let Some(snapshot) = state.snapshots.get(keyword) {
            // Fresh queue, cannot be full.
            let _ = tx.try_send(Envelope {
                event: PipelineEvent::StateSync {
                    state: snapshot.clone(),
                },
                correlation_id: None,
                timestamp: Utc::now(),
            });
        }
        state
            .subscribers
            .entry(keyword.to_string())
            .or_default()
            .insert(id, tx);

        debug!(keyword, subscriber_id = %id, "Subscriber added");
        (id, rx)
    }

    /// Remove a subscriber. The per-keyword map entry is dropped when the
    /// last subscriber leaves; the snapshot stays until explicitly cleared.
    pub async fn unsubscribe(&self, keyword: &str, id: SubscriberId) {
        let mut state = self.state.lock().await;
        if let Some(subs) = state.subscribers.get_mut(keyword) {
            subs.remove(&id);
            if subs.is_empty() {
                state.subscribers.remove(keyword);
            }
            debug!(keyword, subscriber_id = %id, "Subscriber removed");
        }
    }

    /// Update the keyword's snapshot, then fan the event out to every
    /// subscriber. Subscribers that time out or have hung up are evicted
    /// after the broadcast loop.
    pub async fn publish(&self, keyword: &str, envelope: Envelope) {
        let mut state = self.state.lock().await;

        match &envelope.event {
            PipelineEvent::PipelineStart { .. } => {
                state.snapshots.insert(
                    keyword.to_string(),
                    PipelineState {
                        status: StreamStatus::Running,
                        started_at: envelope.timestamp,
                        current_step: 1,
                        events: vec![envelope.clone()],
                    },
                );
            }
            _ => {
                if let Some(snapshot) = state.snapshots.get_mut(keyword) {
                    match &envelope.event {
                        PipelineEvent::StepStart { step, .. } => snapshot.current_step = *step,
                        PipelineEvent::PipelineComplete { .. } => {
                            snapshot.status = StreamStatus::Completed
                        }
                        PipelineEvent::PipelineError { .. } => {
                            snapshot.status = StreamStatus::Failed
                        }
                        _ => {}
                    }
                    snapshot.events.push(envelope.clone());
                }
            }
        }

        let mut dead = Vec::new();
        if let Some(subs) = state.subscribers.get(keyword) {
            for (id, tx) in subs.iter() {
                if tx
                    .send_timeout(envelope.clone(), PUBLISH_TIMEOUT)
                    .await
                    .is_err()
                {
                    warn!(keyword, subscriber_id = %id, "Subscriber queue stalled, dropping");
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            if let Some(subs) = state.subscribers.get_mut(keyword) {
                for id in &dead {
                    subs.remove(id);
                }
                if subs.is_empty() {
                    state.subscribers.remove(keyword);
                }
            }
        }
    }

    /// Drop the retained state for a keyword (after completion or deletion).
    pub async fn clear_snapshot(&self, keyword: &str) {
        self.state.lock().await.snapshots.remove(keyword);
    }

    /// Current snapshot for a keyword, if any.
    pub async fn snapshot(&self, keyword: &str) -> Option<PipelineState> {
        self.state.lock().await.snapshots.get(keyword).cloned()
    }

    /// Live subscriber count for a keyword.
    pub async fn subscriber_count(&self, keyword: &str) -> usize {
        self.state
            .lock()
            .await
            .subscribers
            .get(keyword)
            .map_or(0, HashMap::len)
    }
}
