//! Per-debate event fan-out with ordered delivery and late-subscriber catch-up.
//!
//! Each debate gets its own topic: an append-only log plus a
//! `tokio::sync::broadcast` sender. A subscriber receives a snapshot of
//! the log at attach time and a stream that continues from there — a
//! publish racing a subscribe can never produce a gap or a duplicate,
//! because the broadcast receiver is obtained before the retained log is
//! cloned out from under the same topic lock. A subscriber that falls far
//! enough behind to lag is simply dropped; the broadcaster does not try
//! to resynchronize it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

const TOPIC_CAPACITY: usize = 256;

/// One entry in a debate's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub sequence: u64,
    pub event_type: String,
    pub debate_id: Uuid,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

struct Topic {
    log: Vec<Envelope>,
    sender: broadcast::Sender<Envelope>,
}

impl Topic {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(TOPIC_CAPACITY);
        Self { log: Vec::new(), sender }
    }
}

/// A subscription: a catch-up slice plus a receiver for events published
/// after the snapshot was taken.
pub struct Subscription {
    pub backlog: Vec<Envelope>,
    pub receiver: broadcast::Receiver<Envelope>,
}

#[derive(Clone, Default)]
pub struct Broadcaster {
    topics: Arc<RwLock<HashMap<Uuid, Arc<RwLock<Topic>>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    async fn topic_for(&self, debate_id: Uuid) -> Arc<RwLock<Topic>> {
        if let Some(topic) = self.topics.read().await.get(&debate_id) {
            return topic.clone();
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(debate_id)
            .or_insert_with(|| Arc::new(RwLock::new(Topic::new())))
            .clone()
    }

    /// Appends `event_type`/`payload` to the debate's log and delivers it
    /// to every currently attached subscriber.
    pub async fn publish(&self, debate_id: Uuid, event_type: &str, payload: Value) {
        let topic = self.topic_for(debate_id).await;
        let mut guard = topic.write().await;
        let sequence = guard.log.len() as u64;
        let envelope = Envelope {
            sequence,
            event_type: event_type.to_string(),
            debate_id,
            payload,
            timestamp: Utc::now(),
        };
        guard.log.push(envelope.clone());
        // A send error just means there are currently no subscribers;
        // the log entry is retained for anyone who attaches later.
        let _ = guard.sender.send(envelope);
    }

    /// Attaches to a debate's topic, returning the full retained log as a
    /// catch-up backlog plus a receiver for anything published after.
    pub async fn subscribe(&self, debate_id: Uuid) -> Subscription {
        let topic = self.topic_for(debate_id).await;
        let guard = topic.read().await;
        let receiver = guard.sender.subscribe();
        let backlog = guard.log.clone();
        Subscription { backlog, receiver }
    }

    /// Drops a topic entirely. Called once a debate's record is deleted.
    pub async fn remove_topic(&self, debate_id: Uuid) {
        self.topics.write().await.remove(&debate_id);
    }
}
