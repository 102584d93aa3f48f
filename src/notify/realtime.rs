// Real-time alert broadcasting
//
// Monitoring dashboards subscribe to a tokio broadcast channel; each crisis
// alert is published once to every connected subscriber. No delivery
// guarantee: a lagging subscriber drops events, and nobody listening is fine.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Topic carried by crisis alert events
pub const CRISIS_ALERT_TOPIC: &str = "crisis_alert";

/// Payload shown to monitoring clients. Carries the alias only, never the
/// student's account id or name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub alert_id: String,
    pub student_alias: String,
    pub severity: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Event as it travels through the broadcaster
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    pub topic: String,
    pub payload: AlertEvent,
}

/// Trait for real-time publishers
pub trait RealtimePublisher: Send + Sync {
    /// Publish an event; returns how many subscribers received it
    fn publish(&self, topic: &str, payload: &AlertEvent) -> Result<usize>;
}

/// Broadcast-channel publisher
pub struct AlertBroadcaster {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl AlertBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscription
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    /// Number of connected monitoring clients
    pub fn monitor_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AlertBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimePublisher for AlertBroadcaster {
    fn publish(&self, topic: &str, payload: &AlertEvent) -> Result<usize> {
        let event = RealtimeEvent {
            topic: topic.to_string(),
            payload: payload.clone(),
        };
        // send only fails when there are no receivers
        Ok(self.sender.send(event).unwrap_or(0))
    }
}
