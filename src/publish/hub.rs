//! In-process broadcast hub backing the SSE stream.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{Audience, Envelope, Publisher};
use crate::domain::UserId;

#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Envelope>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Publisher for EventHub {
    async fn publish(&self, envelope: Envelope) {
        let name = envelope.event.name();
        if self.tx.send(envelope).is_err() {
            debug!(event = name, "no subscribers, event dropped");
        }
    }
}

/// What one subscriber has asked to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    pub user: Option<UserId>,
    pub rooms: Vec<String>,
}

impl Subscription {
    pub fn wants(&self, audience: &Audience) -> bool {
        match audience {
            Audience::All => true,
            Audience::Room(room) => self.rooms.iter().any(|r| r == room),
            Audience::User(user) => self.user.as_ref() == Some(user),
        }
    }
}
