//! Event publisher abstraction for pushing round state to clients.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::domain::UserId;

pub mod events;
pub mod hub;
pub mod mock;

pub use events::{BalanceReason, BalanceUpdate, GameEvent};
pub use hub::EventHub;
pub use mock::RecordingPublisher;

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Audience {
    All,
    Room(String),
    User(UserId),
}

/// Room that admin clients join for override confirmations.
pub const ADMIN_ROOM: &str = "admins";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub audience: Audience,
    pub event: GameEvent,
}

impl Envelope {
    pub fn to_all(event: GameEvent) -> Self {
        Self {
            audience: Audience::All,
            event,
        }
    }

    pub fn to_room(room: &str, event: GameEvent) -> Self {
        Self {
            audience: Audience::Room(room.to_string()),
            event,
        }
    }

    pub fn to_user(user: UserId, event: GameEvent) -> Self {
        Self {
            audience: Audience::User(user),
            event,
        }
    }
}

/// Fan-out channel for game events.
///
/// Publishing never fails from the caller's point of view: with no connected
/// transport an event is simply dropped.
#[async_trait]
pub trait Publisher: Send + Sync + fmt::Debug {
    async fn publish(&self, envelope: Envelope);

    async fn publish_all(&self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            self.publish(envelope).await;
        }
    }
}

/// Publisher with no transport behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, _envelope: Envelope) {}
}
