//! Recording publisher for tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{Envelope, Publisher};

/// Publisher that keeps every envelope it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<Envelope>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn envelopes(&self) -> Vec<Envelope> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Names of published events, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.envelopes().iter().map(|e| e.event.name()).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, envelope: Envelope) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(envelope),
            Err(poisoned) => poisoned.into_inner().push(envelope),
        }
    }
}
