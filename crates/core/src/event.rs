//! Domain event system: decoupled communication between bounded contexts.
//!
//! The session layer publishes an event whenever a session changes shape.
//! Other components (logging, tests) subscribe without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session was (re)started
    SessionStarted {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A glyph entry was committed to a session's collection
    GlyphCommitted {
        session_id: String,
        mapping: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A font was assembled and handed to the transport
    FontAssembled {
        session_id: String,
        glyphs_placed: usize,
        warnings: usize,
        size_bytes: usize,
        timestamp: DateTime<Utc>,
    },

    /// Assembly failed fatally
    AssemblyFailed {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A session's assets were released
    SessionPurged {
        session_id: String,
        assets_released: usize,
        timestamp: DateTime<Utc>,
    },

    /// The operator side channel was used
    OperatorNotified {
        session_id: String,
        delivered: bool,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The session this event concerns.
    pub fn session_id(&self) -> &str {
        match self {
            DomainEvent::SessionStarted { session_id, .. }
            | DomainEvent::GlyphCommitted { session_id, .. }
            | DomainEvent::FontAssembled { session_id, .. }
            | DomainEvent::AssemblyFailed { session_id, .. }
            | DomainEvent::SessionPurged { session_id, .. }
            | DomainEvent::OperatorNotified { session_id, .. } => session_id,
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
