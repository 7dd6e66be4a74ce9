use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{Feature, HandleId, Turn};

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything the presentation layer needs to render the session.
///
/// Events are emitted by the history store, the session manager and the
/// speech controllers after their state changes. A presentation subscribes
/// once and renders whatever arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// A turn was appended to the conversation log and persisted.
    TurnAppended { index: usize, turn: Turn },

    /// The conversation log was wiped.
    HistoryCleared,

    /// An image was accepted for diagnosis. Rendered as a preview only,
    /// never persisted.
    ImagePreview {
        file_name: String,
        mime_type: String,
        size: usize,
    },

    /// A submission was refused because another request is still pending.
    RequestBusy,

    /// Speech recognition started or stopped listening.
    ListeningStateChanged { listening: bool },

    /// Speech playback started or stopped for a listen affordance.
    SpeakingStateChanged { speaking: bool, handle: HandleId },

    /// A platform capability required by the user's action is unavailable.
    CapabilityMissing { feature: Feature },
}

impl SessionEvent {
    /// Short machine-friendly name, used as a tracing field.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::TurnAppended { .. } => "turn_appended",
            SessionEvent::HistoryCleared => "history_cleared",
            SessionEvent::ImagePreview { .. } => "image_preview",
            SessionEvent::RequestBusy => "request_busy",
            SessionEvent::ListeningStateChanged { .. } => "listening_state_changed",
            SessionEvent::SpeakingStateChanged { .. } => "speaking_state_changed",
            SessionEvent::CapabilityMissing { .. } => "capability_missing",
        }
    }
}

/// Cheaply clonable broadcast bus for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        tracing::trace!(event = event.event_name(), "Session event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}
