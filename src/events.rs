//! Broadcast notifications for observers outside the core (caption sync,
//! export, progress UI).
//!
//! Emitting never blocks and never fails the operation that emits: with no
//! subscribers the event is simply dropped.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::{AudioSegmentInfo, Timeline};

#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// The surah structure was built and cached.
    StructureReady { total_ayahs: u32 },
    /// Audio for one ayah/edition was resolved and memoized.
    AudioReady {
        global_number: u32,
        edition_id: String,
        info: Arc<AudioSegmentInfo>,
    },
    TimelineBuilt(Arc<Timeline>),
}

/// Cloneable handle over a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: CoreEvent) {
        if self.sender.send(event).is_err() {
            trace!("event dropped: no subscribers");
        }
    }

    /// Receives every event emitted after this call. Slow receivers see
    /// `RecvError::Lagged` rather than blocking emitters.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
