//! Hand-off between the transport's delivery context and the simulation tick.
//!
//! Transport callbacks may fire on any thread, concurrently with each other
//! and with the tick. They only [`push`](InboundMessageQueue::push); the tick
//! [`drain`](InboundMessageQueue::drain)s once per frame. The mutex is held
//! only for the list operation itself.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Joined,
    Left,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub kind: EventKind,
    pub peer_id: String,
    /// Raw JSON text; decoded by the tick, never by the callback.
    pub payload: Option<String>,
}

impl QueuedEvent {
    pub fn joined(peer_id: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Joined,
            peer_id: peer_id.into(),
            payload: None,
        }
    }

    pub fn left(peer_id: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Left,
            peer_id: peer_id.into(),
            payload: None,
        }
    }

    pub fn message(peer_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            peer_id: peer_id.into(),
            payload: Some(payload.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InboundMessageQueue {
    inner: Arc<Mutex<VecDeque<QueuedEvent>>>,
}

impl InboundMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: QueuedEvent) {
        self.lock().push_back(event);
    }

    /// Removes and returns everything queued so far, in arrival order.
    pub fn drain(&self) -> VecDeque<QueuedEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking pusher cannot leave the deque half-modified, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedEvent>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
