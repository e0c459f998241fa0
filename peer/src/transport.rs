//! Session transport boundary.
//!
//! The transport is an external collaborator: it creates a connection to a
//! relay server, hosts or joins a session, lists open sessions and delivers
//! peer events through a callback that may run on any thread. Everything
//! above this module talks to it through the [`Transport`] and [`Connector`]
//! traits only.

use crate::queue::{InboundMessageQueue, QueuedEvent};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is not connected to a session")]
    NotConnected,
    #[error("already in session {0}")]
    AlreadyInSession(String),
    #[error("unknown session {0}")]
    UnknownSession(String),
    #[error("session {0} is full")]
    SessionFull(String),
    #[error("peer {0} is not in this session")]
    UnknownPeer(String),
    #[error("transport closed")]
    Closed,
}

/// Identity returned by `host` and `join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub self_id: String,
    /// The session creator, when the transport reports it.
    pub host_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Joined { peer_id: String },
    Left { peer_id: String },
    Message { peer_id: String, payload: String },
}

impl From<TransportEvent> for QueuedEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Joined { peer_id } => QueuedEvent::joined(peer_id),
            TransportEvent::Left { peer_id } => QueuedEvent::left(peer_id),
            TransportEvent::Message { peer_id, payload } => QueuedEvent::message(peer_id, payload),
        }
    }
}

pub type EventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Callback that only enqueues; no simulation state is touched from the
/// delivery context.
pub fn queue_callback(queue: InboundMessageQueue) -> EventCallback {
    Arc::new(move |event: TransportEvent| queue.push(event.into()))
}

pub trait Transport: Send + Sync {
    fn host(&mut self) -> Result<SessionInfo, TransportError>;

    fn join(
        &mut self,
        session_id: &str,
        payload: &serde_json::Value,
    ) -> Result<SessionInfo, TransportError>;

    fn list(&self) -> Result<Vec<String>, TransportError>;

    fn listen(&mut self, callback: EventCallback) -> Result<(), TransportError>;

    /// Sends to every other member of the session.
    fn send(&self, message: &str) -> Result<(), TransportError>;

    /// Sends to one member. Transports without unicast fall back to `send`.
    fn send_to(&self, peer_id: &str, message: &str) -> Result<(), TransportError> {
        let _ = peer_id;
        self.send(message)
    }
}

pub trait Connector: Send + Sync {
    fn create(&self, host: &str, port: u16) -> Result<Box<dyn Transport>, TransportError>;
}
