//! Connection state of one peer: transport handle, identities, inbound queue
//! and liveness tracking.

use crate::queue::{InboundMessageQueue, QueuedEvent};
use crate::transport::{queue_callback, Connector, SessionInfo, Transport, TransportError};
use shared::logging::Logger;
use shared::messages::WireMessage;
use std::collections::VecDeque;

/// What this process knows about its own role in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostStatus {
    #[default]
    Unknown,
    Host,
    Guest,
}

/// Result of one liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Healthy,
    /// The warning threshold was crossed; reported once per silence
    Warning,
    /// The disconnect threshold was crossed; the connection is now lost
    Lost,
}

pub struct NetworkContext {
    transport: Option<Box<dyn Transport>>,
    queue: InboundMessageQueue,
    self_id: Option<String>,
    session_id: Option<String>,
    host_id: Option<String>,
    host_status: HostStatus,
    available_sessions: Vec<String>,

    last_message_received: u64,
    timeout_warned: bool,
    connection_lost: bool,
    warning_after_ms: u64,
    disconnect_after_ms: u64,

    log: Logger,
}

impl NetworkContext {
    pub fn new(warning_after_ms: u64, disconnect_after_ms: u64, log: Logger) -> Self {
        Self {
            transport: None,
            queue: InboundMessageQueue::new(),
            self_id: None,
            session_id: None,
            host_id: None,
            host_status: HostStatus::Unknown,
            available_sessions: Vec::new(),
            last_message_received: 0,
            timeout_warned: false,
            connection_lost: false,
            warning_after_ms,
            disconnect_after_ms,
            log,
        }
    }

    /// Creates a transport and starts listening. Any previous connection is
    /// torn down first.
    pub fn connect(
        &mut self,
        connector: &dyn Connector,
        host: &str,
        port: u16,
        now: u64,
    ) -> Result<(), TransportError> {
        self.disconnect();
        let mut transport = connector.create(host, port)?;
        // Fresh queue so events from an earlier connection cannot leak in.
        self.queue = InboundMessageQueue::new();
        transport.listen(queue_callback(self.queue.clone()))?;
        self.transport = Some(transport);
        self.last_message_received = now;
        self.log.info(format_args!("Connected to {}:{}", host, port));
        Ok(())
    }

    /// Drops the transport and forgets the session. Clears the lost flag.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            self.log.info("Transport closed");
        }
        self.queue = InboundMessageQueue::new();
        self.self_id = None;
        self.session_id = None;
        self.host_id = None;
        self.host_status = HostStatus::Unknown;
        self.available_sessions.clear();
        self.timeout_warned = false;
        self.connection_lost = false;
    }

    pub fn refresh_sessions(&mut self) -> Result<&[String], TransportError> {
        let transport = self.transport.as_ref().ok_or(TransportError::NotConnected)?;
        self.available_sessions = transport.list()?;
        Ok(&self.available_sessions)
    }

    pub fn host_session(&mut self, now: u64) -> Result<SessionInfo, TransportError> {
        let transport = self.transport.as_mut().ok_or(TransportError::NotConnected)?;
        let info = transport.host()?;
        self.session_id = Some(info.session_id.clone());
        self.self_id = Some(info.self_id.clone());
        self.host_id = Some(info.self_id.clone());
        self.host_status = HostStatus::Host;
        self.last_message_received = now;
        self.log
            .info(format_args!("Hosting session {} as {}", info.session_id, info.self_id));
        Ok(info)
    }

    pub fn join_session(&mut self, session_id: &str, now: u64) -> Result<SessionInfo, TransportError> {
        let transport = self.transport.as_mut().ok_or(TransportError::NotConnected)?;
        let info = transport.join(session_id, &serde_json::json!({}))?;
        self.session_id = Some(info.session_id.clone());
        self.self_id = Some(info.self_id.clone());
        self.host_status = HostStatus::Unknown;
        self.host_id = None;
        if let Some(host_id) = info.host_id.clone() {
            self.record_host(&host_id);
        }
        self.last_message_received = now;
        self.log
            .info(format_args!("Joined session {} as {}", info.session_id, info.self_id));
        Ok(info)
    }

    /// Joins the `index`th entry of the last session listing.
    pub fn join_listed(&mut self, index: usize, now: u64) -> Result<SessionInfo, TransportError> {
        let session_id = self
            .available_sessions
            .get(index)
            .cloned()
            .ok_or_else(|| TransportError::UnknownSession(format!("#{}", index + 1)))?;
        self.join_session(&session_id, now)
    }

    /// Records the session host. Learning that someone else hosts makes this
    /// process a guest.
    pub fn record_host(&mut self, peer_id: &str) {
        self.host_id = Some(peer_id.to_string());
        self.host_status = if self.self_id.as_deref() == Some(peer_id) {
            HostStatus::Host
        } else {
            HostStatus::Guest
        };
    }

    /// Fallback when the transport did not name the host: the first peer to
    /// see itself land in slot 0 assumes it created the session.
    pub fn assume_host(&mut self) {
        if self.host_status == HostStatus::Unknown {
            self.log
                .warn("Host not reported by transport, assuming host from slot 0");
            self.host_status = HostStatus::Host;
            self.host_id = self.self_id.clone();
        }
    }

    pub fn send(&self, message: &WireMessage) -> bool {
        self.deliver(None, message)
    }

    pub fn send_to(&self, peer_id: &str, message: &WireMessage) -> bool {
        self.deliver(Some(peer_id), message)
    }

    fn deliver(&self, to: Option<&str>, message: &WireMessage) -> bool {
        if self.connection_lost || self.session_id.is_none() {
            return false;
        }
        let Some(transport) = self.transport.as_ref() else {
            return false;
        };
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.log
                    .error(format_args!("Failed to encode {}: {}", message.kind(), e));
                return false;
            }
        };
        let result = match to {
            Some(peer_id) => transport.send_to(peer_id, &payload),
            None => transport.send(&payload),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.log
                    .error(format_args!("Failed to send {}: {}", message.kind(), e));
                false
            }
        }
    }

    /// Takes everything queued since the last call. Any traffic counts as
    /// proof of life.
    pub fn drain(&mut self, now: u64) -> VecDeque<QueuedEvent> {
        let events = self.queue.drain();
        if !events.is_empty() {
            self.last_message_received = now;
        }
        events
    }

    /// Elapsed-time liveness check for non-hosts. The host is the source of
    /// truth and never times itself out.
    pub fn check_liveness(&mut self, now: u64) -> Liveness {
        if self.connection_lost || self.session_id.is_none() || self.is_host() {
            return Liveness::Healthy;
        }
        let silence = now.saturating_sub(self.last_message_received);
        if silence > self.disconnect_after_ms {
            self.connection_lost = true;
            self.log.warn(format_args!(
                "No messages for {} ms, connection lost",
                silence
            ));
            return Liveness::Lost;
        }
        if silence > self.warning_after_ms {
            if !self.timeout_warned {
                self.timeout_warned = true;
                self.log
                    .warn(format_args!("No messages for {} ms", silence));
                return Liveness::Warning;
            }
        } else {
            self.timeout_warned = false;
        }
        Liveness::Healthy
    }

    pub fn queue(&self) -> &InboundMessageQueue {
        &self.queue
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn in_session(&self) -> bool {
        self.transport.is_some() && self.session_id.is_some()
    }

    pub fn is_host(&self) -> bool {
        self.host_status == HostStatus::Host
    }

    pub fn host_status(&self) -> HostStatus {
        self.host_status
    }

    pub fn connection_lost(&self) -> bool {
        self.connection_lost
    }

    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn available_sessions(&self) -> &[String] {
        &self.available_sessions
    }

    pub fn last_message_received(&self) -> u64 {
        self.last_message_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayHub;
    use shared::messages::PlayerInput;
    use shared::Direction;

    fn context(label: &str) -> NetworkContext {
        NetworkContext::new(15_000, 30_000, Logger::new(label))
    }

    fn input() -> WireMessage {
        WireMessage::PlayerInput(PlayerInput {
            direction: Direction::Left,
        })
    }

    #[test]
    fn test_host_and_guest_roles() {
        let hub = RelayHub::inline();
        let mut host = context("host");
        let mut guest = context("guest");
        host.connect(&hub, "localhost", 9001, 0).unwrap();
        guest.connect(&hub, "localhost", 9001, 0).unwrap();

        let hosted = host.host_session(0).unwrap();
        assert!(host.is_host());
        assert_eq!(host.host_id(), Some(hosted.self_id.as_str()));

        assert_eq!(guest.refresh_sessions().unwrap(), &[hosted.session_id.clone()]);
        guest.join_listed(0, 0).unwrap();
        assert_eq!(guest.host_status(), HostStatus::Guest);
        assert_eq!(guest.host_id(), Some(hosted.self_id.as_str()));
        assert!(guest.join_listed(5, 0).is_err());
    }

    #[test]
    fn test_send_requires_session() {
        let hub = RelayHub::inline();
        let mut net = context("solo");
        assert!(!net.send(&input()));
        net.connect(&hub, "localhost", 9001, 0).unwrap();
        assert!(!net.send(&input()));
    }

    #[test]
    fn test_drain_updates_last_message_time() {
        let hub = RelayHub::inline();
        let mut host = context("host");
        let mut guest = context("guest");
        host.connect(&hub, "localhost", 9001, 0).unwrap();
        guest.connect(&hub, "localhost", 9001, 0).unwrap();
        let session = host.host_session(0).unwrap().session_id;
        guest.join_session(&session, 0).unwrap();

        assert!(host.send(&input()));
        assert_eq!(guest.drain(500).len(), 2);
        assert_eq!(guest.last_message_received(), 500);
        assert!(guest.drain(900).is_empty());
        assert_eq!(guest.last_message_received(), 500);
    }

    #[test]
    fn test_liveness_warning_latch_and_loss() {
        let hub = RelayHub::inline();
        let mut host = context("host");
        let mut guest = context("guest");
        host.connect(&hub, "localhost", 9001, 0).unwrap();
        guest.connect(&hub, "localhost", 9001, 0).unwrap();
        let session = host.host_session(0).unwrap().session_id;
        guest.join_session(&session, 0).unwrap();
        guest.drain(0);

        assert_eq!(guest.check_liveness(10_000), Liveness::Healthy);
        assert_eq!(guest.check_liveness(16_000), Liveness::Warning);
        assert_eq!(guest.check_liveness(17_000), Liveness::Healthy);

        host.send(&input());
        guest.drain(18_000);
        assert_eq!(guest.check_liveness(18_000), Liveness::Healthy);
        assert_eq!(guest.check_liveness(34_000), Liveness::Warning);

        assert_eq!(guest.check_liveness(48_001), Liveness::Lost);
        assert!(guest.connection_lost());
        assert!(!guest.send(&input()));
        assert_eq!(guest.check_liveness(90_000), Liveness::Healthy);

        // The host never times itself out.
        assert_eq!(host.check_liveness(1_000_000), Liveness::Healthy);

        guest.disconnect();
        assert!(!guest.connection_lost());
        assert!(!guest.is_connected());
    }
}
