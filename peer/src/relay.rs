//! In-process session relay.
//!
//! [`RelayHub`] plays the role of the relay server for peers living in the
//! same process: the headless demo and the integration tests. It implements
//! [`Connector`], so the rest of the crate cannot tell it from a networked
//! transport.
//!
//! Callbacks are never invoked while the hub lock is held. With
//! [`Delivery::Threaded`] they run on a dedicated delivery thread, which is
//! how a real transport behaves; [`Delivery::Inline`] calls them on the
//! sending thread so tests are deterministic.

use crate::transport::{
    Connector, EventCallback, SessionInfo, Transport, TransportError, TransportEvent,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::logging::Logger;
use shared::MAX_PLAYERS;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Inline,
    Threaded,
}

type Job = (EventCallback, TransportEvent);

struct RelaySession {
    host_id: String,
    members: Vec<String>,
}

#[derive(Default)]
struct HubState {
    sessions: BTreeMap<String, RelaySession>,
    callbacks: HashMap<String, EventCallback>,
    membership: HashMap<String, String>,
    next_peer: u64,
}

impl HubState {
    fn session_of(&self, peer_id: &str) -> Option<(&String, &RelaySession)> {
        let session_id = self.membership.get(peer_id)?;
        self.sessions.get(session_id).map(|session| (session_id, session))
    }

    /// Pairs each target's callback with its own copy of the event.
    fn jobs<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a String>,
        event: &TransportEvent,
    ) -> Vec<Job> {
        targets
            .into_iter()
            .filter_map(|peer| self.callbacks.get(peer))
            .map(|callback| (Arc::clone(callback), event.clone()))
            .collect()
    }
}

#[derive(Clone)]
pub struct RelayHub {
    state: Arc<Mutex<HubState>>,
    sender: Option<mpsc::UnboundedSender<Job>>,
    capacity: usize,
    log: Logger,
}

impl RelayHub {
    pub fn new(delivery: Delivery, log: Logger) -> Self {
        let sender = match delivery {
            Delivery::Inline => None,
            Delivery::Threaded => Some(spawn_delivery_thread()),
        };
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            sender,
            capacity: MAX_PLAYERS,
            log,
        }
    }

    pub fn inline() -> Self {
        Self::new(Delivery::Inline, Logger::new("relay"))
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.lock().sessions.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, jobs: Vec<Job>) {
        for (callback, event) in jobs {
            match &self.sender {
                Some(sender) => {
                    if sender.send((callback, event)).is_err() {
                        self.log.error("Delivery thread stopped, dropping event");
                    }
                }
                None => callback(event),
            }
        }
    }

    fn register(&self) -> String {
        let mut state = self.lock();
        state.next_peer += 1;
        format!("peer-{}", state.next_peer)
    }

    fn host_session(&self, peer_id: &str) -> Result<SessionInfo, TransportError> {
        let session_id = new_session_id();
        let jobs = {
            let mut state = self.lock();
            if let Some(current) = state.membership.get(peer_id) {
                return Err(TransportError::AlreadyInSession(current.clone()));
            }
            state.sessions.insert(
                session_id.clone(),
                RelaySession {
                    host_id: peer_id.to_string(),
                    members: vec![peer_id.to_string()],
                },
            );
            state
                .membership
                .insert(peer_id.to_string(), session_id.clone());
            let me = peer_id.to_string();
            state.jobs(
                [&me],
                &TransportEvent::Joined {
                    peer_id: peer_id.to_string(),
                },
            )
        };
        self.log
            .info(format_args!("{} hosts session {}", peer_id, session_id));
        self.dispatch(jobs);
        Ok(SessionInfo {
            session_id,
            self_id: peer_id.to_string(),
            host_id: Some(peer_id.to_string()),
        })
    }

    fn join_session(&self, peer_id: &str, session_id: &str) -> Result<SessionInfo, TransportError> {
        let (host_id, jobs) = {
            let mut state = self.lock();
            if let Some(current) = state.membership.get(peer_id) {
                return Err(TransportError::AlreadyInSession(current.clone()));
            }
            let capacity = self.capacity;
            let session = state
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| TransportError::UnknownSession(session_id.to_string()))?;
            if session.members.len() >= capacity {
                return Err(TransportError::SessionFull(session_id.to_string()));
            }
            session.members.push(peer_id.to_string());
            let host_id = session.host_id.clone();
            let members = session.members.clone();
            state
                .membership
                .insert(peer_id.to_string(), session_id.to_string());
            let jobs = state.jobs(
                &members,
                &TransportEvent::Joined {
                    peer_id: peer_id.to_string(),
                },
            );
            (host_id, jobs)
        };
        self.log
            .info(format_args!("{} joined session {}", peer_id, session_id));
        self.dispatch(jobs);
        Ok(SessionInfo {
            session_id: session_id.to_string(),
            self_id: peer_id.to_string(),
            host_id: Some(host_id),
        })
    }

    fn relay(&self, from: &str, to: Option<&str>, message: &str) -> Result<(), TransportError> {
        let jobs = {
            let state = self.lock();
            let (_, session) = state.session_of(from).ok_or(TransportError::NotConnected)?;
            let event = TransportEvent::Message {
                peer_id: from.to_string(),
                payload: message.to_string(),
            };
            match to {
                Some(target) => {
                    if !session.members.iter().any(|member| member == target) {
                        return Err(TransportError::UnknownPeer(target.to_string()));
                    }
                    state.jobs(session.members.iter().filter(|m| *m == target), &event)
                }
                None => state.jobs(session.members.iter().filter(|m| *m != from), &event),
            }
        };
        self.dispatch(jobs);
        Ok(())
    }

    fn disconnect(&self, peer_id: &str) {
        let jobs = {
            let mut state = self.lock();
            state.callbacks.remove(peer_id);
            let Some(session_id) = state.membership.remove(peer_id) else {
                return;
            };
            let remaining = match state.sessions.get_mut(&session_id) {
                Some(session) => {
                    session.members.retain(|member| member != peer_id);
                    session.members.clone()
                }
                None => Vec::new(),
            };
            if remaining.is_empty() {
                state.sessions.remove(&session_id);
            }
            state.jobs(
                &remaining,
                &TransportEvent::Left {
                    peer_id: peer_id.to_string(),
                },
            )
        };
        self.log.info(format_args!("{} disconnected", peer_id));
        self.dispatch(jobs);
    }
}

impl Connector for RelayHub {
    fn create(&self, host: &str, port: u16) -> Result<Box<dyn Transport>, TransportError> {
        let peer_id = self.register();
        self.log
            .debug(format_args!("{} connected to {}:{}", peer_id, host, port));
        Ok(Box::new(RelayTransport {
            hub: self.clone(),
            peer_id,
        }))
    }
}

fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect()
}

fn spawn_delivery_thread() -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    thread::spawn(move || {
        while let Some((callback, event)) = rx.blocking_recv() {
            callback(event);
        }
    });
    tx
}

/// One peer's connection to a [`RelayHub`]; leaving is done by dropping it.
pub struct RelayTransport {
    hub: RelayHub,
    peer_id: String,
}

impl Transport for RelayTransport {
    fn host(&mut self) -> Result<SessionInfo, TransportError> {
        self.hub.host_session(&self.peer_id)
    }

    fn join(
        &mut self,
        session_id: &str,
        _payload: &serde_json::Value,
    ) -> Result<SessionInfo, TransportError> {
        self.hub.join_session(&self.peer_id, session_id)
    }

    fn list(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.hub.session_ids())
    }

    fn listen(&mut self, callback: EventCallback) -> Result<(), TransportError> {
        self.hub
            .lock()
            .callbacks
            .insert(self.peer_id.clone(), callback);
        Ok(())
    }

    fn send(&self, message: &str) -> Result<(), TransportError> {
        self.hub.relay(&self.peer_id, None, message)
    }

    fn send_to(&self, peer_id: &str, message: &str) -> Result<(), TransportError> {
        self.hub.relay(&self.peer_id, Some(peer_id), message)
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.hub.disconnect(&self.peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{EventKind, InboundMessageQueue};
    use crate::transport::queue_callback;
    use std::time::{Duration, Instant};

    fn listening(hub: &RelayHub) -> (Box<dyn Transport>, InboundMessageQueue) {
        let queue = InboundMessageQueue::new();
        let mut transport = hub.create("localhost", 9001).unwrap();
        transport.listen(queue_callback(queue.clone())).unwrap();
        (transport, queue)
    }

    #[test]
    fn test_host_and_join_report_identity() {
        let hub = RelayHub::inline();
        let (mut host, host_queue) = listening(&hub);
        let (mut guest, guest_queue) = listening(&hub);

        let hosted = host.host().unwrap();
        assert_eq!(hosted.host_id.as_deref(), Some(hosted.self_id.as_str()));
        assert_eq!(host.list().unwrap(), vec![hosted.session_id.clone()]);

        let joined = guest
            .join(&hosted.session_id, &serde_json::Value::Null)
            .unwrap();
        assert_eq!(joined.session_id, hosted.session_id);
        assert_eq!(joined.host_id, Some(hosted.self_id.clone()));

        let host_events = host_queue.drain();
        assert_eq!(host_events.len(), 2);
        assert!(host_events.iter().all(|e| e.kind == EventKind::Joined));
        assert_eq!(host_events[1].peer_id, joined.self_id);

        let guest_events = guest_queue.drain();
        assert_eq!(guest_events.len(), 1);
        assert_eq!(guest_events[0].peer_id, joined.self_id);
    }

    #[test]
    fn test_send_skips_sender_and_send_to_is_unicast() {
        let hub = RelayHub::inline();
        let (mut a, qa) = listening(&hub);
        let (mut b, qb) = listening(&hub);
        let (mut c, qc) = listening(&hub);
        let session = a.host().unwrap().session_id;
        let b_id = b.join(&session, &serde_json::Value::Null).unwrap().self_id;
        c.join(&session, &serde_json::Value::Null).unwrap();
        qa.drain();
        qb.drain();
        qc.drain();

        a.send("hello").unwrap();
        assert!(qa.is_empty());
        assert_eq!(qb.len(), 1);
        assert_eq!(qc.len(), 1);

        a.send_to(&b_id, "private").unwrap();
        assert_eq!(qb.drain().back().unwrap().payload.as_deref(), Some("private"));
        assert_eq!(qc.len(), 1);

        assert_eq!(
            a.send_to("nobody", "x"),
            Err(TransportError::UnknownPeer("nobody".into()))
        );
    }

    #[test]
    fn test_drop_emits_left_and_closes_empty_session() {
        let hub = RelayHub::inline();
        let (mut host, host_queue) = listening(&hub);
        let (mut guest, _guest_queue) = listening(&hub);
        let session = host.host().unwrap().session_id;
        let guest_id = guest
            .join(&session, &serde_json::Value::Null)
            .unwrap()
            .self_id;
        host_queue.drain();

        drop(guest);
        let events = host_queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Left);
        assert_eq!(events[0].peer_id, guest_id);

        drop(host);
        assert!(hub.session_ids().is_empty());
    }

    #[test]
    fn test_join_errors() {
        let hub = RelayHub::inline();
        let (mut host, _) = listening(&hub);
        let session = host.host().unwrap().session_id;
        assert!(matches!(host.host(), Err(TransportError::AlreadyInSession(_))));

        let (mut lost, _) = listening(&hub);
        assert_eq!(
            lost.join("NOPE", &serde_json::Value::Null),
            Err(TransportError::UnknownSession("NOPE".into()))
        );
        assert_eq!(lost.send("x"), Err(TransportError::NotConnected));

        let mut guests = Vec::new();
        for _ in 1..MAX_PLAYERS {
            let (mut guest, _) = listening(&hub);
            guest.join(&session, &serde_json::Value::Null).unwrap();
            guests.push(guest);
        }
        assert_eq!(
            lost.join(&session, &serde_json::Value::Null),
            Err(TransportError::SessionFull(session.clone()))
        );
    }

    #[test]
    fn test_threaded_delivery_runs_off_thread() {
        let hub = RelayHub::new(Delivery::Threaded, Logger::new("relay"));
        let (mut host, queue) = listening(&hub);
        let (mut guest, _) = listening(&hub);
        let session = host.host().unwrap().session_id;
        guest.join(&session, &serde_json::Value::Null).unwrap();
        for i in 0..20 {
            guest.send(&i.to_string()).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut events = Vec::new();
        while events.len() < 22 && Instant::now() < deadline {
            events.extend(queue.drain());
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(events.len(), 22);
        let payloads: Vec<String> = events
            .iter()
            .filter_map(|e| e.payload.clone())
            .collect();
        assert_eq!(payloads, (0..20).map(|i| i.to_string()).collect::<Vec<_>>());
    }
}
