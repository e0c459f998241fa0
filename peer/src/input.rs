//! Player intents and the throttled direction sender
//!
//! Keyboard or bot input is turned into [`Intent`]s by the caller; the state
//! machine decides what each intent means in the current phase. On a
//! non-host, direction intents travel to the host through [`InputSender`],
//! which enforces the per-slot send throttle.

use crate::context::GameContext;
use crate::protocol::NetworkSyncProtocol;
use shared::Direction;

/// High-level player intent, independent of the input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Steer(Direction),
    TogglePause,
    /// Start the match from the lobby, or return to the lobby after it ends
    Confirm,
    Back,
    Host,
    RefreshSessions,
    /// Join the n-th listed session (0-based)
    Join(usize),
    Solo,
    Quit,
}

/// Rate-limited delivery of direction changes from a non-host
///
/// At most one `player_input` per throttle window leaves this process. An
/// intent that arrives inside the window is held and sent by the next
/// [`flush`](InputSender::flush) once the window has passed; a newer intent
/// replaces a held one.
#[derive(Debug, Default)]
pub struct InputSender {
    pending: Option<Direction>,
    last_sent: Option<Direction>,
    sent_count: u64,
}

impl InputSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, direction: Direction) {
        self.pending = Some(direction);
    }

    pub fn pending(&self) -> Option<Direction> {
        self.pending
    }

    pub fn last_sent(&self) -> Option<Direction> {
        self.last_sent
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    /// Sends the held intent if the slot's throttle window has passed.
    /// Returns true when a message went out.
    pub fn flush(
        &mut self,
        ctx: &mut GameContext,
        protocol: &NetworkSyncProtocol,
        now: u64,
    ) -> bool {
        let Some(direction) = self.pending else {
            return false;
        };
        let Some(slot) = ctx.my_index else {
            return false;
        };
        let throttle = ctx.config.input_throttle_ms;
        let last_send = ctx.roster.slot(slot).map_or(0, |s| s.last_send_ms);
        if last_send != 0 && now.saturating_sub(last_send) < throttle {
            return false;
        }

        if !protocol.send_input(ctx, direction) {
            return false;
        }
        if let Some(slot) = ctx.roster.slot_mut(slot) {
            slot.last_send_ms = now;
        }
        self.pending = None;
        self.last_sent = Some(direction);
        self.sent_count += 1;
        true
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EventKind;
    use crate::relay::RelayHub;
    use shared::config::GameConfig;
    use shared::logging::Logger;

    fn guest_context(hub: &RelayHub) -> (GameContext, GameContext) {
        let mut host = GameContext::new(GameConfig::default(), Some(1), Logger::new("host"));
        let mut guest = GameContext::new(GameConfig::default(), Some(2), Logger::new("guest"));
        host.net.connect(hub, "localhost", 9001, 0).unwrap();
        guest.net.connect(hub, "localhost", 9001, 0).unwrap();
        let session = host.net.host_session(0).unwrap().session_id;
        guest.net.join_session(&session, 0).unwrap();
        let me = guest.net.self_id().unwrap().to_string();
        guest.roster.add_participant(&me);
        guest.refresh_my_index();
        host.net.drain(0);
        (host, guest)
    }

    fn inputs_received(host: &mut GameContext) -> usize {
        host.net
            .drain(0)
            .into_iter()
            .filter(|e| e.kind == EventKind::Message)
            .count()
    }

    #[test]
    fn test_flush_without_pending_sends_nothing() {
        let hub = RelayHub::inline();
        let (mut host, mut guest) = guest_context(&hub);
        let protocol = NetworkSyncProtocol::new(Logger::new("guest"));
        let mut sender = InputSender::new();
        assert!(!sender.flush(&mut guest, &protocol, 100));
        assert_eq!(inputs_received(&mut host), 0);
    }

    #[test]
    fn test_throttle_holds_and_coalesces() {
        let hub = RelayHub::inline();
        let (mut host, mut guest) = guest_context(&hub);
        let protocol = NetworkSyncProtocol::new(Logger::new("guest"));
        let mut sender = InputSender::new();

        sender.queue(Direction::Up);
        assert!(sender.flush(&mut guest, &protocol, 1_000));
        assert_eq!(sender.last_sent(), Some(Direction::Up));

        sender.queue(Direction::Left);
        sender.queue(Direction::Right);
        assert!(!sender.flush(&mut guest, &protocol, 1_010));
        assert_eq!(sender.pending(), Some(Direction::Right));

        assert!(sender.flush(&mut guest, &protocol, 1_016));
        assert_eq!(sender.pending(), None);
        assert_eq!(sender.sent_count(), 2);
        assert_eq!(inputs_received(&mut host), 2);
        assert_eq!(guest.roster.slot(0).unwrap().last_send_ms, 1_016);
    }

    #[test]
    fn test_failed_send_keeps_intent() {
        let hub = RelayHub::inline();
        let (_host, mut guest) = guest_context(&hub);
        let protocol = NetworkSyncProtocol::new(Logger::new("guest"));
        let mut sender = InputSender::new();

        guest.net.disconnect();
        sender.queue(Direction::Down);
        assert!(!sender.flush(&mut guest, &protocol, 1_000));
        assert_eq!(sender.pending(), Some(Direction::Down));
    }
}
