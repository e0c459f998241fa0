//! Host-authoritative synchronization protocol.
//!
//! Inbound events are drained from the queue once per tick, decoded once and
//! applied in arrival order. The host owns the simulation and answers with
//! `state_sync` (full snapshot, roster and phase) and `game_state` (snake
//! bodies); non-hosts only send their directional intent and their own pause
//! toggles.
//!
//! Trust rules:
//! - `player_input` is accepted by the host only, for the sender's own slot.
//! - `game_state` is accepted by non-hosts only, from the recorded host.
//! - `state_sync` pause fields are accepted from any peer; a pause may only be
//!   lifted by the peer that set it or by the host. All other `state_sync`
//!   fields are accepted from the host only.

use crate::context::GameContext;
use crate::network::Liveness;
use crate::queue::{EventKind, QueuedEvent};
use crate::state::MatchState;
use shared::logging::Logger;
use shared::messages::{
    validate_score, validate_time, GameStateUpdate, PlayerEntry, PlayerInput, StateSync,
    WireMessage,
};
use shared::{Direction, MAX_PLAYERS};

pub struct NetworkSyncProtocol {
    last_broadcast_ms: Option<u64>,
    last_state_sync_ms: Option<u64>,
    log: Logger,
}

impl NetworkSyncProtocol {
    pub fn new(log: Logger) -> Self {
        Self {
            last_broadcast_ms: None,
            last_state_sync_ms: None,
            log,
        }
    }

    pub fn reset(&mut self) {
        self.last_broadcast_ms = None;
        self.last_state_sync_ms = None;
    }

    /// Gives this process its own slot right after hosting or joining.
    pub fn register_self(&mut self, ctx: &mut GameContext) {
        let Some(self_id) = ctx.net.self_id().map(str::to_string) else {
            return;
        };
        match ctx.roster.add_participant(&self_id) {
            Some(slot) => self
                .log
                .info(format_args!("Player {} joined: {} (me)", slot + 1, self_id)),
            None => self.log.warn("No free slot for this process"),
        }
        ctx.refresh_my_index();
    }

    /// Drains the inbound queue and applies every event. Returns the number
    /// of events processed.
    pub fn process_inbound(&mut self, ctx: &mut GameContext, now: u64) -> usize {
        let events = ctx.net.drain(now);
        let count = events.len();
        for event in events {
            self.apply_event(ctx, event, now);
        }
        count
    }

    fn apply_event(&mut self, ctx: &mut GameContext, event: QueuedEvent, now: u64) {
        match event.kind {
            EventKind::Joined => self.on_peer_joined(ctx, &event.peer_id, now),
            EventKind::Left => self.on_peer_left(ctx, &event.peer_id),
            EventKind::Message => {
                let Some(payload) = event.payload.as_deref() else {
                    return;
                };
                match WireMessage::decode(payload) {
                    Ok(WireMessage::StateSync(sync)) => {
                        self.on_state_sync(ctx, &event.peer_id, sync, now)
                    }
                    Ok(WireMessage::GameState(update)) => {
                        self.on_game_state(ctx, &event.peer_id, update, now)
                    }
                    Ok(WireMessage::PlayerInput(input)) => {
                        self.on_player_input(ctx, &event.peer_id, input)
                    }
                    Err(e) => self
                        .log
                        .warn(format_args!("Dropping message from {}: {}", event.peer_id, e)),
                }
            }
        }
    }

    fn on_peer_joined(&mut self, ctx: &mut GameContext, peer_id: &str, now: u64) {
        let is_self = ctx.net.self_id() == Some(peer_id);
        if !(is_self && ctx.roster.find_by_peer(peer_id).is_some()) {
            match ctx.roster.add_participant(peer_id) {
                Some(slot) => self
                    .log
                    .info(format_args!("Player {} joined: {}", slot + 1, peer_id)),
                None => self
                    .log
                    .warn(format_args!("Session full, {} has no slot", peer_id)),
            }
        }

        if is_self {
            ctx.refresh_my_index();
            if ctx.my_index == Some(0) {
                ctx.net.assume_host();
            }
            return;
        }

        if ctx.net.is_host() {
            let sync = self.build_state_sync(ctx, now);
            if ctx.net.send_to(peer_id, &WireMessage::StateSync(sync)) {
                self.log
                    .debug(format_args!("Sent state_sync to new peer {}", peer_id));
            }
        }
    }

    fn on_peer_left(&mut self, ctx: &mut GameContext, peer_id: &str) {
        if let Some(slot) = ctx.roster.remove_participant(peer_id) {
            self.log
                .info(format_args!("Player {} left: {}", slot + 1, peer_id));
        }
        ctx.refresh_my_index();

        if !ctx.net.is_host() && ctx.net.host_id() == Some(peer_id) {
            self.log.warn("Host disconnected, returning to menu");
            ctx.request_state(MatchState::Menu, true);
            return;
        }

        if ctx.net.is_host() && ctx.clock.pausing_peer() == Some(peer_id) {
            self.log
                .info(format_args!("{} left while pausing, resuming", peer_id));
            // Local origin so the unpause is broadcast.
            ctx.request_state(MatchState::Playing, false);
        }
    }

    /// An unknown host is learned only from a full snapshot, never from a
    /// peer's pause toggle.
    fn sent_by_host(&mut self, ctx: &mut GameContext, from: &str, sync: &StateSync) -> bool {
        if ctx.net.is_host() {
            return false;
        }
        match ctx.net.host_id() {
            Some(host_id) => host_id == from,
            None if !sync.carries_snapshot() => false,
            None => {
                ctx.net.record_host(from);
                self.log
                    .info(format_args!("Learned host {} from state_sync", from));
                true
            }
        }
    }

    fn on_state_sync(&mut self, ctx: &mut GameContext, from: &str, sync: StateSync, now: u64) {
        let from_host = self.sent_by_host(ctx, from, &sync);

        if sync.global_paused == Some(false) {
            self.apply_unpause(ctx, from, from_host, now);
        }

        if from_host {
            self.apply_host_snapshot(ctx, &sync, now);
        }

        if sync.global_paused == Some(true) && !ctx.clock.is_paused() {
            let start = sync
                .pause_start_time
                .and_then(|start| validate_time("pauseStartTime", start).ok())
                .unwrap_or_else(|| ctx.clock.host_time(now));
            let pauser = sync.paused_by.clone().or_else(|| Some(from.to_string()));
            self.log.info(format_args!(
                "Paused by {}",
                pauser.as_deref().unwrap_or(from)
            ));
            ctx.clock.set_pause(start, pauser);
            ctx.roster.set_all_paused(true);
            if ctx.state() == MatchState::Playing {
                ctx.request_state(MatchState::Paused, true);
            }
        }
    }

    fn apply_unpause(&mut self, ctx: &mut GameContext, from: &str, from_host: bool, now: u64) {
        if !ctx.clock.is_paused() {
            return;
        }
        let pauser = ctx.clock.pausing_peer();
        if !(from_host || pauser.is_none() || pauser == Some(from)) {
            self.log.warn(format_args!(
                "Ignoring unpause from {}, paused by {}",
                from,
                pauser.unwrap_or("?")
            ));
            return;
        }
        ctx.clock.exit_pause(now);
        ctx.roster.set_all_paused(false);
        if ctx.state() == MatchState::Paused {
            ctx.request_state(MatchState::Playing, true);
        }
    }

    fn apply_host_snapshot(&mut self, ctx: &mut GameContext, sync: &StateSync, now: u64) {
        if sync.match_start_time > 0 {
            match sync.validate_timing() {
                Ok(()) => ctx.clock.apply_authoritative(
                    sync.match_start_time,
                    sync.elapsed_ms,
                    sync.total_paused_time,
                    now,
                ),
                Err(e) => self.log.warn(format_args!("Ignoring timing: {}", e)),
            }
        }

        let food = sync.food();
        if ctx.config.in_bounds(&food) {
            ctx.food.set_position(food);
        } else {
            self.log
                .warn(format_args!("Ignoring food outside the grid at {}", food));
        }

        if let Some(players) = &sync.players {
            for peer_id in ctx.roster.reconcile(players) {
                self.log
                    .info(format_args!("Added {} from host roster", peer_id));
            }
            ctx.refresh_my_index();
        }

        if let Some(winner) = sync.winner_index {
            match usize::try_from(winner).ok().filter(|w| *w < MAX_PLAYERS) {
                Some(winner) => {
                    ctx.clock.set_winner(Some(winner));
                }
                None => self
                    .log
                    .warn(format_args!("Ignoring winner index {}", winner)),
            }
        }

        if let Some(name) = &sync.game_state {
            match name.parse::<MatchState>() {
                Ok(target) => {
                    let current = ctx.state();
                    // Pause edges follow the pause fields only.
                    let pause_edge = matches!(
                        (current, target),
                        (MatchState::Playing, MatchState::Paused)
                            | (MatchState::Paused, MatchState::Playing)
                    );
                    if target != current && !pause_edge {
                        ctx.request_state(target, true);
                    }
                }
                Err(e) => self.log.warn(format_args!("{}", e)),
            }
        }
    }

    fn on_game_state(
        &mut self,
        ctx: &mut GameContext,
        from: &str,
        update: GameStateUpdate,
        now: u64,
    ) {
        if ctx.net.is_host() {
            self.log
                .warn(format_args!("Host ignoring game_state from {}", from));
            return;
        }
        if ctx.net.host_id().is_some_and(|host| host != from) {
            self.log
                .warn(format_args!("Ignoring game_state from non-host {}", from));
            return;
        }

        if update.match_start_time > 0 {
            match update.validate_timing() {
                Ok(()) => {
                    let total_paused = update
                        .total_paused_time
                        .unwrap_or_else(|| ctx.clock.total_paused_ms());
                    ctx.clock.apply_authoritative(
                        update.match_start_time,
                        update.elapsed_ms,
                        total_paused,
                        now,
                    );
                }
                Err(e) => self.log.warn(format_args!("Ignoring timing: {}", e)),
            }
        }

        let food = update.food();
        if ctx.config.in_bounds(&food) {
            ctx.food.set_position(food);
        } else {
            self.log
                .warn(format_args!("Ignoring food outside the grid at {}", food));
        }

        let (width, height) = (ctx.config.grid_width, ctx.config.grid_height);
        for entry in &update.players {
            self.apply_entry(ctx, entry, width, height);
        }
    }

    fn apply_entry(&self, ctx: &mut GameContext, entry: &PlayerEntry, width: i32, height: i32) {
        let body = match entry.validate_body(width, height) {
            Ok(body) => body,
            Err(e) => {
                self.log.warn(format_args!("Dropping player entry: {}", e));
                return;
            }
        };
        let Ok(slot) = entry.validate_slot() else {
            return;
        };
        let Some(snake) = ctx.roster.snake_mut(slot) else {
            self.log
                .debug(format_args!("No local participant in slot {}", slot));
            return;
        };
        snake.set_body(body);
        snake.set_alive(entry.alive);
        if let Some(score) = entry.score {
            match validate_score(score) {
                Ok(score) => snake.set_score(score),
                Err(e) => self.log.warn(format_args!("Slot {}: {}", slot, e)),
            }
        }
    }

    fn on_player_input(&mut self, ctx: &mut GameContext, from: &str, input: PlayerInput) {
        if !ctx.net.is_host() {
            return;
        }
        let Some(slot) = ctx.roster.find_by_peer(from) else {
            self.log
                .warn(format_args!("Input from unknown peer {}", from));
            return;
        };
        if let Some(snake) = ctx.roster.snake_mut(slot) {
            snake.set_direction(input.direction);
        }
    }

    pub fn build_game_state(&self, ctx: &GameContext, now: u64) -> GameStateUpdate {
        let food = ctx.food.position();
        GameStateUpdate {
            food_x: food.x,
            food_y: food.y,
            match_start_time: ctx.clock.match_start_ms(),
            elapsed_ms: ctx.clock.elapsed_ms(now),
            total_paused_time: Some(ctx.clock.total_paused_ms()),
            players: ctx
                .roster
                .active_snakes()
                .map(|(slot, snake)| PlayerEntry {
                    index: slot as i64,
                    alive: snake.is_alive(),
                    body: snake.body().iter().copied().collect(),
                    score: Some(snake.score()),
                })
                .collect(),
        }
    }

    /// Full host snapshot: phase, timing, food, pause, roster and result.
    pub fn build_state_sync(&self, ctx: &GameContext, now: u64) -> StateSync {
        let food = ctx.food.position();
        let paused = ctx.clock.is_paused();
        StateSync {
            game_state: Some(ctx.state().as_str().to_string()),
            match_start_time: ctx.clock.match_start_ms(),
            elapsed_ms: ctx.clock.elapsed_ms(now),
            total_paused_time: ctx.clock.total_paused_ms(),
            food_x: food.x,
            food_y: food.y,
            global_paused: paused.then_some(true),
            paused_by: ctx.clock.pausing_peer().map(str::to_string),
            pause_start_time: ctx.clock.pause_start_ms(),
            players: Some(ctx.roster.peer_ids()),
            winner_index: ctx.clock.winner().map(|w| w as i64),
        }
    }

    /// Scheduled `game_state` broadcast. Skipped inside the throttle window
    /// unless `critical`.
    pub fn broadcast_game_state(&mut self, ctx: &GameContext, now: u64, critical: bool) -> bool {
        if !ctx.net.is_host() {
            return false;
        }
        if !critical {
            if let Some(last) = self.last_broadcast_ms {
                if now.saturating_sub(last) < ctx.config.broadcast_interval_ms {
                    return false;
                }
            }
        }
        let update = self.build_game_state(ctx, now);
        let sent = ctx.net.send(&WireMessage::GameState(update));
        if sent {
            self.last_broadcast_ms = Some(now);
        }
        sent
    }

    pub fn broadcast_state_sync(&mut self, ctx: &GameContext, now: u64) -> bool {
        if !ctx.net.is_host() {
            return false;
        }
        let sync = self.build_state_sync(ctx, now);
        let sent = ctx.net.send(&WireMessage::StateSync(sync));
        if sent {
            self.last_state_sync_ms = Some(now);
        }
        sent
    }

    /// Announces this process's own pause toggle. The host sends a full
    /// snapshot; a non-host sends the pause fields, which is all the others
    /// will accept from it.
    pub fn send_pause(&mut self, ctx: &GameContext, now: u64, paused: bool) -> bool {
        if ctx.net.is_host() {
            let mut sync = self.build_state_sync(ctx, now);
            sync.global_paused = Some(paused);
            let sent = ctx.net.send(&WireMessage::StateSync(sync));
            if sent {
                self.last_state_sync_ms = Some(now);
            }
            return sent;
        }
        let sync = StateSync {
            global_paused: Some(paused),
            paused_by: if paused {
                ctx.net.self_id().map(str::to_string)
            } else {
                None
            },
            pause_start_time: if paused {
                ctx.clock.pause_start_ms()
            } else {
                None
            },
            ..StateSync::default()
        };
        ctx.net.send(&WireMessage::StateSync(sync))
    }

    pub fn send_input(&self, ctx: &GameContext, direction: Direction) -> bool {
        ctx.net
            .send(&WireMessage::PlayerInput(PlayerInput { direction }))
    }

    /// Host housekeeping: throttled `game_state` while playing and the
    /// periodic `state_sync` heartbeat.
    pub fn maintain(&mut self, ctx: &GameContext, now: u64) {
        if !ctx.net.is_host() || !ctx.net.in_session() {
            return;
        }
        if ctx.state() == MatchState::Playing {
            self.broadcast_game_state(ctx, now, false);
        }
        let due = self.last_state_sync_ms.map_or(true, |last| {
            now.saturating_sub(last) >= ctx.config.state_sync_interval_ms
        });
        if due {
            self.broadcast_state_sync(ctx, now);
        }
    }

    pub fn check_liveness(&mut self, ctx: &mut GameContext, now: u64) {
        if ctx.net.check_liveness(now) == Liveness::Lost {
            ctx.request_state(MatchState::Menu, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayHub;
    use shared::config::GameConfig;
    use shared::Position;

    struct Pair {
        _hub: RelayHub,
        host: GameContext,
        guest: GameContext,
        host_proto: NetworkSyncProtocol,
        guest_proto: NetworkSyncProtocol,
    }

    fn pair() -> Pair {
        let hub = RelayHub::inline();
        let mut host = GameContext::new(GameConfig::default(), Some(1), Logger::new("host"));
        let mut guest = GameContext::new(GameConfig::default(), Some(2), Logger::new("guest"));
        let mut host_proto = NetworkSyncProtocol::new(Logger::new("host"));
        let mut guest_proto = NetworkSyncProtocol::new(Logger::new("guest"));

        host.net.connect(&hub, "localhost", 9001, 0).unwrap();
        guest.net.connect(&hub, "localhost", 9001, 0).unwrap();
        let session = host.net.host_session(0).unwrap().session_id;
        host_proto.register_self(&mut host);
        guest.net.join_session(&session, 0).unwrap();
        guest_proto.register_self(&mut guest);

        host_proto.process_inbound(&mut host, 0);
        guest_proto.process_inbound(&mut guest, 0);

        Pair {
            _hub: hub,
            host,
            guest,
            host_proto,
            guest_proto,
        }
    }

    fn inject(ctx: &GameContext, from: &str, message: &WireMessage) {
        ctx.net
            .queue()
            .push(QueuedEvent::message(from, message.encode().unwrap()));
    }

    fn host_id(p: &Pair) -> String {
        p.host.net.self_id().unwrap().to_string()
    }

    fn guest_id(p: &Pair) -> String {
        p.guest.net.self_id().unwrap().to_string()
    }

    #[test]
    fn test_join_aligns_slots() {
        let p = pair();
        assert_eq!(p.host.my_index, Some(0));
        assert_eq!(p.guest.my_index, Some(1));
        assert_eq!(p.host.roster.peer_ids(), p.guest.roster.peer_ids());
    }

    #[test]
    fn test_out_of_bounds_entry_leaves_body_unchanged() {
        let mut p = pair();
        let before = p.guest.roster.snake(0).unwrap().body().clone();
        let update = GameStateUpdate {
            food_x: 3,
            food_y: 3,
            players: vec![
                PlayerEntry {
                    index: 0,
                    alive: true,
                    body: vec![Position::new(5, 5), Position::new(41, 5)],
                    score: Some(10),
                },
                PlayerEntry {
                    index: 1,
                    alive: true,
                    body: vec![Position::new(7, 7), Position::new(7, 8)],
                    score: Some(20_000),
                },
            ],
            ..GameStateUpdate::default()
        };
        let host = host_id(&p);
        inject(&p.guest, &host, &WireMessage::GameState(update));
        p.guest_proto.process_inbound(&mut p.guest, 100);

        assert_eq!(p.guest.roster.snake(0).unwrap().body(), &before);
        let mine = p.guest.roster.snake(1).unwrap();
        assert_eq!(mine.head(), Some(Position::new(7, 7)));
        assert_eq!(mine.score(), 0);
        assert_eq!(p.guest.food.position(), Position::new(3, 3));
    }

    #[test]
    fn test_game_state_ignored_by_host_and_from_strangers() {
        let mut p = pair();
        let update = GameStateUpdate {
            players: vec![PlayerEntry {
                index: 0,
                alive: false,
                body: vec![Position::new(1, 1)],
                score: None,
            }],
            ..GameStateUpdate::default()
        };
        let guest = guest_id(&p);
        inject(&p.host, &guest, &WireMessage::GameState(update.clone()));
        p.host_proto.process_inbound(&mut p.host, 10);
        assert!(p.host.roster.snake(0).unwrap().is_alive());

        inject(&p.guest, "intruder", &WireMessage::GameState(update));
        p.guest_proto.process_inbound(&mut p.guest, 10);
        assert!(p.guest.roster.snake(0).unwrap().is_alive());
    }

    #[test]
    fn test_player_input_applied_on_host_only() {
        let mut p = pair();
        let input = WireMessage::PlayerInput(PlayerInput {
            direction: Direction::Up,
        });
        let guest = guest_id(&p);
        inject(&p.host, &guest, &input);
        p.host_proto.process_inbound(&mut p.host, 10);
        assert_eq!(
            p.host.roster.snake(1).unwrap().pending_direction(),
            Direction::Up
        );

        let host = host_id(&p);
        inject(&p.guest, &host, &input);
        p.guest_proto.process_inbound(&mut p.guest, 10);
        assert_eq!(
            p.guest.roster.snake(0).unwrap().pending_direction(),
            Direction::None
        );
    }

    #[test]
    fn test_malformed_and_unknown_direction_are_dropped() {
        let mut p = pair();
        let guest = guest_id(&p);
        p.host.net.queue().push(QueuedEvent::message(&guest, "{not json"));
        p.host.net.queue().push(QueuedEvent::message(
            &guest,
            r#"{"type":"player_input","direction":"SIDEWAYS"}"#,
        ));
        assert_eq!(p.host_proto.process_inbound(&mut p.host, 10), 2);
        assert_eq!(
            p.host.roster.snake(1).unwrap().pending_direction(),
            Direction::None
        );
    }

    #[test]
    fn test_unknown_game_state_name_is_ignored() {
        let mut p = pair();
        let sync = StateSync {
            game_state: Some("LOADING".into()),
            food_x: 9,
            food_y: 9,
            ..StateSync::default()
        };
        let host = host_id(&p);
        inject(&p.guest, &host, &WireMessage::StateSync(sync));
        p.guest_proto.process_inbound(&mut p.guest, 10);
        assert!(p.guest.take_requests().is_empty());
        assert_eq!(p.guest.food.position(), Position::new(9, 9));
    }

    #[test]
    fn test_state_sync_from_non_host_only_pauses() {
        let mut p = pair();
        p.host.set_state(MatchState::Playing);
        p.host.clock.start(1_000);
        let sync = StateSync {
            game_state: Some("MATCH_END".into()),
            food_x: 1,
            food_y: 1,
            global_paused: Some(true),
            pause_start_time: Some(4_000),
            ..StateSync::default()
        };
        let guest = guest_id(&p);
        inject(&p.host, &guest, &WireMessage::StateSync(sync));
        p.host_proto.process_inbound(&mut p.host, 5_000);

        let requests = p.host.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, MatchState::Paused);
        assert!(requests[0].from_network);
        assert_eq!(p.host.clock.pausing_peer(), Some(guest.as_str()));
        assert_eq!(p.host.clock.pause_start_ms(), Some(4_000));
        assert_ne!(p.host.food.position(), Position::new(1, 1));
    }

    #[test]
    fn test_out_of_range_timing_leaves_clock_unchanged() {
        let mut p = pair();
        p.guest.clock.apply_authoritative(1_000, 2_000, 0, 3_000);
        let before = p.guest.clock.clone();
        let host = host_id(&p);

        let sync = StateSync {
            match_start_time: u64::MAX,
            elapsed_ms: 5,
            food_x: 1,
            food_y: 1,
            ..StateSync::default()
        };
        inject(&p.guest, &host, &WireMessage::StateSync(sync));
        let update = GameStateUpdate {
            food_x: 2,
            food_y: 2,
            match_start_time: 1_000,
            elapsed_ms: u64::MAX,
            ..GameStateUpdate::default()
        };
        inject(&p.guest, &host, &WireMessage::GameState(update));
        p.guest_proto.process_inbound(&mut p.guest, 4_000);

        assert_eq!(p.guest.clock, before);
        assert_eq!(p.guest.food.position(), Position::new(2, 2));
    }

    #[test]
    fn test_out_of_bounds_game_state_food_is_ignored() {
        let mut p = pair();
        p.guest.food.set_position(Position::new(4, 4));
        let update = GameStateUpdate {
            food_x: -3,
            food_y: 99,
            ..GameStateUpdate::default()
        };
        let host = host_id(&p);
        inject(&p.guest, &host, &WireMessage::GameState(update));
        p.guest_proto.process_inbound(&mut p.guest, 1_000);
        assert_eq!(p.guest.food.position(), Position::new(4, 4));
    }

    #[test]
    fn test_pause_toggle_does_not_reveal_host() {
        let mut ctx = GameContext::new(GameConfig::default(), Some(3), Logger::new("guest"));
        let mut proto = NetworkSyncProtocol::new(Logger::new("guest"));
        ctx.food.set_position(Position::new(5, 5));

        let toggle = StateSync {
            global_paused: Some(true),
            paused_by: Some("peer-7".into()),
            pause_start_time: Some(2_000),
            ..StateSync::default()
        };
        inject(&ctx, "peer-7", &WireMessage::StateSync(toggle));
        proto.process_inbound(&mut ctx, 2_500);

        assert_eq!(ctx.net.host_id(), None);
        assert_eq!(ctx.food.position(), Position::new(5, 5));
        assert_eq!(ctx.clock.pausing_peer(), Some("peer-7"));

        let snapshot = StateSync {
            food_x: 8,
            food_y: 3,
            players: Some(vec!["peer-1".into(), String::new()]),
            ..StateSync::default()
        };
        inject(&ctx, "peer-1", &WireMessage::StateSync(snapshot));
        proto.process_inbound(&mut ctx, 3_000);

        assert_eq!(ctx.net.host_id(), Some("peer-1"));
        assert_eq!(ctx.food.position(), Position::new(8, 3));
    }

    #[test]
    fn test_only_pauser_or_host_can_unpause() {
        let mut p = pair();
        p.guest.set_state(MatchState::Paused);
        p.guest.clock.start(0);
        p.guest.clock.enter_pause(1_000, Some("peer-x"));

        let unpause = StateSync {
            global_paused: Some(false),
            ..StateSync::default()
        };
        inject(&p.guest, "peer-y", &WireMessage::StateSync(unpause.clone()));
        p.guest_proto.process_inbound(&mut p.guest, 2_000);
        assert!(p.guest.clock.is_paused());
        assert!(p.guest.take_requests().is_empty());

        inject(&p.guest, "peer-x", &WireMessage::StateSync(unpause));
        p.guest_proto.process_inbound(&mut p.guest, 3_000);
        assert!(!p.guest.clock.is_paused());
        assert_eq!(p.guest.clock.total_paused_ms(), 2_000);
        assert_eq!(p.guest.take_requests()[0].target, MatchState::Playing);
    }

    #[test]
    fn test_host_departure_requests_menu() {
        let mut p = pair();
        let host = host_id(&p);
        p.guest.net.queue().push(QueuedEvent::left(&host));
        p.guest_proto.process_inbound(&mut p.guest, 10);

        let requests = p.guest.take_requests();
        assert_eq!(requests[0].target, MatchState::Menu);
        assert!(p.guest.roster.find_by_peer(&host).is_none());
    }

    #[test]
    fn test_pauser_departure_releases_pause_on_host() {
        let mut p = pair();
        let guest = guest_id(&p);
        p.host.set_state(MatchState::Paused);
        p.host.clock.start(0);
        p.host.clock.enter_pause(100, Some(guest.as_str()));

        p.host.net.queue().push(QueuedEvent::left(&guest));
        p.host_proto.process_inbound(&mut p.host, 200);
        let requests = p.host.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, MatchState::Playing);
        assert!(!requests[0].from_network);
    }

    #[test]
    fn test_broadcast_throttle_and_critical_bypass() {
        let mut p = pair();
        p.host.set_state(MatchState::Playing);
        assert!(p.host_proto.broadcast_game_state(&p.host, 1_000, false));
        assert!(!p.host_proto.broadcast_game_state(&p.host, 1_500, false));
        assert!(p.host_proto.broadcast_game_state(&p.host, 1_600, true));
        assert!(!p.host_proto.broadcast_game_state(&p.host, 2_500, false));
        assert!(p.host_proto.broadcast_game_state(&p.host, 2_600, false));
        assert!(!p.guest_proto.broadcast_game_state(&p.guest, 9_000, true));
    }

    #[test]
    fn test_heartbeat_interval() {
        let mut p = pair();
        p.guest.net.drain(0);
        p.host_proto.maintain(&p.host, 0);
        p.host_proto.maintain(&p.host, 4_999);
        p.host_proto.maintain(&p.host, 5_000);
        let syncs = p
            .guest
            .net
            .drain(5_000)
            .into_iter()
            .filter(|e| e.payload.as_deref().is_some_and(|s| s.contains("state_sync")))
            .count();
        assert_eq!(syncs, 2);
    }
}
