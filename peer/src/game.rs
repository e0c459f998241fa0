//! Match state machine and per-tick driver for one peer process.
//!
//! [`Game`] owns the [`GameContext`], the [`NetworkSyncProtocol`] and the
//! [`InputSender`]. Each call to [`Game::tick`] runs, in order:
//!
//! 1. deferred transport teardown after a lost connection
//! 2. drain and apply inbound events
//! 3. apply state requests made by the protocol
//! 4. liveness check (non-hosts)
//! 5. the update for the current phase: countdown, simulation step, match
//!    timer, host broadcasts and throttled input
//!
//! Transitions are validated against [`MatchState::can_transition`]; an
//! illegal request is logged and leaves the state unchanged.

use crate::context::GameContext;
use crate::input::{InputSender, Intent};
use crate::protocol::NetworkSyncProtocol;
use crate::snapshot::GameSnapshot;
use crate::state::{MatchState, TransitionError};
use crate::transport::{Connector, TransportError};
use shared::config::GameConfig;
use shared::logging::Logger;
use shared::Direction;
use sim::determine_winner;
use std::sync::Arc;
use thiserror::Error;

/// Peer id used for the only participant of a solo match.
pub const LOCAL_PLAYER_ID: &str = "local_player";

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no transport configured")]
    Offline,
}

pub struct Game {
    ctx: GameContext,
    protocol: NetworkSyncProtocol,
    input: InputSender,
    connector: Option<Arc<dyn Connector>>,
    last_move_ms: u64,
    countdown_start_ms: u64,
    running: bool,
    log: Logger,
}

impl Game {
    pub fn new(
        config: GameConfig,
        connector: Option<Arc<dyn Connector>>,
        seed: Option<u64>,
        log: Logger,
    ) -> Self {
        Self {
            ctx: GameContext::new(config, seed, log.clone()),
            protocol: NetworkSyncProtocol::new(log.scoped("sync")),
            input: InputSender::new(),
            connector,
            last_move_ms: 0,
            countdown_start_ms: 0,
            running: true,
            log,
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    pub fn state(&self) -> MatchState {
        self.ctx.state()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(&self.ctx)
    }

    pub fn input(&self) -> &InputSender {
        &self.input
    }

    /// Runs one frame. `now` is wall-clock milliseconds.
    pub fn tick(&mut self, now: u64) {
        if self.ctx.net.connection_lost() {
            self.log.warn("Connection lost, closing transport");
            self.ctx.net.disconnect();
        }

        self.protocol.process_inbound(&mut self.ctx, now);
        self.apply_requests(now);
        self.protocol.check_liveness(&mut self.ctx, now);

        match self.ctx.state() {
            MatchState::Countdown => self.update_countdown(now),
            MatchState::Playing => self.update_playing(now),
            MatchState::Paused => {
                self.ctx.clock.tick(now);
            }
            _ => {}
        }

        self.protocol.maintain(&self.ctx, now);
    }

    fn update_countdown(&mut self, now: u64) {
        if !self.ctx.is_authoritative() {
            return;
        }
        if now.saturating_sub(self.countdown_start_ms) >= self.ctx.config.countdown_ms {
            let _ = self.transition(MatchState::Playing, false, now);
        }
    }

    fn update_playing(&mut self, now: u64) {
        self.ctx.clock.tick(now);

        if !self.ctx.is_authoritative() {
            self.input.flush(&mut self.ctx, &self.protocol, now);
            return;
        }

        if now.saturating_sub(self.last_move_ms) >= self.ctx.config.move_interval_ms {
            self.last_move_ms = now;
            let ctx = &mut self.ctx;
            let outcome = ctx.simulation.tick(&mut ctx.roster, &mut ctx.food);
            if outcome.is_scoring_change() {
                self.protocol.broadcast_game_state(&self.ctx, now, true);
            }
        }

        if self.ctx.clock.is_expired(now) {
            let _ = self.transition(MatchState::MatchEnd, false, now);
        }
    }

    fn apply_requests(&mut self, now: u64) {
        // Enter hooks may queue further requests; bound the rounds.
        for _ in 0..4 {
            let requests = self.ctx.take_requests();
            if requests.is_empty() {
                return;
            }
            for request in requests {
                let current = self.ctx.state();
                if request.target == current {
                    continue;
                }
                if request.target == MatchState::Menu && current == MatchState::Countdown {
                    let _ = self.transition(MatchState::Lobby, request.from_network, now);
                }
                let _ = self.transition(request.target, request.from_network, now);
            }
        }
    }

    /// Validates and performs a transition, running the exit hook of the old
    /// state and the enter hook of the new one.
    pub fn transition(
        &mut self,
        to: MatchState,
        from_network: bool,
        now: u64,
    ) -> Result<(), TransitionError> {
        let from = self.ctx.state();
        if let Err(e) = from.check_transition(to) {
            self.log.warn(format_args!("Rejected {}", e));
            return Err(e);
        }
        self.log.info(format_args!(
            "{} -> {}{}",
            from,
            to,
            if from_network { " (network)" } else { "" }
        ));
        self.on_exit(from, to, now);
        self.ctx.set_state(to);
        self.on_enter(from, to, from_network, now);
        Ok(())
    }

    fn on_exit(&mut self, from: MatchState, _to: MatchState, now: u64) {
        if from == MatchState::Paused {
            self.ctx.clock.exit_pause(now);
            self.ctx.roster.set_all_paused(false);
        }
    }

    fn on_enter(&mut self, from: MatchState, to: MatchState, from_network: bool, now: u64) {
        match to {
            MatchState::Menu => self.enter_menu(),
            MatchState::MultiplayerSetup => self.enter_setup(now),
            MatchState::Lobby => {
                if from == MatchState::MatchEnd {
                    self.ctx.reset_match();
                }
                self.protocol.broadcast_state_sync(&self.ctx, now);
            }
            MatchState::Countdown => {
                self.countdown_start_ms = now;
                self.protocol.broadcast_state_sync(&self.ctx, now);
            }
            MatchState::Playing => self.enter_playing(from, from_network, now),
            MatchState::Paused => {
                if !from_network {
                    let me = self.my_peer_id();
                    self.ctx.clock.enter_pause(now, Some(me.as_str()));
                    self.ctx.roster.set_all_paused(true);
                    self.protocol.send_pause(&self.ctx, now, true);
                }
            }
            MatchState::MatchEnd => self.enter_match_end(now),
        }
    }

    fn enter_menu(&mut self) {
        self.ctx.net.disconnect();
        self.ctx.clear();
        self.protocol.reset();
        self.input.reset();
    }

    fn enter_setup(&mut self, now: u64) {
        self.ctx.clear();
        self.protocol.reset();
        let Some(connector) = self.connector.clone() else {
            self.log.error("No transport available for multiplayer");
            self.ctx.request_state(MatchState::Menu, false);
            return;
        };
        let (host, port) = (self.ctx.config.server_host.clone(), self.ctx.config.server_port);
        if let Err(e) = self.ctx.net.connect(connector.as_ref(), &host, port, now) {
            self.log.error(format_args!("Could not connect to {}:{}: {}", host, port, e));
            self.ctx.request_state(MatchState::Menu, false);
            return;
        }
        self.refresh_sessions();
    }

    fn enter_playing(&mut self, from: MatchState, from_network: bool, now: u64) {
        match from {
            MatchState::Menu => {
                self.ctx.clear();
                self.ctx.roster.add_participant(LOCAL_PLAYER_ID);
                self.ctx.my_index = Some(0);
                self.start_match(now);
            }
            MatchState::Lobby | MatchState::Countdown => {
                self.input.reset();
                if self.ctx.is_authoritative() {
                    self.start_match(now);
                    self.protocol.broadcast_state_sync(&self.ctx, now);
                    self.protocol.broadcast_game_state(&self.ctx, now, true);
                }
            }
            MatchState::Paused => {
                if !from_network {
                    self.protocol.send_pause(&self.ctx, now, false);
                }
            }
            _ => {}
        }
    }

    fn enter_match_end(&mut self, now: u64) {
        if self.ctx.is_authoritative() || self.ctx.clock.winner().is_none() {
            let winner = determine_winner(&self.ctx.roster);
            self.ctx.clock.set_winner(winner);
        }
        match self.ctx.clock.winner() {
            Some(winner) => self
                .log
                .info(format_args!("Match over, player {} wins", winner + 1)),
            None => self.log.info("Match over, no winner"),
        }
        self.protocol.broadcast_state_sync(&self.ctx, now);
        self.protocol.broadcast_game_state(&self.ctx, now, true);
    }

    fn start_match(&mut self, now: u64) {
        let ctx = &mut self.ctx;
        ctx.roster.reset_to_spawns();
        ctx.clock.start(now);
        ctx.simulation.spawn_food(&ctx.roster, &mut ctx.food);
        self.last_move_ms = now;
        self.log.info(format_args!(
            "Match started with {} player(s)",
            self.ctx.roster.len()
        ));
    }

    fn refresh_sessions(&mut self) {
        match self.ctx.net.refresh_sessions() {
            Ok(sessions) => self
                .log
                .info(format_args!("{} session(s) available", sessions.len())),
            Err(e) => self.log.error(format_args!("Could not list sessions: {}", e)),
        }
    }

    fn my_peer_id(&self) -> String {
        self.ctx
            .net
            .self_id()
            .unwrap_or(LOCAL_PLAYER_ID)
            .to_string()
    }

    /// Only the peer that paused may resume; a solo player always may.
    fn may_unpause(&self) -> bool {
        match self.ctx.clock.pausing_peer() {
            None => true,
            Some(pauser) => !self.ctx.is_networked() || pauser == self.my_peer_id(),
        }
    }

    fn steer(&mut self, direction: Direction, now: u64) {
        let Some(slot) = self.ctx.my_index else {
            return;
        };
        if self.ctx.is_authoritative() {
            if let Some(snake) = self.ctx.roster.snake_mut(slot) {
                snake.set_direction(direction);
            }
        } else {
            self.input.queue(direction);
            self.input.flush(&mut self.ctx, &self.protocol, now);
        }
    }

    /// Applies a player intent in the context of the current phase. Intents
    /// that mean nothing in the current phase are ignored.
    pub fn handle_intent(&mut self, intent: Intent, now: u64) -> Result<(), GameError> {
        use MatchState::*;
        let state = self.ctx.state();
        match (state, intent) {
            (_, Intent::Quit) => {
                if state != Menu {
                    self.leave_to_menu(now);
                }
                self.running = false;
            }
            (Menu, Intent::Solo) => self.transition(Playing, false, now)?,
            (Menu, Intent::RefreshSessions) => self.transition(MultiplayerSetup, false, now)?,
            (MultiplayerSetup, Intent::RefreshSessions) => self.refresh_sessions(),
            (Menu, Intent::Host) | (MultiplayerSetup, Intent::Host) => {
                if state == Menu {
                    self.transition(MultiplayerSetup, false, now)?;
                }
                if !self.ctx.net.is_connected() {
                    return Err(GameError::Offline);
                }
                self.ctx.net.host_session(now)?;
                self.protocol.register_self(&mut self.ctx);
                self.transition(Lobby, false, now)?;
            }
            (MultiplayerSetup, Intent::Join(index)) => {
                self.ctx.net.join_listed(index, now)?;
                self.protocol.register_self(&mut self.ctx);
                self.transition(Lobby, false, now)?;
            }
            (MultiplayerSetup, Intent::Back) => self.transition(Menu, false, now)?,
            (Lobby, Intent::Confirm) if self.ctx.net.is_host() => {
                self.transition(Countdown, false, now)?
            }
            (Lobby, Intent::Back) => self.transition(MultiplayerSetup, false, now)?,
            (Countdown, Intent::Back) if self.ctx.net.is_host() => {
                self.transition(Lobby, false, now)?
            }
            (Playing, Intent::Steer(direction)) => self.steer(direction, now),
            (Playing, Intent::TogglePause) => self.transition(Paused, false, now)?,
            (Paused, Intent::TogglePause) => {
                if self.may_unpause() {
                    self.transition(Playing, false, now)?;
                } else {
                    self.log.info(format_args!(
                        "Only {} can resume",
                        self.ctx.clock.pausing_peer().unwrap_or("the pauser")
                    ));
                }
            }
            (Playing, Intent::Back) | (Paused, Intent::Back) | (MatchEnd, Intent::Back) => {
                self.transition(Menu, false, now)?
            }
            (MatchEnd, Intent::Confirm) => {
                if !self.ctx.is_networked() {
                    self.transition(Menu, false, now)?;
                } else if self.ctx.net.is_host() {
                    self.transition(Lobby, false, now)?;
                }
            }
            (state, intent) => self
                .log
                .debug(format_args!("Ignoring {:?} in {}", intent, state)),
        }
        Ok(())
    }

    fn leave_to_menu(&mut self, now: u64) {
        if self.ctx.state() == MatchState::Countdown {
            let _ = self.transition(MatchState::Lobby, false, now);
        }
        let _ = self.transition(MatchState::Menu, false, now);
    }
}
