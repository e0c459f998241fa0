//! Aggregate state of one peer process.
//!
//! [`GameContext`] owns everything the tick mutates. The protocol layer asks
//! for phase changes through [`GameContext::request_state`]; the state
//! machine applies the requests, so the protocol never depends on the
//! machine itself.

use crate::network::NetworkContext;
use crate::state::MatchState;
use shared::config::GameConfig;
use shared::logging::Logger;
use sim::{MatchClock, Roster, SnakeSimulation};
use sim::snake::Food;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRequest {
    pub target: MatchState,
    /// Set when the request mirrors a remote peer; suppresses outbound echoes.
    pub from_network: bool,
}

pub struct GameContext {
    pub net: NetworkContext,
    pub clock: MatchClock,
    pub roster: Roster,
    pub food: Food,
    pub simulation: SnakeSimulation,
    pub config: GameConfig,
    /// Slot owned by this process, once known
    pub my_index: Option<usize>,
    pub log: Logger,
    state: MatchState,
    requests: Vec<StateRequest>,
}

impl GameContext {
    pub fn new(config: GameConfig, seed: Option<u64>, log: Logger) -> Self {
        let simulation = match seed {
            Some(seed) => SnakeSimulation::with_seed(&config, seed, log.scoped("sim")),
            None => SnakeSimulation::new(&config, log.scoped("sim")),
        };
        Self {
            net: NetworkContext::new(
                config.timeout_warning_ms,
                config.timeout_disconnect_ms,
                log.scoped("net"),
            ),
            clock: MatchClock::new(config.match_duration_seconds),
            roster: Roster::new(config.grid_width, config.grid_height),
            food: Food::default(),
            simulation,
            config,
            my_index: None,
            log,
            state: MatchState::Menu,
            requests: Vec::new(),
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: MatchState) {
        self.state = state;
    }

    pub fn request_state(&mut self, target: MatchState, from_network: bool) {
        self.requests.push(StateRequest {
            target,
            from_network,
        });
    }

    pub fn take_requests(&mut self) -> Vec<StateRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn pending_requests(&self) -> &[StateRequest] {
        &self.requests
    }

    /// Host, or a process playing alone.
    pub fn is_authoritative(&self) -> bool {
        !self.net.in_session() || self.net.is_host()
    }

    pub fn is_networked(&self) -> bool {
        self.net.in_session()
    }

    /// Re-derives `my_index` from the roster and the transport identity.
    pub fn refresh_my_index(&mut self) {
        if let Some(self_id) = self.net.self_id() {
            self.my_index = self.roster.find_by_peer(self_id);
        }
    }

    /// Clears roster, clock and food for a fresh match.
    pub fn reset_match(&mut self) {
        self.clock.reset();
        self.roster.reset_to_spawns();
        self.food = Food::default();
    }

    /// Returns the process to its idle state. Leaves the transport alone.
    pub fn clear(&mut self) {
        self.clock.reset();
        self.roster.clear();
        self.food = Food::default();
        self.my_index = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_are_taken_in_order() {
        let mut ctx = GameContext::new(GameConfig::default(), Some(1), Logger::new("ctx"));
        ctx.request_state(MatchState::Lobby, true);
        ctx.request_state(MatchState::Countdown, false);
        assert_eq!(ctx.pending_requests().len(), 2);

        let requests = ctx.take_requests();
        assert_eq!(requests[0].target, MatchState::Lobby);
        assert!(requests[0].from_network);
        assert_eq!(requests[1].target, MatchState::Countdown);
        assert!(ctx.take_requests().is_empty());
    }

    #[test]
    fn test_offline_process_is_authoritative() {
        let ctx = GameContext::new(GameConfig::default(), Some(1), Logger::new("ctx"));
        assert!(ctx.is_authoritative());
        assert!(!ctx.is_networked());
        assert_eq!(ctx.state(), MatchState::Menu);
    }

    #[test]
    fn test_clear_releases_slots() {
        let mut ctx = GameContext::new(GameConfig::default(), Some(1), Logger::new("ctx"));
        ctx.roster.add_participant("local_player");
        ctx.my_index = Some(0);
        ctx.clock.start(10);
        ctx.clear();
        assert!(ctx.roster.is_empty());
        assert_eq!(ctx.my_index, None);
        assert!(!ctx.clock.is_started());
    }
}
