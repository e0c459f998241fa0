//! Runtime configuration shared by the simulation and the peer runtime.
//!
//! Defaults come from the crate-level constants; the `peer` binary maps its
//! command-line arguments onto a [`GameConfig`] and injects it everywhere.

use crate::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub grid_width: i32,
    pub grid_height: i32,
    /// Milliseconds between two simulation steps.
    pub move_interval_ms: u64,
    pub match_duration_seconds: u64,
    pub countdown_ms: u64,
    pub food_reward: i32,
    pub death_penalty: i32,
    pub max_spawn_attempts: u32,
    /// Throttle window for scheduled `game_state` broadcasts.
    pub broadcast_interval_ms: u64,
    /// Interval of the host's full `state_sync` heartbeat.
    pub state_sync_interval_ms: u64,
    pub input_throttle_ms: u64,
    pub timeout_warning_ms: u64,
    pub timeout_disconnect_ms: u64,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,
            move_interval_ms: MOVE_INTERVAL_MS,
            match_duration_seconds: MATCH_DURATION_SECONDS,
            countdown_ms: COUNTDOWN_MS,
            food_reward: FOOD_SCORE_VALUE,
            death_penalty: DEATH_SCORE_PENALTY,
            max_spawn_attempts: MAX_SPAWN_ATTEMPTS,
            broadcast_interval_ms: BROADCAST_INTERVAL_MS,
            state_sync_interval_ms: STATE_SYNC_INTERVAL_MS,
            input_throttle_ms: DIRECTION_CHANGE_THROTTLE_MS,
            timeout_warning_ms: CONNECTION_TIMEOUT_WARNING_MS,
            timeout_disconnect_ms: CONNECTION_TIMEOUT_DISCONNECT_MS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl GameConfig {
    pub fn in_bounds(&self, pos: &Position) -> bool {
        pos.in_bounds(self.grid_width, self.grid_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = GameConfig::default();
        assert_eq!(config.grid_width, 40);
        assert_eq!(config.grid_height, 30);
        assert_eq!(config.max_spawn_attempts, 1000);
        assert!(config.timeout_warning_ms < config.timeout_disconnect_ms);
    }

    #[test]
    fn test_bounds_follow_configured_grid() {
        let config = GameConfig {
            grid_width: 5,
            grid_height: 5,
            ..GameConfig::default()
        };
        assert!(config.in_bounds(&Position::new(4, 4)));
        assert!(!config.in_bounds(&Position::new(5, 0)));
    }
}
