//! JSON wire messages exchanged through the session transport.
//!
//! Every message is a JSON object with a `type` tag. Receivers ignore fields
//! they do not know, so new fields can be added without breaking older peers.
//! Decoding happens exactly once, when the simulation thread drains the
//! inbound queue; range validation of individual fields is done by the
//! receiver through the `validate_*` helpers so that a bad field only drops
//! that field or entry, never the whole process.

use crate::{Direction, Position, MAX_PLAYERS, MAX_SCORE, MAX_SNAKE_LENGTH, MAX_WIRE_TIME_MS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown direction {0:?}")]
    UnknownDirection(String),
    #[error("unknown game state {0:?}")]
    UnknownState(String),
    #[error("slot index {0} out of range")]
    SlotOutOfRange(i64),
    #[error("player {index}: body cell {cell} outside the grid")]
    CellOutOfBounds { index: usize, cell: Position },
    #[error("player {index}: empty body")]
    EmptyBody { index: usize },
    #[error("score {0} out of range")]
    ScoreOutOfRange(i32),
    #[error("{field} {value} out of range")]
    TimeOutOfRange { field: &'static str, value: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    StateSync(StateSync),
    GameState(GameStateUpdate),
    PlayerInput(PlayerInput),
}

impl WireMessage {
    pub fn decode(payload: &str) -> Result<WireMessage, ProtocolError> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::StateSync(_) => "state_sync",
            WireMessage::GameState(_) => "game_state",
            WireMessage::PlayerInput(_) => "player_input",
        }
    }
}

/// Full snapshot sent by the host, plus pause toggles sent by any peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSync {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_state: Option<String>,
    pub match_start_time: u64,
    pub elapsed_ms: u64,
    pub total_paused_time: u64,
    pub food_x: i32,
    pub food_y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_start_time: Option<u64>,
    /// Slot-indexed roster, an empty string marks a free slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_index: Option<i64>,
}

impl StateSync {
    pub fn food(&self) -> Position {
        Position::new(self.food_x, self.food_y)
    }

    /// Only the host's full snapshots carry these; a pause toggle from
    /// another peer does not.
    pub fn carries_snapshot(&self) -> bool {
        self.game_state.is_some() || self.players.is_some()
    }

    /// Range check of the match timing fields, pause start excluded.
    pub fn validate_timing(&self) -> Result<(), ProtocolError> {
        validate_time("matchStartTime", self.match_start_time)?;
        validate_time("elapsedMs", self.elapsed_ms)?;
        validate_time("totalPausedTime", self.total_paused_time)?;
        Ok(())
    }
}

/// Incremental snapshot of every active snake, host to peers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateUpdate {
    pub food_x: i32,
    pub food_y: i32,
    pub match_start_time: u64,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_paused_time: Option<u64>,
    pub players: Vec<PlayerEntry>,
}

impl GameStateUpdate {
    pub fn food(&self) -> Position {
        Position::new(self.food_x, self.food_y)
    }

    pub fn validate_timing(&self) -> Result<(), ProtocolError> {
        validate_time("matchStartTime", self.match_start_time)?;
        validate_time("elapsedMs", self.elapsed_ms)?;
        if let Some(total) = self.total_paused_time {
            validate_time("totalPausedTime", total)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub index: i64,
    pub alive: bool,
    pub body: Vec<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

impl PlayerEntry {
    pub fn validate_slot(&self) -> Result<usize, ProtocolError> {
        usize::try_from(self.index)
            .ok()
            .filter(|slot| *slot < MAX_PLAYERS)
            .ok_or(ProtocolError::SlotOutOfRange(self.index))
    }

    /// Strict body validation: the first cell outside the grid rejects the
    /// whole entry. Bodies longer than [`MAX_SNAKE_LENGTH`] are truncated.
    pub fn validate_body(&self, width: i32, height: i32) -> Result<Vec<Position>, ProtocolError> {
        let index = self.validate_slot()?;
        if self.body.is_empty() {
            return Err(ProtocolError::EmptyBody { index });
        }
        if let Some(cell) = self
            .body
            .iter()
            .take(MAX_SNAKE_LENGTH)
            .find(|cell| !cell.in_bounds(width, height))
        {
            return Err(ProtocolError::CellOutOfBounds { index, cell: *cell });
        }
        Ok(self.body.iter().take(MAX_SNAKE_LENGTH).copied().collect())
    }
}

pub fn validate_time(field: &'static str, value: u64) -> Result<u64, ProtocolError> {
    if value <= MAX_WIRE_TIME_MS {
        Ok(value)
    } else {
        Err(ProtocolError::TimeOutOfRange { field, value })
    }
}

pub fn validate_score(score: i32) -> Result<i32, ProtocolError> {
    if (0..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(ProtocolError::ScoreOutOfRange(score))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub direction: Direction,
}
