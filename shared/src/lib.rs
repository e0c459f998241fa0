use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config;
pub mod logging;
pub mod messages;

pub const GRID_WIDTH: i32 = 40;
pub const GRID_HEIGHT: i32 = 30;

pub const MOVE_INTERVAL_MS: u64 = 100;
pub const MATCH_DURATION_SECONDS: u64 = 120;
pub const COUNTDOWN_MS: u64 = 3000;
pub const MAX_SPAWN_ATTEMPTS: u32 = 1000;
pub const FOOD_SCORE_VALUE: i32 = 10;
pub const DEATH_SCORE_PENALTY: i32 = 10;
pub const MAX_PLAYERS: usize = 4;
pub const INITIAL_SNAKE_LENGTH: usize = 3;

pub const BROADCAST_INTERVAL_MS: u64 = 1000;
pub const STATE_SYNC_INTERVAL_MS: u64 = 5000;
pub const DIRECTION_CHANGE_THROTTLE_MS: u64 = 16;
pub const CONNECTION_TIMEOUT_WARNING_MS: u64 = 15_000;
pub const CONNECTION_TIMEOUT_DISCONNECT_MS: u64 = 30_000;

pub const DEFAULT_SERVER_HOST: &str = "kontoret.onvo.se";
pub const DEFAULT_SERVER_PORT: u16 = 9001;

/// Upper bound on a body accepted from the network.
pub const MAX_SNAKE_LENGTH: usize = 400;
pub const MAX_SCORE: i32 = 10_000;
/// Upper bound on any timestamp or duration accepted from the network
/// (2^53 ms, the largest integer JSON peers represent exactly).
pub const MAX_WIRE_TIME_MS: u64 = 1 << 53;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::None => (0, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::None => Direction::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
            Direction::None => "NONE",
        }
    }
}

impl FromStr for Direction {
    type Err = messages::ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            "LEFT" => Ok(Direction::Left),
            "RIGHT" => Ok(Direction::Right),
            "NONE" => Ok(Direction::None),
            other => Err(messages::ProtocolError::UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub const PLAYER_COLORS: [Color; MAX_PLAYERS] = [
    Color::rgb(0, 255, 0),
    Color::rgb(0, 0, 255),
    Color::rgb(255, 255, 0),
    Color::rgb(255, 0, 255),
];

pub const FOOD_COLOR: Color = Color::rgb(255, 0, 0);

/// Fixed spawn cell for a slot: one per grid quadrant.
pub fn spawn_position(slot: usize, width: i32, height: i32) -> Position {
    match slot % MAX_PLAYERS {
        0 => Position::new(width / 4, height / 4),
        1 => Position::new(3 * width / 4, height / 4),
        2 => Position::new(width / 4, 3 * height / 4),
        _ => Position::new(3 * width / 4, 3 * height / 4),
    }
}
