use shared::{Color, Direction, Position, FOOD_COLOR, INITIAL_SNAKE_LENGTH};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    body: VecDeque<Position>,
    direction: Direction,
    next_direction: Direction,
    color: Color,
    alive: bool,
    score: i32,
}

impl Snake {
    /// Creates a snake of the initial length, head at `start`, body trailing to the left.
    pub fn new(color: Color, start: Position) -> Self {
        Self {
            body: initial_body(start),
            direction: Direction::None,
            next_direction: Direction::None,
            color,
            alive: true,
            score: 0,
        }
    }

    /// Ignores a direct reversal of the current direction.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction != Direction::None && direction == self.direction.opposite() {
            return;
        }
        self.next_direction = direction;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn pending_direction(&self) -> Direction {
        self.next_direction
    }

    /// Head position after the next step, or `None` while no direction is chosen.
    pub fn next_head(&self) -> Option<Position> {
        let head = self.head()?;
        match self.next_direction {
            Direction::None => None,
            direction => Some(head.step(direction)),
        }
    }

    /// Moves the head one cell. The tail is kept when `grow` is set.
    pub fn advance(&mut self, new_head: Position, grow: bool, reward: i32) {
        self.direction = self.next_direction;
        self.body.push_front(new_head);
        if grow {
            self.score += reward;
        } else {
            self.body.pop_back();
        }
    }

    pub fn reset(&mut self, start: Position, penalty: i32) {
        self.body = initial_body(start);
        self.direction = Direction::None;
        self.next_direction = Direction::None;
        self.alive = true;
        self.score = (self.score - penalty).max(0);
    }

    /// Replaces the body with an authoritative copy; empty bodies are ignored.
    pub fn set_body(&mut self, body: impl IntoIterator<Item = Position>) {
        let body: VecDeque<Position> = body.into_iter().collect();
        if !body.is_empty() {
            self.body = body;
        }
    }

    pub fn body(&self) -> &VecDeque<Position> {
        &self.body
    }

    pub fn head(&self) -> Option<Position> {
        self.body.front().copied()
    }

    pub fn tail(&self) -> Option<Position> {
        self.body.back().copied()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn set_score(&mut self, score: i32) {
        self.score = score;
    }
}

fn initial_body(start: Position) -> VecDeque<Position> {
    (0..INITIAL_SNAKE_LENGTH as i32)
        .map(|offset| Position::new(start.x - offset, start.y))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Food {
    position: Position,
    color: Color,
}

impl Food {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            color: FOOD_COLOR,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

impl Default for Food {
    fn default() -> Self {
        Food::new(Position::default())
    }
}
