//! Greedy intent source used to drive bot peers in the headless demo.

use crate::context::GameContext;
use shared::{Direction, Position};
use std::collections::HashSet;

const CANDIDATES: [Direction; 4] = [
    Direction::Up,
    Direction::Right,
    Direction::Down,
    Direction::Left,
];

#[derive(Debug, Default)]
pub struct Autopilot {
    last: Option<Direction>,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the safe step that gets closest to the food. Returns `None` when
    /// the best choice equals the previous one, so callers only emit changes.
    pub fn decide(&mut self, ctx: &GameContext) -> Option<Direction> {
        let slot = ctx.my_index?;
        let snake = ctx.roster.snake(slot)?;
        let head = snake.head()?;
        let neck = snake.body().get(1).copied();
        let food = ctx.food.position();

        let occupied: HashSet<Position> = ctx
            .roster
            .live_snakes()
            .flat_map(|(_, s)| s.body().iter().copied())
            .collect();

        let best = CANDIDATES
            .iter()
            .copied()
            .map(|dir| (dir, head.step(dir)))
            .filter(|(_, cell)| Some(*cell) != neck)
            .filter(|(_, cell)| ctx.config.in_bounds(cell) && !occupied.contains(cell))
            .min_by_key(|(_, cell)| (cell.x - food.x).abs() + (cell.y - food.y).abs())
            .map(|(dir, _)| dir)?;

        if self.last == Some(best) {
            return None;
        }
        self.last = Some(best);
        Some(best)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
