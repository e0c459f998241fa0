//! Sparse occupancy set over the play field.
//!
//! The grid is rebuilt from every active, alive snake at the start of a tick
//! group and then patched incrementally ("tail leaves, head arrives").
//! Patching without a prior rebuild in the same tick group is a logic error.

use crate::roster::Roster;
use shared::Position;
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct CollisionGrid {
    occupied: HashSet<Position>,
}

impl CollisionGrid {
    pub fn new() -> Self {
        Self {
            occupied: HashSet::with_capacity(400),
        }
    }

    pub fn rebuild(&mut self, roster: &Roster) {
        self.occupied.clear();
        for (_, snake) in roster.live_snakes() {
            self.occupied.extend(snake.body().iter().copied());
        }
    }

    pub fn occupied(&self, pos: &Position) -> bool {
        self.occupied.contains(pos)
    }

    pub fn patch(&mut self, remove: Option<Position>, add: Option<Position>) {
        if let Some(pos) = remove {
            self.occupied.remove(&pos);
        }
        if let Some(pos) = add {
            self.occupied.insert(pos);
        }
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Position> {
        self.occupied.iter()
    }
}
