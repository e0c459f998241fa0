//! Authoritative snake simulation.
//!
//! One call to [`SnakeSimulation::tick`] advances every active, alive snake by
//! one cell. The tick runs in two phases so the outcome does not depend on
//! the order in which snakes are visited:
//!
//! 1. *Plan*: every move is checked against the collision grid as it was at
//!    the start of the tick. Nothing is mutated.
//! 2. *Apply*: moves are applied in slot order. Collided snakes are respawned
//!    after the loop and the grid is rebuilt from scratch.

use crate::grid::CollisionGrid;
use crate::roster::Roster;
use crate::snake::Food;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::config::GameConfig;
use shared::logging::Logger;
use shared::{Position, INITIAL_SNAKE_LENGTH};

/// What happened during one simulation tick
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    pub moved: Vec<usize>,
    pub grew: Vec<usize>,
    pub respawned: Vec<usize>,
    pub food_respawned: bool,
}

impl TickOutcome {
    /// Growth or death changes scores; such ticks are broadcast immediately.
    pub fn is_scoring_change(&self) -> bool {
        !self.grew.is_empty() || !self.respawned.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct PlannedMove {
    slot: usize,
    old_tail: Position,
    new_head: Position,
    will_grow: bool,
    collided: bool,
}

pub struct SnakeSimulation {
    grid: CollisionGrid,
    rng: StdRng,
    width: i32,
    height: i32,
    food_reward: i32,
    death_penalty: i32,
    max_spawn_attempts: u32,
    log: Logger,
}

impl SnakeSimulation {
    pub fn new(config: &GameConfig, log: Logger) -> Self {
        Self::with_rng(config, StdRng::from_entropy(), log)
    }

    pub fn with_seed(config: &GameConfig, seed: u64, log: Logger) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed), log)
    }

    fn with_rng(config: &GameConfig, rng: StdRng, log: Logger) -> Self {
        Self {
            grid: CollisionGrid::new(),
            rng,
            width: config.grid_width,
            height: config.grid_height,
            food_reward: config.food_reward,
            death_penalty: config.death_penalty,
            max_spawn_attempts: config.max_spawn_attempts.max(1),
            log,
        }
    }

    pub fn grid(&self) -> &CollisionGrid {
        &self.grid
    }

    pub fn rebuild_grid(&mut self, roster: &Roster) {
        self.grid.rebuild(roster);
    }

    pub fn tick(&mut self, roster: &mut Roster, food: &mut Food) -> TickOutcome {
        self.grid.rebuild(roster);
        let planned = self.plan_moves(roster, food.position());

        let mut outcome = TickOutcome::default();
        let mut claimed: Vec<Position> = Vec::with_capacity(planned.len());

        for mv in &planned {
            // Two heads entering the same empty cell: the lower slot keeps it.
            if mv.collided || claimed.contains(&mv.new_head) {
                outcome.respawned.push(mv.slot);
                continue;
            }
            let Some(snake) = roster.snake_mut(mv.slot) else {
                continue;
            };
            claimed.push(mv.new_head);
            snake.advance(mv.new_head, mv.will_grow, self.food_reward);
            if mv.will_grow {
                self.grid.patch(None, Some(mv.new_head));
                outcome.grew.push(mv.slot);
            } else {
                self.grid.patch(Some(mv.old_tail), Some(mv.new_head));
            }
            outcome.moved.push(mv.slot);
        }

        if !outcome.respawned.is_empty() {
            self.grid.rebuild(roster);
            for &slot in &outcome.respawned {
                self.respawn_participant(roster, slot);
            }
            self.grid.rebuild(roster);
        }

        if !outcome.grew.is_empty() {
            let cell = self.random_free_cell();
            food.set_position(cell);
            outcome.food_respawned = true;
            self.log.debug(format_args!("Food respawned at {}", cell));
        }

        outcome
    }

    fn plan_moves(&self, roster: &Roster, food: Position) -> Vec<PlannedMove> {
        let mut planned = Vec::new();
        for (slot, snake) in roster.live_snakes() {
            let (Some(old_head), Some(old_tail)) = (snake.head(), snake.tail()) else {
                continue;
            };
            let Some(new_head) = snake.next_head() else {
                continue;
            };
            let will_grow = old_head == food;
            planned.push(PlannedMove {
                slot,
                old_tail,
                new_head,
                will_grow,
                collided: self.collides(new_head, old_tail, will_grow),
            });
        }
        planned
    }

    /// Collision test against the tick-start grid. A snake that is not
    /// growing may enter the cell its own tail is leaving.
    fn collides(&self, new_head: Position, own_tail: Position, will_grow: bool) -> bool {
        if !new_head.in_bounds(self.width, self.height) {
            return true;
        }
        if !self.grid.occupied(&new_head) {
            return false;
        }
        will_grow || new_head != own_tail
    }

    /// Moves a participant to a random free cell with a fresh body.
    ///
    /// The grid must reflect the current bodies when this is called.
    pub fn respawn_participant(&mut self, roster: &mut Roster, slot: usize) {
        if roster.snake(slot).is_none() {
            return;
        }
        let spawn = self.random_spawn_cell();
        if let Some(snake) = roster.snake_mut(slot) {
            snake.reset(spawn, self.death_penalty);
            self.grid.patch(None, Some(spawn));
            self.log.info(format_args!(
                "Player {} collided and respawned at {}",
                slot + 1,
                spawn
            ));
        }
    }

    /// Rebuilds the grid and moves the food to a random free cell.
    pub fn spawn_food(&mut self, roster: &Roster, food: &mut Food) {
        self.grid.rebuild(roster);
        let cell = self.random_free_cell();
        food.set_position(cell);
    }

    fn random_free_cell(&mut self) -> Position {
        self.sample_cell(0, |grid, cell| !grid.occupied(&cell))
    }

    /// A head cell whose whole initial body lies inside the grid and is free.
    fn random_spawn_cell(&mut self) -> Position {
        let trailing = INITIAL_SNAKE_LENGTH as i32 - 1;
        self.sample_cell(trailing, move |grid, cell| {
            (0..=trailing).all(|offset| !grid.occupied(&Position::new(cell.x - offset, cell.y)))
        })
    }

    /// Samples up to `max_spawn_attempts` cells and returns the first that
    /// fits. When none fits the grid is treated as full and the last sample
    /// is used anyway.
    fn sample_cell(
        &mut self,
        min_x: i32,
        fits: impl Fn(&CollisionGrid, Position) -> bool,
    ) -> Position {
        let min_x = min_x.min(self.width - 1).max(0);
        let mut last = Position::new(min_x, 0);
        for _ in 0..self.max_spawn_attempts {
            let cell = Position::new(
                self.rng.gen_range(min_x..self.width),
                self.rng.gen_range(0..self.height),
            );
            if fits(&self.grid, cell) {
                return cell;
            }
            last = cell;
        }
        self.log.warn(format_args!(
            "Grid full after {} attempts, placing at {}",
            self.max_spawn_attempts, last
        ));
        last
    }
}

/// Longest body wins, then highest score, then lowest slot index.
pub fn determine_winner(roster: &Roster) -> Option<usize> {
    let mut best: Option<(usize, (usize, i32))> = None;
    for (slot, snake) in roster.active_snakes() {
        let key = (snake.len(), snake.score());
        match best {
            Some((_, best_key)) if best_key >= key => {}
            _ => best = Some((slot, key)),
        }
    }
    best.map(|(slot, _)| slot)
}
