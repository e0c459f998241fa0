//! # Snake Simulation Library
//!
//! The authoritative game model for up to four snakes on a fixed grid. It is
//! free of networking: a host (or a solo player) owns one [`roster::Roster`],
//! one [`snake::Food`] and one [`game::SnakeSimulation`], and advances them on
//! a fixed move interval. Non-hosts use the same types as a shadow copy that
//! is overwritten by the host's broadcasts.
//!
//! ## Module Organization
//!
//! ### Snake Module (`snake`)
//! A single snake body with pending direction, score and alive flag, plus the
//! food item.
//!
//! ### Roster Module (`roster`)
//! The four participant slots:
//! - Slot assignment in join order with deterministic spawn cells
//! - Reconciliation against the host's slot-indexed peer list
//! - Per-slot pause flags and input throttle timestamps
//!
//! ### Grid Module (`grid`)
//! The sparse occupancy set used for collision and spawn checks.
//!
//! ### Game Module (`game`)
//! The two-phase movement tick, respawning, food placement and the end of
//! match winner rule.
//!
//! ### Clock Module (`clock`)
//! Match start time, pause accounting, remaining time and the recorded winner.
//!
//! ## Usage Example
//!
//! ```rust
//! use shared::config::GameConfig;
//! use shared::logging::Logger;
//! use shared::Direction;
//! use sim::game::SnakeSimulation;
//! use sim::roster::Roster;
//! use sim::snake::Food;
//!
//! let config = GameConfig::default();
//! let mut roster = Roster::new(config.grid_width, config.grid_height);
//! let mut food = Food::default();
//! let mut simulation = SnakeSimulation::with_seed(&config, 42, Logger::new("doc"));
//!
//! let slot = roster.add_participant("local_player").unwrap();
//! simulation.spawn_food(&roster, &mut food);
//! roster.snake_mut(slot).unwrap().set_direction(Direction::Down);
//!
//! let outcome = simulation.tick(&mut roster, &mut food);
//! assert!(outcome.moved.contains(&slot) || outcome.respawned.contains(&slot));
//! ```

pub mod clock;
pub mod game;
pub mod grid;
pub mod roster;
pub mod snake;

pub use clock::MatchClock;
pub use game::{determine_winner, SnakeSimulation, TickOutcome};
pub use grid::CollisionGrid;
pub use roster::{ParticipantSlot, Roster};
pub use snake::{Food, Snake};
