//! # Snake Peer Library
//!
//! This library provides the per-process runtime for networked snake matches
//! of up to four players. One process hosts the session and runs the
//! authoritative simulation; the others mirror it and send only their
//! directional intent.
//!
//! ## Architecture Overview
//!
//! ### Host Authority
//! The host advances the simulation on a fixed move interval, decides
//! collisions, food and the winner, and broadcasts the result. Non-hosts
//! never simulate; their snakes are overwritten by the host's updates.
//!
//! ### Single-Writer Tick
//! Transport callbacks can fire on any thread. They only append to the
//! [`queue::InboundMessageQueue`]; everything else is read and written by the
//! tick thread alone, so no other state needs locking.
//!
//! ### Validated Phases
//! The match moves through MENU, MULTIPLAYER_SETUP, LOBBY, COUNTDOWN,
//! PLAYING, PAUSED and MATCH_END. Only the edges listed in
//! [`state::MatchState::can_transition`] are taken; anything else is logged
//! and ignored.
//!
//! ## Module Organization
//!
//! ### Transport (`transport`, `relay`)
//! The session transport boundary and an in-process relay implementing it.
//!
//! ### Network (`network`, `queue`)
//! Connection identity, inbound queue, liveness tracking.
//!
//! ### Protocol (`protocol`)
//! Decoding and applying `state_sync`, `game_state` and `player_input`, and
//! the host's broadcast schedule.
//!
//! ### Game (`game`, `context`, `state`, `input`)
//! The state machine, the aggregate context it drives, player intents and
//! the throttled input sender.
//!
//! ### Presentation Helpers (`snapshot`, `autopilot`)
//! A read-only snapshot for renderers and a simple bot.
//!
//! ## Usage Example
//!
//! ```rust
//! use peer::game::Game;
//! use peer::input::Intent;
//! use peer::relay::RelayHub;
//! use peer::transport::Connector;
//! use shared::config::GameConfig;
//! use shared::logging::Logger;
//! use std::sync::Arc;
//!
//! let hub: Arc<dyn Connector> = Arc::new(RelayHub::inline());
//! let mut host = Game::new(GameConfig::default(), Some(hub), Some(1), Logger::new("host"));
//!
//! host.handle_intent(Intent::Host, 0).unwrap();
//! host.handle_intent(Intent::Confirm, 0).unwrap();
//! host.tick(3_000);
//! println!("{}", host.snapshot());
//! ```

pub mod autopilot;
pub mod context;
pub mod game;
pub mod input;
pub mod network;
pub mod protocol;
pub mod queue;
pub mod relay;
pub mod snapshot;
pub mod state;
pub mod transport;
