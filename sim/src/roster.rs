//! Participant slot management for a match
//!
//! This module owns the four participant slots of a process, including:
//! - Slot assignment on join (first free slot, deterministic spawn cell)
//! - Slot release on leave and full reset when returning to the menu
//! - Roster reconciliation against the host's slot-indexed peer list
//! - Per-slot pause flags and input send timestamps
//!
//! Exactly [`MAX_PLAYERS`] slots exist for the lifetime of the roster; only a
//! slot's snake is created and destroyed.

use crate::snake::Snake;
use shared::{spawn_position, Position, MAX_PLAYERS, PLAYER_COLORS};

/// One participant seat and the snake that belongs to it
#[derive(Debug, Clone, Default)]
pub struct ParticipantSlot {
    /// Present while a peer occupies the slot
    pub snake: Option<Snake>,
    /// Transport-assigned peer identifier, empty when free
    pub peer_id: String,
    pub active: bool,
    pub paused: bool,
    /// Last time a direction intent for this slot went out (ms)
    pub last_send_ms: u64,
}

impl ParticipantSlot {
    fn occupy(&mut self, peer_id: &str, snake: Snake) {
        self.snake = Some(snake);
        self.peer_id = peer_id.to_string();
        self.active = true;
        self.paused = false;
        self.last_send_ms = 0;
    }

    fn release(&mut self) {
        *self = ParticipantSlot::default();
    }

    pub fn is_occupied_by(&self, peer_id: &str) -> bool {
        self.active && self.peer_id == peer_id
    }
}

/// The fixed set of participant slots
///
/// Slot indices are shared across peers: the host assigns them in join order
/// and announces them in its slot-indexed roster, and every peer aligns its
/// local slots to that list.
#[derive(Debug, Clone)]
pub struct Roster {
    slots: [ParticipantSlot; MAX_PLAYERS],
    width: i32,
    height: i32,
}

impl Roster {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            slots: std::array::from_fn(|_| ParticipantSlot::default()),
            width,
            height,
        }
    }

    /// Assigns the first free slot to `peer_id`
    ///
    /// Returns the slot index, or None when all slots are taken. A peer that
    /// already holds a slot keeps it.
    pub fn add_participant(&mut self, peer_id: &str) -> Option<usize> {
        if let Some(existing) = self.find_by_peer(peer_id) {
            return Some(existing);
        }
        let slot = self.slots.iter().position(|slot| !slot.active)?;
        let snake = self.fresh_snake(slot);
        self.slots[slot].occupy(peer_id, snake);
        Some(slot)
    }

    /// Frees the slot held by `peer_id` and returns its index
    pub fn remove_participant(&mut self, peer_id: &str) -> Option<usize> {
        let slot = self.find_by_peer(peer_id)?;
        self.slots[slot].release();
        Some(slot)
    }

    pub fn find_by_peer(&self, peer_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_occupied_by(peer_id))
    }

    /// Aligns local slots with a slot-indexed roster from the host
    ///
    /// Each non-empty entry ends up at its announced index. A peer found at a
    /// different index is moved there; a local occupant in the way is moved to
    /// the next free slot. Returns the peer ids that had no slot before.
    pub fn reconcile(&mut self, announced: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for (index, peer_id) in announced.iter().enumerate().take(MAX_PLAYERS) {
            if peer_id.is_empty() || self.slots[index].is_occupied_by(peer_id) {
                continue;
            }

            let displaced = if self.slots[index].active {
                Some(self.slots[index].peer_id.clone())
            } else {
                None
            };

            match self.find_by_peer(peer_id) {
                Some(current) => {
                    self.slots[current].release();
                }
                None => added.push(peer_id.clone()),
            }
            self.slots[index].release();
            let snake = self.fresh_snake(index);
            self.slots[index].occupy(peer_id, snake);

            if let Some(displaced) = displaced {
                if displaced != *peer_id {
                    self.add_participant(&displaced);
                }
            }
        }
        added
    }

    /// Releases every slot
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.release();
        }
    }

    /// Gives every active participant a fresh snake at its spawn cell
    pub fn reset_to_spawns(&mut self) {
        for index in 0..MAX_PLAYERS {
            if self.slots[index].active {
                let snake = self.fresh_snake(index);
                self.slots[index].snake = Some(snake);
                self.slots[index].paused = false;
            }
        }
    }

    pub fn set_all_paused(&mut self, paused: bool) {
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.paused = paused;
        }
    }

    pub fn slot(&self, index: usize) -> Option<&ParticipantSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ParticipantSlot> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[ParticipantSlot; MAX_PLAYERS] {
        &self.slots
    }

    pub fn snake(&self, index: usize) -> Option<&Snake> {
        self.slots
            .get(index)
            .filter(|slot| slot.active)
            .and_then(|slot| slot.snake.as_ref())
    }

    pub fn snake_mut(&mut self, index: usize) -> Option<&mut Snake> {
        self.slots
            .get_mut(index)
            .filter(|slot| slot.active)
            .and_then(|slot| slot.snake.as_mut())
    }

    /// Active slots that currently own a snake
    pub fn active_snakes(&self) -> impl Iterator<Item = (usize, &Snake)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .filter_map(|(index, slot)| slot.snake.as_ref().map(|snake| (index, snake)))
    }

    /// Active slots whose snake is alive; these make up the collision grid
    pub fn live_snakes(&self) -> impl Iterator<Item = (usize, &Snake)> {
        self.active_snakes().filter(|(_, snake)| snake.is_alive())
    }

    /// Slot-indexed peer ids, empty strings for free slots
    pub fn peer_ids(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| {
                if slot.active {
                    slot.peer_id.clone()
                } else {
                    String::new()
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == MAX_PLAYERS
    }

    pub fn spawn_cell(&self, index: usize) -> Position {
        spawn_position(index, self.width, self.height)
    }

    fn fresh_snake(&self, index: usize) -> Snake {
        Snake::new(PLAYER_COLORS[index % MAX_PLAYERS], self.spawn_cell(index))
    }
}
