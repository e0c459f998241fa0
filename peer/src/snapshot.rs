//! Read-only view of a peer for renderers and logs.

use crate::context::GameContext;
use serde::Serialize;
use shared::{Color, Position};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub slot: usize,
    pub peer_id: String,
    pub color: Color,
    pub alive: bool,
    pub paused: bool,
    pub score: i32,
    pub body: Vec<Position>,
    pub is_me: bool,
}

impl PlayerView {
    pub fn length(&self) -> usize {
        self.body.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub state: String,
    pub is_host: bool,
    pub session_id: Option<String>,
    pub remaining_seconds: u64,
    pub paused: bool,
    pub paused_by: Option<String>,
    pub food: Position,
    pub players: Vec<PlayerView>,
    pub winner: Option<usize>,
    pub available_sessions: Vec<String>,
    pub connection_lost: bool,
}

impl GameSnapshot {
    pub fn capture(ctx: &GameContext) -> Self {
        let players = ctx
            .roster
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .filter_map(|(index, slot)| {
                let snake = slot.snake.as_ref()?;
                Some(PlayerView {
                    slot: index,
                    peer_id: slot.peer_id.clone(),
                    color: snake.color(),
                    alive: snake.is_alive(),
                    paused: slot.paused,
                    score: snake.score(),
                    body: snake.body().iter().copied().collect(),
                    is_me: ctx.my_index == Some(index),
                })
            })
            .collect();

        Self {
            state: ctx.state().as_str().to_string(),
            is_host: ctx.net.is_host(),
            session_id: ctx.net.session_id().map(str::to_string),
            remaining_seconds: ctx.clock.last_remaining(),
            paused: ctx.clock.is_paused(),
            paused_by: ctx.clock.pausing_peer().map(str::to_string),
            food: ctx.food.position(),
            players,
            winner: ctx.clock.winner(),
            available_sessions: ctx.net.available_sessions().to_vec(),
            connection_lost: ctx.net.connection_lost(),
        }
    }

    pub fn player(&self, slot: usize) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.slot == slot)
    }
}

/// One-line HUD, e.g. `[PLAYING] 1:54 | P1* len 5 score 20 | food (3, 4)`
impl fmt::Display for GameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}:{:02}",
            self.state,
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )?;
        if self.paused {
            write!(f, " PAUSED")?;
        }
        for player in &self.players {
            write!(
                f,
                " | P{}{} len {} score {}",
                player.slot + 1,
                if player.is_me { "*" } else { "" },
                player.length(),
                player.score
            )?;
        }
        write!(f, " | food {}", self.food)?;
        if let Some(winner) = self.winner {
            write!(f, " | winner P{}", winner + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::GameConfig;
    use shared::logging::Logger;

    #[test]
    fn test_capture_and_hud() {
        let mut ctx = GameContext::new(GameConfig::default(), Some(3), Logger::new("snap"));
        ctx.roster.add_participant("local_player");
        ctx.roster.add_participant("bot");
        ctx.my_index = Some(0);
        ctx.roster.snake_mut(1).unwrap().set_score(30);
        ctx.clock.set_winner(Some(1));

        let snapshot = GameSnapshot::capture(&ctx);
        assert_eq!(snapshot.players.len(), 2);
        assert!(snapshot.player(0).unwrap().is_me);
        assert_eq!(snapshot.player(1).unwrap().score, 30);
        assert_eq!(
            snapshot.to_string(),
            "[MENU] 2:00 | P1* len 3 score 0 | P2 len 3 score 30 | food (0, 0) | winner P2"
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["players"][1]["peerId"], "bot");
        assert_eq!(json["remainingSeconds"], 120);
    }
}
