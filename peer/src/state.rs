//! Match phases and the legal transitions between them.

use shared::messages::ProtocolError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchState {
    #[default]
    Menu,
    MultiplayerSetup,
    Lobby,
    Countdown,
    Playing,
    Paused,
    MatchEnd,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: MatchState,
    pub to: MatchState,
}

impl MatchState {
    pub const ALL: [MatchState; 7] = [
        MatchState::Menu,
        MatchState::MultiplayerSetup,
        MatchState::Lobby,
        MatchState::Countdown,
        MatchState::Playing,
        MatchState::Paused,
        MatchState::MatchEnd,
    ];

    /// Name used in `state_sync.gameState`.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchState::Menu => "MENU",
            MatchState::MultiplayerSetup => "MULTIPLAYER_SETUP",
            MatchState::Lobby => "LOBBY",
            MatchState::Countdown => "COUNTDOWN",
            MatchState::Playing => "PLAYING",
            MatchState::Paused => "PAUSED",
            MatchState::MatchEnd => "MATCH_END",
        }
    }

    pub fn can_transition(self, to: MatchState) -> bool {
        use MatchState::*;
        matches!(
            (self, to),
            (Menu, MultiplayerSetup)
                | (Menu, Playing)
                | (MultiplayerSetup, Lobby)
                | (MultiplayerSetup, Menu)
                | (Lobby, Countdown)
                | (Lobby, Playing)
                | (Lobby, Menu)
                | (Lobby, MultiplayerSetup)
                | (Countdown, Playing)
                | (Countdown, Lobby)
                | (Playing, Paused)
                | (Playing, MatchEnd)
                | (Playing, Menu)
                | (Paused, Playing)
                | (Paused, Menu)
                | (MatchEnd, Menu)
                | (MatchEnd, Lobby)
        )
    }

    pub fn check_transition(self, to: MatchState) -> Result<(), TransitionError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownState(s.to_string()))
    }
}
