use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::GamePhase;

/// Publicly visible game phase exposed to clients (REST/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisibleGamePhase {
    /// Waiting for players.
    Lobby,
    /// Submission window open.
    Playing,
    /// Showing the answer and round results.
    Reveal,
    /// Gameplay suspended.
    Paused,
    /// Final scoreboard.
    End,
}

impl From<&GamePhase> for VisibleGamePhase {
    fn from(value: &GamePhase) -> Self {
        match value {
            GamePhase::Lobby => VisibleGamePhase::Lobby,
            GamePhase::Playing => VisibleGamePhase::Playing,
            GamePhase::Reveal => VisibleGamePhase::Reveal,
            GamePhase::Paused { .. } => VisibleGamePhase::Paused,
            GamePhase::End => VisibleGamePhase::End,
        }
    }
}
