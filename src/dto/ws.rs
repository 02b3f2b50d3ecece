use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dto::state::GameSnapshot, error::ErrorCode, state::game::BonusGuessOutcome};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the game under `name`; `is_admin` claims the admin seat if it is free.
    Join {
        name: String,
        #[serde(default)]
        is_admin: bool,
    },
    /// Year guess for the current round.
    Submit {
        year: i32,
        #[serde(default)]
        bet: bool,
    },
    MovieGuess { guess: String },
    ArtistGuess { guess: String },
    /// Leave the game for good.
    Leave,
    /// Admin-only game control.
    Admin { action: AdminAction },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn from_json_str(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    StartGame,
    NextRound,
    Pause,
    Resume,
    EndGame,
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot, sent after every change.
    State(GameSnapshot),
    /// No game exists (never created, or ended by the admin).
    NoGame,
    Joined { name: String, is_admin: bool },
    SubmitAck { year: i32, bet: bool },
    BonusResult(BonusGuessOutcome),
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
        message: String,
    },
}
