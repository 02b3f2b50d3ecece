use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Expected, user-facing rejections returned by game operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Name is empty or too long once trimmed.
    #[error("name must be between the configured length bounds")]
    NameInvalid,
    /// Another player already uses this name (case-insensitive).
    #[error("name already taken")]
    NameTaken,
    /// Roster is at capacity.
    #[error("game is full")]
    GameFull,
    /// The game reached its final scoreboard.
    #[error("game has ended")]
    GameEnded,
    /// The game already left the lobby.
    #[error("game already started")]
    GameAlreadyStarted,
    /// Too few connected players to start.
    #[error("not enough connected players")]
    NotEnoughPlayers,
    /// No game has been created.
    #[error("no active game")]
    NoActiveGame,
    /// Submissions are only accepted while a round is playing.
    #[error("round is not accepting submissions")]
    RoundNotActive,
    /// The submission arrived at or after the round deadline.
    #[error("round deadline has passed")]
    RoundExpired,
    /// The player already answered this round.
    #[error("already submitted this round")]
    AlreadySubmitted,
    /// Year outside the accepted catalog bounds.
    #[error("year is out of range")]
    InvalidYear,
    /// Admin action from a non-admin player.
    #[error("admin privileges required")]
    NotAdmin,
    /// Action requires joining the game first.
    #[error("join the game first")]
    NotJoined,
    /// The connection already plays under another name.
    #[error("already joined on this connection")]
    AlreadyJoined,
}

/// Failures raised by [`crate::state::game::GameSession`].
#[derive(Debug, Error)]
pub enum GameError {
    /// Expected validation failure the caller should render.
    #[error(transparent)]
    Rejected(#[from] ErrorCode),
    /// Movie guess submitted while no movie challenge is active.
    #[error("no movie challenge is active this round")]
    NoMovieChallenge,
    /// Artist guess submitted while no artist challenge is active.
    #[error("no artist challenge is active this round")]
    NoArtistChallenge,
    /// Name does not belong to the roster.
    #[error("unknown player `{0}`")]
    UnknownPlayer(String),
    /// Phase change not allowed from the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl GameError {
    /// Whether the failure signals a programming error upstream rather than bad user input.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, GameError::Rejected(_))
    }

    /// Code to surface to the client, when the failure is an expected rejection.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            GameError::Rejected(code) => Some(*code),
            _ => None,
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Game rules rejected the request.
    #[error("rejected: {0}")]
    Rejected(ErrorCode),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ErrorCode> for ServiceError {
    fn from(code: ErrorCode) -> Self {
        ServiceError::Rejected(code)
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::Rejected(code) => ServiceError::Rejected(code),
            GameError::UnknownPlayer(name) => ServiceError::NotFound(format!("player `{name}`")),
            other => ServiceError::InvalidState(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Missing or wrong admin token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Game rules rejected the request with a client-facing code.
    #[error("{0}")]
    Rejected(ErrorCode),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Rejected(code) => AppError::Rejected(code),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize, ToSchema)]
/// JSON body returned for every failed HTTP request.
pub struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, None),
            AppError::Rejected(code) => (StatusCode::CONFLICT, Some(*code)),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            code,
        });

        (status, payload).into_response()
    }
}
