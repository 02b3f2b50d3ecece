use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// High-level phases a game session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Players are joining; no round has started.
    Lobby,
    /// A round's submission window is open.
    Playing,
    /// The round has been scored and answers are visible.
    Reveal,
    /// Gameplay is suspended; `resume_to` remembers where to go back.
    Paused {
        /// Phase restored on resume.
        resume_to: ResumePhase,
        /// Why gameplay was suspended.
        reason: PauseReason,
    },
    /// The catalog is exhausted and final scores are shown.
    End,
}

/// Phases that can be paused and later restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePhase {
    /// Paused mid submission window.
    Playing,
    /// Paused while showing results.
    Reveal,
}

impl From<ResumePhase> for GamePhase {
    fn from(value: ResumePhase) -> Self {
        match value {
            ResumePhase::Playing => GamePhase::Playing,
            ResumePhase::Reveal => GamePhase::Reveal,
        }
    }
}

/// Represents why the game entered a paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// The admin paused gameplay.
    Manual,
    /// The admin's connection dropped mid-game.
    AdminDisconnected,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// A round opened (first round from the lobby, later rounds from reveal).
    RoundStarted,
    /// The submission window closed and scores were applied.
    RoundEnded,
    /// Suspend gameplay.
    Pause(PauseReason),
    /// Return to the phase remembered at pause time.
    Resume,
    /// No song left to play.
    CatalogExhausted,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Phase table for a game session.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    version: u64,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Lobby,
            version: 0,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Number of transitions applied so far; lets clients discard stale snapshots.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Validate and apply an event, returning the new phase.
    pub fn apply(&mut self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Whether `event` would be accepted from the current phase.
    pub fn can_apply(&self, event: GameEvent) -> bool {
        self.compute_transition(event).is_ok()
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (GamePhase::Lobby | GamePhase::Reveal, GameEvent::RoundStarted) => GamePhase::Playing,
            (GamePhase::Playing, GameEvent::RoundEnded) => GamePhase::Reveal,
            (GamePhase::Playing, GameEvent::Pause(reason)) => GamePhase::Paused {
                resume_to: ResumePhase::Playing,
                reason,
            },
            (GamePhase::Reveal, GameEvent::Pause(reason)) => GamePhase::Paused {
                resume_to: ResumePhase::Reveal,
                reason,
            },
            (GamePhase::Paused { resume_to, .. }, GameEvent::Resume) => resume_to.into(),
            (GamePhase::Lobby | GamePhase::Reveal, GameEvent::CatalogExhausted) => GamePhase::End,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
