//! Broadcast-ready snapshots of the game session.

use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::{
    dto::{
        phase::VisibleGamePhase,
        stats::{GameComparison, SongDifficulty},
    },
    state::{
        challenge::{ChallengeKind, WrongGuess},
        leaderboard::{FinalLeaderboardEntry, LeaderboardEntry},
        scoring::{ArtistMatch, BetOutcome, Difficulty},
        state_machine::PauseReason,
    },
};

/// Phase-dependent view of the game. Fields absent for a phase are omitted.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSnapshot {
    pub game_id: String,
    pub phase: VisibleGamePhase,
    /// Increments on every phase change.
    pub version: u64,
    pub player_count: usize,
    pub players: Vec<PlayerSummary>,
    pub join_url: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub round: Option<usize>,
    pub total_rounds: Option<usize>,
    /// Epoch milliseconds; submissions at or after this instant are rejected.
    pub deadline: Option<u64>,
    pub last_round: Option<bool>,
    pub songs_remaining: Option<usize>,
    pub song: Option<SongView>,
    pub challenge: Option<ChallengeView>,
    pub round_results: Option<Vec<RoundResult>>,
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
    pub pause_reason: Option<PauseReason>,
    pub winner: Option<Winner>,
    pub final_leaderboard: Option<Vec<FinalLeaderboardEntry>>,
    pub game_stats: Option<GameStats>,
    pub superlatives: Option<Vec<Superlative>>,
    /// How the finished game compares with history.
    pub comparison: Option<GameComparison>,
}

/// Roster entry shown in every phase.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub name: String,
    pub score: u32,
    pub streak: u32,
    pub connected: bool,
    pub is_admin: bool,
    pub joined_late: bool,
    /// Whether the year guess is in for the current round.
    pub submitted: bool,
}

/// Song shown to players. Answer fields stay empty until the reveal.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SongView {
    pub artist: String,
    pub title: String,
    pub album_art: String,
    pub year: Option<i32>,
    pub fun_fact: Option<String>,
    pub uri: Option<String>,
    /// Historical difficulty of this song, once it has been played often enough.
    pub song_difficulty: Option<SongDifficulty>,
}

/// Bonus question; the answer and results are only present on reveal.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChallengeView {
    pub kind: ChallengeKind,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub winners: Option<Vec<ChallengeWinner>>,
    pub wrong_guesses: Option<Vec<WrongGuess>>,
}

/// Player who answered the bonus question correctly.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChallengeWinner {
    pub name: String,
    pub elapsed_secs: f64,
    pub bonus: u32,
}

/// Per-player breakdown of the round just scored.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundResult {
    pub name: String,
    pub guess: Option<i32>,
    pub years_off: Option<u32>,
    pub years_off_text: Option<String>,
    pub base_score: u32,
    pub speed_multiplier: f64,
    pub round_score: u32,
    pub bet: bool,
    pub bet_outcome: Option<BetOutcome>,
    pub streak: u32,
    pub previous_streak: u32,
    pub streak_bonus: u32,
    pub movie_bonus: u32,
    pub artist_bonus: u32,
    pub artist_match: Option<ArtistMatch>,
    pub missed_round: bool,
    /// Cumulative score after this round.
    pub score: u32,
}

/// Highest cumulative score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Winner {
    pub name: String,
    pub score: u32,
}

/// Aggregate numbers for the finished game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameStats {
    pub rounds_played: usize,
    pub total_rounds: usize,
    pub player_count: usize,
}

/// End-of-game award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuperlativeKind {
    /// Most movie bonus points.
    FilmBuff,
    /// Most artist bonus points.
    ArtistAce,
    /// Longest streak.
    StreakMaster,
    /// Most bets won.
    HighRoller,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Superlative {
    pub award: SuperlativeKind,
    pub name: String,
    pub value: u32,
}
