use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dao::models::PlaylistStats;

/// Finished game measured against every earlier game.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GameComparison {
    /// Points per player per round in this game.
    pub avg_score: f64,
    /// Weighted average over all earlier games.
    pub all_time_avg: f64,
    pub difference: f64,
    pub is_new_record: bool,
    pub is_first_game: bool,
    pub is_above_average: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MotivationalMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    First,
    Record,
    Strong,
    Above,
    Close,
}

/// Short line shown on the final screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MotivationalMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

/// Headline numbers across all recorded games.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatsSummary {
    pub games_played: u32,
    pub highest_avg_score: f64,
    pub all_time_avg: f64,
}

/// Payload of `GET /api/stats`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsOverview {
    #[serde(flatten)]
    pub summary: StatsSummary,
    pub playlists: BTreeMap<String, PlaylistStats>,
}

/// Star rating of how hard a song has proven to be.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SongDifficulty {
    /// 1 (easy) to 4 (extreme).
    pub stars: u8,
    pub label: String,
    /// Share of guesses within three years, in percent.
    pub accuracy: f64,
    pub times_played: u32,
}

/// Query of `GET /api/stats/history`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of games returned (default 10).
    pub limit: Option<usize>,
}
