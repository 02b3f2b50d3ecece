use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_not_blank, state::playlist::Song};

/// Whole statistics file as persisted on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsDocument {
    /// Format version of the document.
    pub version: u32,
    /// Finished games, oldest first.
    pub games: Vec<GameRecord>,
    /// Aggregates keyed by playlist name.
    pub playlists: BTreeMap<String, PlaylistStats>,
    pub all_time: AllTimeStats,
    /// Guess accuracy keyed by sanitized song URI.
    pub songs: BTreeMap<String, SongStats>,
}

/// One finished game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct GameRecord {
    /// Short random identifier.
    pub id: String,
    /// RFC 3339 timestamp of the end of the game.
    pub date: String,
    pub playlist: String,
    pub rounds: usize,
    pub player_count: usize,
    pub winner: Option<String>,
    pub winner_score: u32,
    /// Points per player per round, rounded to two decimals.
    pub avg_score_per_round: f64,
    pub total_points: u64,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Play counts for a single playlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(default)]
pub struct PlaylistStats {
    pub times_played: u32,
    pub total_rounds: u64,
    /// Average of `avg_score_per_round` over every game of this playlist.
    pub avg_score_per_round: f64,
}

/// Records across every game ever played.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(default)]
pub struct AllTimeStats {
    pub games_played: u32,
    pub highest_avg_score: f64,
    pub highest_avg_game_id: Option<String>,
}

/// Accuracy history for one song.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SongStats {
    pub times_played: u32,
    /// Guesses within three years of the release year.
    pub correct_guesses: u32,
    pub total_guesses: u32,
    pub total_years_off: u64,
}

/// Playlist file as found in the playlist directory.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaylistFile {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(length(min = 1, message = "playlist must contain at least one song"), nested)]
    pub songs: Vec<SongEntry>,
}

/// Song record inside a playlist file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SongEntry {
    pub year: i32,
    #[validate(custom(function = "validate_not_blank"))]
    pub uri: String,
    #[serde(default)]
    pub fun_fact: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub movie: Option<String>,
    #[serde(default)]
    pub movie_choices: Vec<String>,
}

impl From<SongEntry> for Song {
    fn from(entry: SongEntry) -> Self {
        Song {
            year: entry.year,
            uri: entry.uri.trim().to_owned(),
            fun_fact: entry.fun_fact,
            artist: entry.artist,
            movie: entry.movie,
            movie_choices: entry.movie_choices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_document_tolerates_missing_sections() {
        let doc: StatsDocument = serde_json::from_str(r#"{"version": 1, "games": []}"#).unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.playlists.is_empty());
        assert_eq!(doc.all_time.games_played, 0);
    }

    #[test]
    fn playlist_file_validation() {
        let valid: PlaylistFile = serde_json::from_str(
            r#"{"name": "80s", "songs": [{"year": 1984, "uri": "spotify:track:1"}]}"#,
        )
        .unwrap();
        assert!(valid.validate().is_ok());

        let empty: PlaylistFile = serde_json::from_str(r#"{"name": " ", "songs": []}"#).unwrap();
        let errors = empty.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("songs"));

        let blank_uri: PlaylistFile =
            serde_json::from_str(r#"{"name": "x", "songs": [{"year": 1984, "uri": ""}]}"#)
                .unwrap();
        assert!(blank_uri.validate().is_err());
    }
}
