//! Application-level configuration loading: game rules, scoring tables, media and storage paths.

use std::{collections::BTreeMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::scoring::Difficulty;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BEATIFY_BACK_CONFIG_PATH";
/// Artwork served when the media player does not expose any.
pub const DEFAULT_ARTWORK: &str = "/beatify/static/img/no-artwork.svg";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Public base URL used to build player join links.
    pub base_url: String,
    /// File holding the historical game statistics.
    pub stats_path: PathBuf,
    /// Directory scanned for playlist JSON files.
    pub playlist_dir: PathBuf,
    /// Round flow and roster limits.
    pub rules: GameRules,
    /// Point tables used by the scoring engine.
    pub scoring: ScoringConfig,
    /// Optional media player backend.
    pub media: Option<MediaConfig>,
    /// Shared secret required in `X-Admin-Token` on admin routes; unset leaves them open.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        difficulty = ?config.scoring.default_difficulty,
                        round_duration_s = config.rules.round_duration_secs,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            stats_path: PathBuf::from("data/stats.json"),
            playlist_dir: PathBuf::from("playlists"),
            rules: GameRules::default(),
            scoring: ScoringConfig::default(),
            media: None,
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Timing and roster rules for a game session.
pub struct GameRules {
    /// Length of the submission window.
    pub round_duration_secs: u64,
    /// Maximum roster size.
    pub max_players: usize,
    /// Minimum trimmed name length.
    pub min_name_length: usize,
    /// Maximum trimmed name length.
    pub max_name_length: usize,
    /// Connected players required before the game can start.
    pub min_players: usize,
    /// Pause between requesting playback and reading metadata back.
    pub playback_settle_ms: u64,
    /// Longest wait for a single play or metadata call before giving up on it.
    pub media_timeout_ms: u64,
    /// Smallest accepted release year.
    pub min_year: i32,
    /// Largest accepted release year.
    pub max_year: i32,
    /// Artwork used when the device reports none.
    pub default_artwork: String,
}

impl GameRules {
    /// Bound applied to each media device call made while starting a round.
    pub fn media_timeout(&self) -> Duration {
        Duration::from_millis(self.media_timeout_ms)
    }

    /// Round window in milliseconds.
    pub fn round_duration_ms(&self) -> u64 {
        self.round_duration_secs * 1_000
    }

    /// Whether a year falls inside the accepted catalog range.
    pub fn year_in_range(&self, year: i32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            max_players: 20,
            min_name_length: 1,
            max_name_length: 20,
            min_players: 2,
            playback_settle_ms: 500,
            media_timeout_ms: 5_000,
            min_year: 1900,
            max_year: 2030,
            default_artwork: DEFAULT_ARTWORK.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
/// Radius/points pairs for one difficulty tier. A zero radius disables that band.
pub struct AccuracyTier {
    /// Maximum distance (in years) still counted as close.
    pub close_range: u32,
    /// Points awarded inside the close band.
    pub close_points: u32,
    /// Maximum distance (in years) still counted as near.
    pub near_range: u32,
    /// Points awarded inside the near band.
    pub near_points: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Point tables consumed by [`crate::state::scoring`].
pub struct ScoringConfig {
    /// Difficulty used when a game does not pick one.
    pub default_difficulty: Difficulty,
    /// Points for guessing the exact year.
    pub exact_points: u32,
    /// Bands for the easy tier.
    pub easy: AccuracyTier,
    /// Bands for the normal tier.
    pub normal: AccuracyTier,
    /// Bands for the hard tier.
    pub hard: AccuracyTier,
    /// Multiplier applied to an instant submission, decaying linearly to 1.0 at the deadline.
    pub max_speed_multiplier: f64,
    /// Bonus keyed by the exact streak length that earns it.
    pub streak_milestones: BTreeMap<u32, u32>,
    /// Points for an exact artist match.
    pub artist_exact_points: u32,
    /// Points for a substring artist match.
    pub artist_partial_points: u32,
    /// Movie bonus by arrival rank (first, second, third...).
    pub movie_bonus_tiers: Vec<u32>,
}

impl ScoringConfig {
    /// Bands for the requested difficulty.
    pub fn tier(&self, difficulty: Difficulty) -> &AccuracyTier {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Normal => &self.normal,
            Difficulty::Hard => &self.hard,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_difficulty: Difficulty::Normal,
            exact_points: 10,
            easy: AccuracyTier {
                close_range: 7,
                close_points: 5,
                near_range: 10,
                near_points: 1,
            },
            normal: AccuracyTier {
                close_range: 3,
                close_points: 5,
                near_range: 5,
                near_points: 1,
            },
            hard: AccuracyTier {
                close_range: 2,
                close_points: 3,
                near_range: 0,
                near_points: 0,
            },
            max_speed_multiplier: 1.5,
            streak_milestones: BTreeMap::from([(3, 20), (5, 50), (10, 100)]),
            artist_exact_points: 10,
            artist_partial_points: 5,
            movie_bonus_tiers: vec![5, 3, 1],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
/// Home Assistant media player reached through its REST API.
pub struct MediaConfig {
    /// Base URL of the Home Assistant instance.
    pub url: String,
    /// Media player entity driven by the game.
    pub entity_id: String,
    /// Name of the environment variable holding the long-lived access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "BEATIFY_HA_TOKEN".into()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "base_url": "http://ha.local:8123", "rules": { "round_duration_secs": 45 } }"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://ha.local:8123");
        assert_eq!(config.rules.round_duration_secs, 45);
        assert_eq!(config.rules.max_players, 20);
        assert_eq!(config.scoring.exact_points, 10);
        assert!(config.media.is_none());
    }

    #[test]
    fn streak_milestones_parse_from_string_keys() {
        let config: ScoringConfig =
            serde_json::from_str(r#"{ "streak_milestones": { "2": 5, "4": 15 } }"#).unwrap();

        assert_eq!(config.streak_milestones.get(&2), Some(&5));
        assert_eq!(config.streak_milestones.get(&3), None);
    }

    #[test]
    fn media_token_env_has_default() {
        let media: MediaConfig = serde_json::from_str(
            r#"{ "url": "http://ha.local:8123", "entity_id": "media_player.living_room" }"#,
        )
        .unwrap();

        assert_eq!(media.token_env, "BEATIFY_HA_TOKEN");
    }
}
