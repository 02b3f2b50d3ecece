//! Pure scoring rules: accuracy bands, speed bonus, streak milestones, bets and bonus challenges.
//!
//! Nothing here holds state; every function reads the point tables from [`ScoringConfig`].

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::config::ScoringConfig;

/// Difficulty tier selecting the accuracy bands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Wide bands.
    Easy,
    /// Default bands.
    #[default]
    Normal,
    /// Narrow bands, no near tier.
    Hard,
}

impl Difficulty {
    /// Parse a difficulty name, falling back to [`Difficulty::Normal`] for anything unknown.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Normal,
        }
    }

    /// Lowercase name used in stats records and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Difficulty::parse(&raw))
    }
}

/// Result of a double-or-nothing wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    /// Positive score, doubled.
    Won,
    /// Zero score, nothing doubled.
    Lost,
}

/// How closely an artist guess matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtistMatch {
    /// Same name once trimmed and lowercased.
    Exact,
    /// One name contains the other.
    Partial,
}

/// Points for a year guess given the active difficulty.
pub fn accuracy(guess: i32, actual: i32, difficulty: Difficulty, config: &ScoringConfig) -> u32 {
    let diff = guess.abs_diff(actual);
    let tier = config.tier(difficulty);

    if diff == 0 {
        config.exact_points
    } else if tier.close_range > 0 && diff <= tier.close_range {
        tier.close_points
    } else if tier.near_range > 0 && diff <= tier.near_range {
        tier.near_points
    } else {
        0
    }
}

/// Linear bonus from `max` at an instant answer down to `1.0` at the deadline.
pub fn speed_multiplier(elapsed_secs: f64, duration_secs: f64, max: f64) -> f64 {
    if duration_secs <= 0.0 {
        return 1.0;
    }

    let ratio = (elapsed_secs / duration_secs).clamp(0.0, 1.0);
    max - (max - 1.0) * ratio
}

/// Accuracy scaled by speed, floored to whole points.
pub fn round_score(accuracy: u32, speed_multiplier: f64) -> u32 {
    (f64::from(accuracy) * speed_multiplier).floor() as u32
}

/// Milestone bonus earned when the streak lands exactly on a configured value.
pub fn streak_bonus(streak: u32, config: &ScoringConfig) -> u32 {
    config
        .streak_milestones
        .get(&streak)
        .copied()
        .unwrap_or_default()
}

/// Apply a wager to the accuracy-derived score.
pub fn apply_bet(round_score: u32, bet: bool) -> (u32, Option<BetOutcome>) {
    match (bet, round_score) {
        (false, score) => (score, None),
        (true, 0) => (0, Some(BetOutcome::Lost)),
        (true, score) => (score * 2, Some(BetOutcome::Won)),
    }
}

/// Score an artist guess with case-insensitive, whitespace-trimmed comparison.
pub fn artist_match(
    guess: &str,
    actual: &str,
    config: &ScoringConfig,
) -> (u32, Option<ArtistMatch>) {
    let guess = guess.trim().to_lowercase();
    let actual = actual.trim().to_lowercase();

    if guess.is_empty() || actual.is_empty() {
        return (0, None);
    }

    if guess == actual {
        (config.artist_exact_points, Some(ArtistMatch::Exact))
    } else if actual.contains(&guess) || guess.contains(&actual) {
        (config.artist_partial_points, Some(ArtistMatch::Partial))
    } else {
        (0, None)
    }
}

/// Movie bonus for the `rank`-th correct arrival (1-based).
pub fn movie_bonus_by_rank(rank: usize, config: &ScoringConfig) -> u32 {
    rank.checked_sub(1)
        .and_then(|index| config.movie_bonus_tiers.get(index))
        .copied()
        .unwrap_or_default()
}

/// Human-readable distance between a guess and the release year.
pub fn years_off_text(diff: u32) -> String {
    match diff {
        0 => "Exact!".into(),
        1 => "1 year off".into(),
        n => format!("{n} years off"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn accuracy_bands_for_normal() {
        let cfg = config();
        assert_eq!(accuracy(1985, 1985, Difficulty::Normal, &cfg), 10);
        assert_eq!(accuracy(1988, 1985, Difficulty::Normal, &cfg), 5);
        assert_eq!(accuracy(1989, 1985, Difficulty::Normal, &cfg), 1);
        assert_eq!(accuracy(1980, 1985, Difficulty::Normal, &cfg), 1);
        assert_eq!(accuracy(1991, 1985, Difficulty::Normal, &cfg), 0);
    }

    #[test]
    fn accuracy_bands_for_easy_and_hard() {
        let cfg = config();
        assert_eq!(accuracy(1992, 1985, Difficulty::Easy, &cfg), 5);
        assert_eq!(accuracy(1993, 1985, Difficulty::Easy, &cfg), 1);
        assert_eq!(accuracy(1996, 1985, Difficulty::Easy, &cfg), 0);

        assert_eq!(accuracy(1987, 1985, Difficulty::Hard, &cfg), 3);
        assert_eq!(accuracy(1988, 1985, Difficulty::Hard, &cfg), 0);
    }

    #[test]
    fn unknown_difficulty_falls_back_to_normal() {
        let parsed: Difficulty = serde_json::from_str("\"nightmare\"").unwrap();
        assert_eq!(parsed, Difficulty::Normal);
        assert_eq!(Difficulty::parse(" HARD "), Difficulty::Hard);
    }

    #[test]
    fn speed_multiplier_is_linear_and_clamped() {
        assert_eq!(speed_multiplier(0.0, 30.0, 1.5), 1.5);
        assert_eq!(speed_multiplier(30.0, 30.0, 1.5), 1.0);
        assert_eq!(speed_multiplier(15.0, 30.0, 1.5), 1.25);
        assert_eq!(speed_multiplier(-4.0, 30.0, 1.5), 1.5);
        assert_eq!(speed_multiplier(45.0, 30.0, 1.5), 1.0);
        assert_eq!(speed_multiplier(12.0, 0.0, 1.5), 1.0);

        let mut previous = f64::MAX;
        for elapsed in 0..=30 {
            let value = speed_multiplier(f64::from(elapsed), 30.0, 2.0);
            assert!(value <= previous);
            previous = value;
        }
    }

    #[test]
    fn round_score_floors() {
        assert_eq!(round_score(10, 1.5), 15);
        assert_eq!(round_score(5, 1.25), 6);
        assert_eq!(round_score(1, 1.99), 1);
    }

    #[test]
    fn streak_bonus_only_on_milestones() {
        let cfg = config();
        assert_eq!(streak_bonus(1, &cfg), 0);
        assert_eq!(streak_bonus(3, &cfg), 20);
        assert_eq!(streak_bonus(4, &cfg), 0);
        assert_eq!(streak_bonus(5, &cfg), 50);
        assert_eq!(streak_bonus(10, &cfg), 100);
    }

    #[test]
    fn bet_is_double_or_nothing() {
        assert_eq!(apply_bet(10, true), (20, Some(BetOutcome::Won)));
        assert_eq!(apply_bet(0, true), (0, Some(BetOutcome::Lost)));
        assert_eq!(apply_bet(7, false), (7, None));
    }

    #[test]
    fn artist_matching() {
        let cfg = config();
        assert_eq!(
            artist_match("  queen ", "Queen", &cfg),
            (10, Some(ArtistMatch::Exact))
        );
        assert_eq!(
            artist_match("Bowie", "David Bowie", &cfg),
            (5, Some(ArtistMatch::Partial))
        );
        assert_eq!(artist_match("Blur", "Oasis", &cfg), (0, None));
        assert_eq!(artist_match("   ", "Oasis", &cfg), (0, None));
    }

    #[test]
    fn movie_bonus_tiers_by_arrival() {
        let cfg = config();
        assert_eq!(movie_bonus_by_rank(1, &cfg), 5);
        assert_eq!(movie_bonus_by_rank(2, &cfg), 3);
        assert_eq!(movie_bonus_by_rank(3, &cfg), 1);
        assert_eq!(movie_bonus_by_rank(4, &cfg), 0);
        assert_eq!(movie_bonus_by_rank(0, &cfg), 0);
    }

    #[test]
    fn years_off_phrasing() {
        assert_eq!(years_off_text(0), "Exact!");
        assert_eq!(years_off_text(1), "1 year off");
        assert_eq!(years_off_text(12), "12 years off");
    }
}
