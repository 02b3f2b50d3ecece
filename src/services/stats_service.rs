//! Historical statistics: per-game records, all-time averages and per-song difficulty.
//!
//! Everything here is best effort: storage failures are logged and the game carries on.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        StatsStore,
        models::{GameRecord, PlaylistStats, SongStats, StatsDocument},
    },
    dto::{
        format_system_time,
        stats::{
            GameComparison, MessageKind, MotivationalMessage, SongDifficulty, StatsOverview,
            StatsSummary,
        },
    },
    state::game::{GameSummary, RoundOutcome},
};

/// Guesses at most this many years off count as correct for difficulty purposes.
const CORRECT_GUESS_THRESHOLD: u32 = 3;
/// Plays required before a difficulty rating is shown.
const MIN_PLAYS_FOR_DIFFICULTY: u32 = 3;
/// Accuracy floor (percent) for each star rating, easiest first.
const DIFFICULTY_THRESHOLDS: [(f64, u8, &str); 3] =
    [(70.0, 1, "easy"), (50.0, 2, "medium"), (30.0, 3, "hard")];
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Document key for a song URI.
fn song_key(uri: &str) -> String {
    uri.replace([':', '/'], "_")
}

/// Weighted average score per player-round over every recorded game.
fn all_time_avg(document: &StatsDocument) -> f64 {
    let (weighted, weight) = document
        .games
        .iter()
        .fold((0.0, 0u64), |(weighted, weight), game| {
            let w = (game.rounds * game.player_count) as u64;
            (weighted + game.avg_score_per_round * w as f64, weight + w)
        });

    if weight == 0 {
        0.0
    } else {
        weighted / weight as f64
    }
}

/// Compare `avg_score` against the history in `document`.
fn compare(document: &StatsDocument, avg_score: f64) -> GameComparison {
    let history_avg = all_time_avg(document);
    let is_first_game = document.all_time.games_played == 0;
    let difference = if is_first_game {
        0.0
    } else {
        avg_score - history_avg
    };

    GameComparison {
        avg_score: round_to(avg_score, 2),
        all_time_avg: round_to(history_avg, 2),
        difference: round_to(difference, 2),
        is_new_record: !is_first_game && avg_score > document.all_time.highest_avg_score,
        is_first_game,
        is_above_average: !is_first_game && difference > 0.0,
        message: None,
    }
}

/// Pick the line to show for a comparison; nothing when well below average.
pub fn motivational_message(comparison: &GameComparison) -> Option<MotivationalMessage> {
    let diff = comparison.difference;
    let (kind, message) = if comparison.is_first_game {
        (MessageKind::First, "First game! Setting the benchmark".to_owned())
    } else if comparison.is_new_record {
        (MessageKind::Record, "New Record! Highest scoring game ever!".to_owned())
    } else if diff > 5.0 {
        (MessageKind::Strong, format!("Excellent! {diff:.1} pts above average"))
    } else if diff > 0.0 {
        (MessageKind::Above, format!("Strong game! {diff:.1} pts above average"))
    } else if diff > -5.0 {
        (
            MessageKind::Close,
            format!("Close to average! Just {:.1} pts below", diff.abs()),
        )
    } else {
        return None;
    };

    Some(MotivationalMessage { kind, message })
}

fn difficulty(stats: &SongStats) -> Option<SongDifficulty> {
    if stats.times_played < MIN_PLAYS_FOR_DIFFICULTY || stats.total_guesses == 0 {
        return None;
    }

    let accuracy = f64::from(stats.correct_guesses) / f64::from(stats.total_guesses) * 100.0;
    let (stars, label) = DIFFICULTY_THRESHOLDS
        .iter()
        .find(|(threshold, _, _)| accuracy >= *threshold)
        .map(|(_, stars, label)| (*stars, *label))
        .unwrap_or((4, "extreme"));

    Some(SongDifficulty {
        stars,
        label: label.to_owned(),
        accuracy: round_to(accuracy, 1),
        times_played: stats.times_played,
    })
}

/// Reads and updates the statistics document through a [`StatsStore`].
pub struct StatsService {
    store: Arc<dyn StatsStore>,
    document: Mutex<Option<StatsDocument>>,
    /// Cleared when the stored document could not be read; it is then never overwritten.
    persist: AtomicBool,
}

impl StatsService {
    /// Service over `store`; the document is loaded on first use.
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            document: Mutex::new(None),
            persist: AtomicBool::new(true),
        }
    }

    /// Run `f` against the cached document, loading it on first use.
    async fn with_document<T>(&self, f: impl FnOnce(&StatsDocument) -> T) -> T {
        let mut guard = self.document.lock().await;
        let document = self.ensure_loaded(&mut guard).await;
        f(document)
    }

    /// Mutate the cached document with `f` and write it back.
    async fn update<T>(&self, f: impl FnOnce(&mut StatsDocument) -> T) -> T {
        let mut guard = self.document.lock().await;
        let document = self.ensure_loaded(&mut guard).await;
        let result = f(document);

        if !self.persist.load(Ordering::Relaxed) {
            debug!("statistics kept in memory; stored document was unreadable");
            return result;
        }
        if let Err(err) = self.store.save(document.clone()).await {
            warn!(error = %err, "failed to persist statistics");
        }
        result
    }

    async fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<StatsDocument>,
    ) -> &'a mut StatsDocument {
        if slot.is_none() {
            let loaded = match self.store.load().await {
                Ok(document) => document,
                Err(err) => {
                    warn!(
                        error = %err,
                        "failed to load statistics; recording in memory only"
                    );
                    self.persist.store(false, Ordering::Relaxed);
                    StatsDocument {
                        version: 1,
                        ..StatsDocument::default()
                    }
                }
            };
            *slot = Some(loaded);
        }
        slot.get_or_insert_with(StatsDocument::default)
    }

    /// Record a finished game and return how it compares with earlier ones.
    ///
    /// Games without players are not recorded.
    pub async fn record_game(&self, summary: &GameSummary) -> GameComparison {
        if summary.player_count == 0 {
            debug!("skipping statistics for a game without players");
            let mut comparison = self.with_document(|document| compare(document, 0.0)).await;
            comparison.message = motivational_message(&comparison);
            return comparison;
        }

        let weight = summary.rounds * summary.player_count;
        let avg = if weight == 0 {
            0.0
        } else {
            summary.total_points as f64 / weight as f64
        };

        let game_id = Uuid::new_v4().simple().to_string()[..8].to_owned();
        let record = GameRecord {
            id: game_id.clone(),
            date: format_system_time(SystemTime::now()),
            playlist: summary.playlist.clone(),
            rounds: summary.rounds,
            player_count: summary.player_count,
            winner: summary.winner.clone(),
            winner_score: summary.winner_score,
            avg_score_per_round: round_to(avg, 2),
            total_points: summary.total_points,
            difficulty: Some(summary.difficulty.as_str().to_owned()),
        };

        let mut comparison = self
            .update(move |document| {
                let mut comparison = compare(document, avg);

                let playlist = document
                    .playlists
                    .entry(record.playlist.clone())
                    .or_insert_with(PlaylistStats::default);
                let previous = f64::from(playlist.times_played);
                playlist.avg_score_per_round = round_to(
                    (playlist.avg_score_per_round * previous + record.avg_score_per_round)
                        / (previous + 1.0),
                    2,
                );
                playlist.times_played += 1;
                playlist.total_rounds += record.rounds as u64;

                let all_time = &mut document.all_time;
                all_time.games_played += 1;
                if avg > all_time.highest_avg_score {
                    all_time.highest_avg_score = round_to(avg, 2);
                    all_time.highest_avg_game_id = Some(record.id.clone());
                    comparison.is_new_record = true;
                }

                document.games.push(record);
                comparison
            })
            .await;

        comparison.message = motivational_message(&comparison);

        info!(
            game_id = %game_id,
            avg_score = comparison.avg_score,
            players = summary.player_count,
            rounds = summary.rounds,
            "recorded game statistics"
        );
        comparison
    }

    /// Fold one round's guesses into the song's accuracy history.
    pub async fn record_song_result(&self, outcome: &RoundOutcome) {
        let key = song_key(&outcome.song_uri);
        self.update(|document| {
            let song = document.songs.entry(key.clone()).or_default();
            song.times_played += 1;

            for result in outcome.results.iter().filter(|r| r.submitted) {
                let years_off = result.years_off.unwrap_or_default();
                song.total_guesses += 1;
                song.total_years_off += u64::from(years_off);
                if years_off <= CORRECT_GUESS_THRESHOLD {
                    song.correct_guesses += 1;
                }
            }

            debug!(
                song = %key,
                guesses = song.total_guesses,
                correct = song.correct_guesses,
                "recorded song result"
            );
        })
        .await;
    }

    pub async fn summary(&self) -> StatsSummary {
        self.with_document(|document| StatsSummary {
            games_played: document.all_time.games_played,
            highest_avg_score: document.all_time.highest_avg_score,
            all_time_avg: round_to(all_time_avg(document), 2),
        })
        .await
    }

    pub async fn overview(&self) -> StatsOverview {
        let summary = self.summary().await;
        let playlists = self
            .with_document(|document| document.playlists.clone())
            .await;
        StatsOverview { summary, playlists }
    }

    /// Most recent games, newest first.
    pub async fn history(&self, limit: usize) -> Vec<GameRecord> {
        self.with_document(|document| document.games.iter().rev().take(limit).cloned().collect())
            .await
    }

    /// Difficulty rating for `uri`, once enough rounds have been played with it.
    pub async fn song_difficulty(&self, uri: &str) -> Option<SongDifficulty> {
        let key = song_key(uri);
        self.with_document(|document| document.songs.get(&key).and_then(difficulty))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::json_file::JsonFileStatsStore,
        state::{game::GuessResult, scoring::Difficulty},
    };

    fn summary(rounds: usize, players: usize, total: u64) -> GameSummary {
        GameSummary {
            playlist: "80s.json".into(),
            rounds,
            player_count: players,
            winner: Some("ana".into()),
            winner_score: 40,
            total_points: total,
            difficulty: Difficulty::Normal,
        }
    }

    fn service(dir: &tempfile::TempDir) -> StatsService {
        StatsService::new(Arc::new(JsonFileStatsStore::new(dir.path().join("stats.json"))))
    }

    #[tokio::test]
    async fn unreadable_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "{ not json").unwrap();
        let stats = service(&dir);

        let comparison = stats.record_game(&summary(5, 2, 80)).await;

        assert!(comparison.is_first_game);
        assert_eq!(stats.summary().await.games_played, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn first_game_sets_benchmark() {
        let dir = tempfile::tempdir().unwrap();
        let stats = service(&dir);

        let comparison = stats.record_game(&summary(5, 2, 80)).await;

        assert!(comparison.is_first_game);
        assert!(!comparison.is_above_average);
        assert_eq!(comparison.avg_score, 8.0);
        assert_eq!(comparison.message.unwrap().kind, MessageKind::First);

        let overview = stats.overview().await;
        assert_eq!(overview.summary.games_played, 1);
        assert_eq!(overview.summary.highest_avg_score, 8.0);
        assert_eq!(overview.playlists["80s.json"].times_played, 1);
        assert_eq!(overview.playlists["80s.json"].total_rounds, 5);
    }

    #[tokio::test]
    async fn record_and_comparison_against_history() {
        let dir = tempfile::tempdir().unwrap();
        let stats = service(&dir);
        stats.record_game(&summary(5, 2, 80)).await;

        let record = stats.record_game(&summary(5, 2, 100)).await;
        assert!(record.is_new_record);
        assert_eq!(record.difference, 2.0);
        assert_eq!(record.message.unwrap().kind, MessageKind::Record);

        let close = stats.record_game(&summary(10, 1, 60)).await;
        assert!(!close.is_new_record);
        // History: 8.0 and 10.0 over 10 player-rounds each.
        assert_eq!(close.all_time_avg, 9.0);
        assert_eq!(close.difference, -3.0);
        let message = close.message.unwrap();
        assert_eq!(message.kind, MessageKind::Close);
        assert_eq!(message.message, "Close to average! Just 3.0 pts below");

        let history = stats.history(2).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].avg_score_per_round, 6.0);
        assert_eq!(history[1].avg_score_per_round, 10.0);
        assert_eq!(history[0].id.len(), 8);
    }

    #[tokio::test]
    async fn empty_games_are_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let stats = service(&dir);

        let comparison = stats.record_game(&summary(3, 0, 0)).await;
        assert_eq!(comparison.avg_score, 0.0);
        assert_eq!(stats.summary().await.games_played, 0);
    }

    #[tokio::test]
    async fn statistics_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        service(&dir).record_game(&summary(4, 2, 64)).await;

        let reloaded = service(&dir);
        assert_eq!(reloaded.summary().await.games_played, 1);
    }

    #[test]
    fn messages_by_difference() {
        let mut comparison = GameComparison {
            avg_score: 0.0,
            all_time_avg: 0.0,
            difference: 7.5,
            is_new_record: false,
            is_first_game: false,
            is_above_average: true,
            message: None,
        };
        let strong = motivational_message(&comparison).unwrap();
        assert_eq!(strong.message, "Excellent! 7.5 pts above average");

        comparison.difference = 1.5;
        assert_eq!(motivational_message(&comparison).unwrap().kind, MessageKind::Above);

        comparison.difference = -5.0;
        assert!(motivational_message(&comparison).is_none());
    }

    #[tokio::test]
    async fn song_difficulty_needs_enough_plays() {
        let dir = tempfile::tempdir().unwrap();
        let stats = service(&dir);
        let uri = "spotify:track:4iV5W9uYEdYUVa79Axb7Rh";
        let outcome = |years: [Option<u32>; 2]| RoundOutcome {
            song_uri: uri.into(),
            results: years
                .into_iter()
                .map(|years_off| GuessResult {
                    submitted: years_off.is_some(),
                    years_off,
                })
                .collect(),
        };

        stats.record_song_result(&outcome([Some(0), Some(10)])).await;
        stats.record_song_result(&outcome([Some(2), None])).await;
        assert!(stats.song_difficulty(uri).await.is_none());

        stats.record_song_result(&outcome([Some(4), Some(9)])).await;
        let rating = stats.song_difficulty(uri).await.unwrap();
        // 2 correct out of 5 guesses.
        assert_eq!(rating.accuracy, 40.0);
        assert_eq!((rating.stars, rating.label.as_str()), (3, "hard"));
        assert_eq!(rating.times_played, 3);
    }

    #[test]
    fn song_keys_are_sanitized() {
        assert_eq!(song_key("spotify:track:abc"), "spotify_track_abc");
        assert_eq!(song_key("http://x/y"), "http___x_y");
    }
}
