//! The authoritative game session: roster, round lifecycle, scoring application and snapshots.

use std::{collections::HashMap, sync::Arc, time::Duration};

use indexmap::IndexMap;
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    config::{GameRules, ScoringConfig},
    dto::{
        phase::VisibleGamePhase,
        state::{
            ChallengeView, ChallengeWinner, GameSnapshot, GameStats, PlayerSummary, RoundResult,
            SongView, Superlative, SuperlativeKind, Winner,
        },
    },
    error::{ErrorCode, GameError},
    services::media_player::{self, MediaPlayer, PartialMetadata, TrackMetadata},
    state::{
        challenge::{BonusChallenge, ChallengeKind, GuessRecord},
        clock::Clock,
        leaderboard::{self, FinalLeaderboardEntry, LeaderboardEntry},
        player::{ConnectionId, PlayerSession},
        playlist::{PlaylistManager, Song},
        scoring::{self, Difficulty},
        state_machine::{
            GameEvent, GamePhase, GameStateMachine, InvalidTransition, PauseReason,
        },
    },
};

/// Length of generated game identifiers.
const GAME_ID_LENGTH: usize = 11;

/// Per-game feature switches chosen at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameFlags {
    /// Accuracy bands used for scoring.
    pub difficulty: Difficulty,
    /// Offer a movie challenge on songs that carry one.
    pub movie_quiz: bool,
    /// Offer an artist challenge when no movie challenge applies.
    pub artist_quiz: bool,
}

/// Returned by [`GameSession::create_game`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedGame {
    /// Random identifier of the new game.
    pub game_id: String,
    /// Link players open to join.
    pub join_url: String,
    /// Always the lobby for a fresh game.
    pub phase: VisibleGamePhase,
    /// Songs loaded from the selected playlists.
    pub song_count: usize,
}

/// Result of a movie or artist guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct BonusGuessOutcome {
    /// Challenge the guess answered.
    pub kind: ChallengeKind,
    /// The guess matched the answer.
    pub correct: bool,
    /// The player had already answered this challenge; nothing changed.
    pub already_guessed: bool,
    /// Arrival position among correct movie guesses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    /// Points earned, or provisional points for an artist guess.
    pub bonus: u32,
}

/// Player detached from a closed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedPlayer {
    /// Stored player name.
    pub name: String,
    /// The player held admin rights.
    pub was_admin: bool,
}

/// How a single player fared on the song just scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessResult {
    /// A year was guessed.
    pub submitted: bool,
    /// Distance from the actual year, when guessed.
    pub years_off: Option<u32>,
}

/// Song-level outcome of a scored round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Song that was played.
    pub song_uri: String,
    /// One entry per player on the roster.
    pub results: Vec<GuessResult>,
}

/// Whole-game totals recorded once the game ends.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    /// Playlist names joined for display.
    pub playlist: String,
    /// Rounds actually played.
    pub rounds: usize,
    /// Roster size at the end.
    pub player_count: usize,
    /// Top scorer, if anyone played.
    pub winner: Option<String>,
    /// Winner's final score.
    pub winner_score: u32,
    /// Sum of every player's score.
    pub total_points: u64,
    /// Difficulty the game was played at.
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone)]
struct CurrentSong {
    year: i32,
    uri: String,
    fun_fact: Option<String>,
    metadata: TrackMetadata,
}

impl CurrentSong {
    fn view(&self, reveal: bool) -> SongView {
        SongView {
            artist: self.metadata.artist.clone(),
            title: self.metadata.title.clone(),
            album_art: self.metadata.album_art.clone(),
            year: reveal.then_some(self.year),
            fun_fact: if reveal { self.fun_fact.clone() } else { None },
            uri: reveal.then(|| self.uri.clone()),
            song_difficulty: None,
        }
    }
}

/// Inputs shared by every player while scoring a round.
struct RoundContext<'a> {
    actual_year: i32,
    difficulty: Difficulty,
    duration_secs: f64,
    artist_answer: Option<&'a str>,
    scoring: &'a ScoringConfig,
}

/// One live game. Owns every player and the active bonus challenge.
pub struct GameSession {
    rules: GameRules,
    scoring: ScoringConfig,
    clock: Arc<dyn Clock>,
    game_id: Option<String>,
    join_url: Option<String>,
    playlists: Vec<String>,
    machine: GameStateMachine,
    playlist: PlaylistManager,
    flags: GameFlags,
    total_rounds: usize,
    round: usize,
    deadline_ms: Option<u64>,
    paused_remaining_ms: Option<u64>,
    current_song: Option<CurrentSong>,
    last_round: bool,
    round_scored: bool,
    players: IndexMap<String, PlayerSession>,
    challenge: Option<BonusChallenge>,
}

fn player_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn generate_game_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GAME_ID_LENGTH)
        .map(char::from)
        .collect()
}

impl GameSession {
    /// Empty session with no game.
    pub fn new(rules: GameRules, scoring: ScoringConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            scoring,
            clock,
            game_id: None,
            join_url: None,
            playlists: Vec::new(),
            machine: GameStateMachine::new(),
            playlist: PlaylistManager::default(),
            flags: GameFlags::default(),
            total_rounds: 0,
            round: 0,
            deadline_ms: None,
            paused_remaining_ms: None,
            current_song: None,
            last_round: false,
            round_scored: false,
            players: IndexMap::new(),
            challenge: None,
        }
    }

    /// Start a brand-new game over `songs`, discarding any previous state.
    pub fn create_game(
        &mut self,
        playlists: Vec<String>,
        songs: &[Song],
        base_url: &str,
        flags: GameFlags,
    ) -> CreatedGame {
        self.reset();

        let game_id = generate_game_id();
        let join_url = format!(
            "{}/beatify/play?game={game_id}",
            base_url.trim_end_matches('/')
        );

        self.game_id = Some(game_id.clone());
        self.join_url = Some(join_url.clone());
        self.playlists = playlists;
        self.playlist = PlaylistManager::new(songs);
        self.total_rounds = songs.len();
        self.flags = flags;

        info!(
            game_id = %game_id,
            songs = songs.len(),
            difficulty = flags.difficulty.as_str(),
            movie_quiz = flags.movie_quiz,
            artist_quiz = flags.artist_quiz,
            "game created"
        );

        CreatedGame {
            game_id,
            join_url,
            phase: VisibleGamePhase::from(&self.machine.phase()),
            song_count: songs.len(),
        }
    }

    /// Clear all game and player state back to an empty session.
    pub fn end_game(&mut self) {
        if let Some(game_id) = &self.game_id {
            info!(game_id = %game_id, "game ended");
        }
        self.reset();
    }

    fn reset(&mut self) {
        *self = Self::new(self.rules.clone(), self.scoring.clone(), self.clock.clone());
    }

    /// A game has been created and not ended.
    pub fn is_active(&self) -> bool {
        self.game_id.is_some()
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    pub fn round(&self) -> usize {
        self.round
    }

    /// Clock reading at which the open submission window closes.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    /// Case-insensitive lookup.
    pub fn player(&self, name: &str) -> Option<&PlayerSession> {
        self.players.get(&player_key(name))
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerSession> {
        self.players.values()
    }

    /// Players with a live connection.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Add a participant. Returns the trimmed name actually stored.
    pub fn add_player(
        &mut self,
        name: &str,
        connection: Option<ConnectionId>,
    ) -> Result<String, ErrorCode> {
        if !self.is_active() {
            return Err(ErrorCode::NoActiveGame);
        }

        let name = name.trim();
        let length = name.chars().count();
        if length < self.rules.min_name_length.max(1) || length > self.rules.max_name_length {
            return Err(ErrorCode::NameInvalid);
        }

        if self.machine.phase() == GamePhase::End {
            return Err(ErrorCode::GameEnded);
        }

        if self.players.len() >= self.rules.max_players {
            return Err(ErrorCode::GameFull);
        }

        let key = player_key(name);
        if self.players.contains_key(&key) {
            return Err(ErrorCode::NameTaken);
        }

        let joined_late = self.machine.phase() != GamePhase::Lobby;
        self.players.insert(
            key,
            PlayerSession::new(name.to_owned(), connection, joined_late),
        );

        info!(
            player = %name,
            total = self.players.len(),
            late = joined_late,
            "player joined"
        );
        Ok(name.to_owned())
    }

    /// Drop a player from the roster. Returns `false` if the name is unknown.
    pub fn remove_player(&mut self, name: &str) -> bool {
        match self.players.shift_remove(&player_key(name)) {
            Some(player) => {
                info!(player = %player.name(), "player removed");
                true
            }
            None => false,
        }
    }

    /// Grant admin rights. Returns `false` if the name is unknown.
    pub fn set_admin(&mut self, name: &str) -> bool {
        let Some(player) = self.players.get_mut(&player_key(name)) else {
            return false;
        };
        player.is_admin = true;
        info!(player = %player.name(), "player set as admin");
        true
    }

    /// Mark the player holding `connection` as disconnected.
    pub fn detach_connection(&mut self, connection: ConnectionId) -> Option<DetachedPlayer> {
        let player = self
            .players
            .values_mut()
            .find(|player| player.connection == Some(connection))?;

        player.connected = false;
        player.connection = None;
        info!(player = %player.name(), "player disconnected");

        Some(DetachedPlayer {
            name: player.name().to_owned(),
            was_admin: player.is_admin,
        })
    }

    /// Re-attach a disconnected player to a fresh connection.
    ///
    /// Returns the stored name, or `None` when no disconnected player has this name.
    pub fn reconnect(&mut self, name: &str, connection: ConnectionId) -> Option<String> {
        let player = self
            .players
            .get_mut(&player_key(name))
            .filter(|player| !player.connected)?;

        player.connected = true;
        player.connection = Some(connection);
        info!(player = %player.name(), "player reconnected");
        Some(player.name().to_owned())
    }

    /// Player attached to `connection`, connected or not.
    pub fn player_by_connection(&self, connection: ConnectionId) -> Option<&PlayerSession> {
        self.players
            .values()
            .find(|player| player.connection == Some(connection))
    }

    /// Some player, connected or not, holds admin rights.
    pub fn has_admin(&self) -> bool {
        self.players.values().any(|player| player.is_admin)
    }

    /// Flag the player on `connection` as unreachable but keep the handle so a later
    /// [`Self::detach_connection`] still reports who left.
    pub fn mark_connection_lost(&mut self, connection: ConnectionId) {
        if let Some(player) = self
            .players
            .values_mut()
            .find(|player| player.connection == Some(connection) && player.connected)
        {
            warn!(player = %player.name(), "send failed; marking player disconnected");
            player.connected = false;
        }
    }

    /// Mark a player disconnected by name.
    pub fn mark_disconnected(&mut self, name: &str) {
        if let Some(player) = self.players.get_mut(&player_key(name)) {
            if player.connected {
                warn!(player = %player.name(), "marking player disconnected");
            }
            player.connected = false;
            player.connection = None;
        }
    }

    /// Leave the lobby and play the first round.
    ///
    /// Returns `Ok(false)` when no song could be played and the game went straight to the end.
    pub async fn start_game(&mut self, media: &dyn MediaPlayer) -> Result<bool, GameError> {
        if !self.is_active() {
            return Err(ErrorCode::NoActiveGame.into());
        }

        match self.machine.phase() {
            GamePhase::Lobby => {}
            GamePhase::End => return Err(ErrorCode::GameEnded.into()),
            _ => return Err(ErrorCode::GameAlreadyStarted.into()),
        }

        if self.connected_count() < self.rules.min_players.max(1) {
            return Err(ErrorCode::NotEnoughPlayers.into());
        }

        info!(
            game_id = self.game_id.as_deref().unwrap_or_default(),
            players = self.players.len(),
            "game started"
        );
        self.start_round(media).await
    }

    /// Move from the reveal to the next round, or to the end when the catalog is exhausted.
    pub async fn advance(&mut self, media: &dyn MediaPlayer) -> Result<bool, GameError> {
        let from = self.machine.phase();
        if from != GamePhase::Reveal {
            return Err(InvalidTransition {
                from,
                event: GameEvent::RoundStarted,
            }
            .into());
        }
        self.start_round(media).await
    }

    /// Draw a song, play it and open the submission window.
    ///
    /// A song that fails to play is marked played and the next one is tried, at most once per
    /// remaining song. Returns `Ok(false)` if nothing could be played; the game is then over.
    pub async fn start_round(&mut self, media: &dyn MediaPlayer) -> Result<bool, GameError> {
        let from = self.machine.phase();
        if !self.machine.can_apply(GameEvent::RoundStarted) {
            return Err(InvalidTransition {
                from,
                event: GameEvent::RoundStarted,
            }
            .into());
        }

        let attempts = self.playlist.remaining_count();
        let mut chosen = None;
        for _ in 0..attempts {
            let Some(song) = self.playlist.get_next_song().cloned() else {
                break;
            };
            let remaining = self.playlist.remaining_count();
            let played =
                media_player::bounded(self.rules.media_timeout(), media.play(song.uri.clone()))
                    .await;
            self.playlist.mark_played(&song.uri);

            match played {
                Ok(()) => {
                    chosen = Some((song, remaining));
                    break;
                }
                Err(err) => {
                    warn!(uri = %song.uri, error = %err, "playback failed; trying next song")
                }
            }
        }

        let Some((song, remaining)) = chosen else {
            self.current_song = None;
            self.challenge = None;
            self.deadline_ms = None;
            self.machine.apply(GameEvent::CatalogExhausted)?;
            info!(rounds = self.round, "no playable song left; game over");
            return Ok(false);
        };

        self.last_round = remaining <= 1;

        if self.rules.playback_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.rules.playback_settle_ms)).await;
        }

        let metadata = match media_player::bounded(self.rules.media_timeout(), media.metadata())
            .await
        {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(error = %err, "media metadata unavailable; using defaults");
                PartialMetadata::default()
            }
        };

        self.current_song = Some(CurrentSong {
            year: song.year,
            uri: song.uri.clone(),
            fun_fact: song.fun_fact.clone(),
            metadata: TrackMetadata::with_defaults(metadata, &self.rules.default_artwork),
        });
        self.challenge = self.build_challenge(&song);

        for player in self.players.values_mut() {
            player.reset_round();
        }

        self.deadline_ms = Some(self.clock.now_ms() + self.rules.round_duration_ms());
        self.paused_remaining_ms = None;
        self.round += 1;
        self.round_scored = false;
        self.machine.apply(GameEvent::RoundStarted)?;

        info!(
            round = self.round,
            total = self.total_rounds,
            last_round = self.last_round,
            challenge = ?self.challenge.as_ref().map(BonusChallenge::kind),
            "round started"
        );
        Ok(true)
    }

    fn build_challenge(&self, song: &Song) -> Option<BonusChallenge> {
        let movie = self
            .flags
            .movie_quiz
            .then(|| BonusChallenge::movie(song))
            .flatten();

        movie.or_else(|| {
            self.flags
                .artist_quiz
                .then(|| BonusChallenge::artist(song, self.playlist.songs()))
                .flatten()
        })
    }

    /// Milliseconds into the window at `timestamp_ms`, or the reason it is closed.
    fn window_elapsed_ms(&self, timestamp_ms: u64) -> Result<u64, ErrorCode> {
        if self.machine.phase() != GamePhase::Playing {
            return Err(ErrorCode::RoundNotActive);
        }

        let deadline = self.deadline_ms.ok_or(ErrorCode::RoundNotActive)?;
        if timestamp_ms >= deadline {
            return Err(ErrorCode::RoundExpired);
        }

        // Stamped before the window opened, e.g. queued behind the previous reveal.
        self.rules
            .round_duration_ms()
            .checked_sub(deadline - timestamp_ms)
            .ok_or(ErrorCode::RoundNotActive)
    }

    /// Record a year guess. One per player per round.
    pub fn submit_guess(
        &mut self,
        name: &str,
        year: i32,
        bet: bool,
        timestamp_ms: u64,
    ) -> Result<(), GameError> {
        let elapsed_ms = self.window_elapsed_ms(timestamp_ms)?;
        let year_in_range = self.rules.year_in_range(year);

        let player = self
            .players
            .get_mut(&player_key(name))
            .ok_or_else(|| GameError::UnknownPlayer(name.to_owned()))?;

        if player.round.submitted {
            return Err(ErrorCode::AlreadySubmitted.into());
        }
        if !year_in_range {
            return Err(ErrorCode::InvalidYear.into());
        }

        player.round.submitted = true;
        player.round.guess = Some(year);
        player.round.bet = bet;
        player.round.submitted_at_ms = Some(timestamp_ms);
        player.round.elapsed_ms = elapsed_ms;

        debug!(player = %player.name(), year, bet, elapsed_ms, "guess submitted");
        Ok(())
    }

    /// Record a movie-title guess; correct guesses are ranked by arrival.
    pub fn submit_movie_guess(
        &mut self,
        name: &str,
        guess: &str,
        timestamp_ms: u64,
    ) -> Result<BonusGuessOutcome, GameError> {
        let elapsed_ms = self.window_elapsed_ms(timestamp_ms)?;

        let challenge = self
            .challenge
            .as_mut()
            .filter(|challenge| challenge.kind() == ChallengeKind::Movie)
            .ok_or(GameError::NoMovieChallenge)?;

        let player = self
            .players
            .get_mut(&player_key(name))
            .ok_or_else(|| GameError::UnknownPlayer(name.to_owned()))?;

        if player.round.movie_guessed {
            return Ok(BonusGuessOutcome {
                kind: ChallengeKind::Movie,
                correct: false,
                already_guessed: true,
                rank: None,
                bonus: 0,
            });
        }

        player.round.movie_guessed = true;
        let record = challenge.record_guess(player.name(), guess, elapsed_ms as f64 / 1000.0);

        let outcome = match record {
            GuessRecord::Correct { rank } => {
                let bonus = scoring::movie_bonus_by_rank(rank, &self.scoring);
                player.round.movie_bonus = bonus;
                BonusGuessOutcome {
                    kind: ChallengeKind::Movie,
                    correct: true,
                    already_guessed: false,
                    rank: Some(rank),
                    bonus,
                }
            }
            GuessRecord::Wrong => BonusGuessOutcome {
                kind: ChallengeKind::Movie,
                correct: false,
                already_guessed: false,
                rank: None,
                bonus: 0,
            },
        };

        debug!(
            player = %player.name(),
            correct = outcome.correct,
            rank = ?outcome.rank,
            "movie guess"
        );
        Ok(outcome)
    }

    /// Record an artist guess; points are applied when the round ends.
    pub fn submit_artist_guess(
        &mut self,
        name: &str,
        guess: &str,
        timestamp_ms: u64,
    ) -> Result<BonusGuessOutcome, GameError> {
        let elapsed_ms = self.window_elapsed_ms(timestamp_ms)?;

        let challenge = self
            .challenge
            .as_mut()
            .filter(|challenge| challenge.kind() == ChallengeKind::Artist)
            .ok_or(GameError::NoArtistChallenge)?;

        let player = self
            .players
            .get_mut(&player_key(name))
            .ok_or_else(|| GameError::UnknownPlayer(name.to_owned()))?;

        if player.round.artist_guessed {
            return Ok(BonusGuessOutcome {
                kind: ChallengeKind::Artist,
                correct: false,
                already_guessed: true,
                rank: None,
                bonus: 0,
            });
        }

        player.round.artist_guessed = true;
        player.round.artist_guess = Some(guess.trim().to_owned());
        challenge.record_guess(player.name(), guess, elapsed_ms as f64 / 1000.0);

        let (bonus, matched) =
            scoring::artist_match(guess, challenge.correct_answer(), &self.scoring);

        Ok(BonusGuessOutcome {
            kind: ChallengeKind::Artist,
            correct: matched.is_some(),
            already_guessed: false,
            rank: None,
            bonus,
        })
    }

    /// True when every connected player has answered everything this round asks for.
    pub fn check_all_guesses_complete(&self) -> bool {
        if self.machine.phase() != GamePhase::Playing {
            return false;
        }

        let challenge_kind = self.challenge.as_ref().map(BonusChallenge::kind);
        let mut connected = self.players.values().filter(|p| p.connected).peekable();
        if connected.peek().is_none() {
            return false;
        }

        connected.all(|player| {
            player.round.submitted
                && match challenge_kind {
                    None => true,
                    Some(ChallengeKind::Movie) => player.round.movie_guessed,
                    Some(ChallengeKind::Artist) => player.round.artist_guessed,
                }
        })
    }

    /// Score the round and move to the reveal.
    ///
    /// Returns `Ok(false)` without touching any score if this round was already scored.
    pub fn end_round(&mut self) -> Result<bool, GameError> {
        if self.round_scored {
            return Ok(false);
        }
        if self.machine.phase() != GamePhase::Playing {
            return Err(ErrorCode::RoundNotActive.into());
        }

        let Some(song) = self.current_song.as_ref() else {
            return Err(ErrorCode::RoundNotActive.into());
        };

        let ranks: HashMap<String, usize> = leaderboard::rank(self.players.values())
            .into_iter()
            .map(|(rank, player)| (player_key(player.name()), rank))
            .collect();

        let context = RoundContext {
            actual_year: song.year,
            difficulty: self.flags.difficulty,
            duration_secs: self.rules.round_duration_ms() as f64 / 1000.0,
            artist_answer: self
                .challenge
                .as_ref()
                .filter(|challenge| challenge.kind() == ChallengeKind::Artist)
                .map(BonusChallenge::correct_answer),
            scoring: &self.scoring,
        };

        for (key, player) in self.players.iter_mut() {
            player.round.previous_rank = ranks.get(key).copied();
            if player.connected {
                score_player(player, &context);
            }
        }

        self.round_scored = true;
        self.machine.apply(GameEvent::RoundEnded)?;

        info!(round = self.round, year = song.year, "round ended");
        Ok(true)
    }

    /// Suspend gameplay, freezing the remaining submission window.
    pub fn pause(&mut self, reason: PauseReason) -> Result<(), GameError> {
        let was_playing = self.machine.phase() == GamePhase::Playing;
        self.machine.apply(GameEvent::Pause(reason))?;

        if was_playing {
            let now = self.clock.now_ms();
            self.paused_remaining_ms = self
                .deadline_ms
                .map(|deadline| deadline.saturating_sub(now));
        }

        info!(reason = ?reason, remaining_ms = ?self.paused_remaining_ms, "game paused");
        Ok(())
    }

    /// Return to the phase active before the pause, restarting the frozen window.
    pub fn resume(&mut self) -> Result<GamePhase, GameError> {
        let phase = self.machine.apply(GameEvent::Resume)?;

        if let Some(remaining) = self.paused_remaining_ms.take() {
            self.deadline_ms = Some(self.clock.now_ms() + remaining);
        }

        info!(phase = ?phase, deadline = ?self.deadline_ms, "game resumed");
        Ok(phase)
    }

    /// Live, tie-aware leaderboard.
    pub fn get_leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard::leaderboard(self.players.values())
    }

    /// Leaderboard with cumulative stats for the final screen.
    pub fn get_final_leaderboard(&self) -> Vec<FinalLeaderboardEntry> {
        leaderboard::final_leaderboard(self.players.values())
    }

    fn winner(&self) -> Option<Winner> {
        leaderboard::rank(self.players.values())
            .first()
            .map(|(_, player)| Winner {
                name: player.name().to_owned(),
                score: player.score,
            })
    }

    fn superlatives(&self) -> Vec<Superlative> {
        let ranked = leaderboard::rank(self.players.values());
        let best = |award: SuperlativeKind, value: fn(&PlayerSession) -> u32| {
            ranked
                .iter()
                .map(|(_, player)| (*player, value(player)))
                .filter(|(_, value)| *value > 0)
                .fold(None::<(&PlayerSession, u32)>, |best, candidate| match best {
                    Some(current) if current.1 >= candidate.1 => Some(current),
                    _ => Some(candidate),
                })
                .map(|(player, value)| Superlative {
                    award,
                    name: player.name().to_owned(),
                    value,
                })
        };

        let mut awards = Vec::new();
        if self.flags.movie_quiz {
            awards.extend(best(SuperlativeKind::FilmBuff, |p| p.movie_bonus_total));
        }
        awards.extend(best(SuperlativeKind::ArtistAce, |p| p.artist_bonus_total));
        awards.extend(best(SuperlativeKind::StreakMaster, |p| p.best_streak));
        awards.extend(best(SuperlativeKind::HighRoller, |p| p.bets_won));
        awards
    }

    /// Song-level results of the round just scored, for difficulty statistics.
    pub fn round_outcome(&self) -> Option<RoundOutcome> {
        if !self.round_scored {
            return None;
        }
        let song = self.current_song.as_ref()?;
        Some(RoundOutcome {
            song_uri: song.uri.clone(),
            results: self
                .players
                .values()
                .map(|player| GuessResult {
                    submitted: player.round.submitted,
                    years_off: player.round.years_off,
                })
                .collect(),
        })
    }

    /// Totals for the statistics store.
    pub fn summary(&self) -> Option<GameSummary> {
        self.game_id.as_ref()?;
        let winner = self.winner();
        Some(GameSummary {
            playlist: if self.playlists.is_empty() {
                "unknown".into()
            } else {
                self.playlists.join(", ")
            },
            rounds: self.round,
            player_count: self.players.len(),
            winner_score: winner.as_ref().map(|w| w.score).unwrap_or_default(),
            winner: winner.map(|w| w.name),
            total_points: self.players.values().map(|p| u64::from(p.score)).sum(),
            difficulty: self.flags.difficulty,
        })
    }

    /// Broadcast-ready view of the game; `None` when no game exists.
    pub fn get_state(&self) -> Option<GameSnapshot> {
        let game_id = self.game_id.clone()?;
        let phase = self.machine.phase();

        let mut snapshot = GameSnapshot {
            game_id,
            phase: VisibleGamePhase::from(&phase),
            version: self.machine.version(),
            player_count: self.players.len(),
            players: self
                .players
                .values()
                .map(|player| PlayerSummary {
                    name: player.name().to_owned(),
                    score: player.score,
                    streak: player.streak,
                    connected: player.connected,
                    is_admin: player.is_admin,
                    joined_late: player.joined_late,
                    submitted: player.round.submitted,
                })
                .collect(),
            join_url: None,
            difficulty: None,
            round: None,
            total_rounds: None,
            deadline: None,
            last_round: None,
            songs_remaining: None,
            song: None,
            challenge: None,
            round_results: None,
            leaderboard: None,
            pause_reason: None,
            winner: None,
            final_leaderboard: None,
            game_stats: None,
            superlatives: None,
            comparison: None,
        };

        match phase {
            GamePhase::Lobby => {
                snapshot.join_url = self.join_url.clone();
                snapshot.difficulty = Some(self.flags.difficulty);
            }
            GamePhase::Playing => {
                snapshot.join_url = self.join_url.clone();
                snapshot.round = Some(self.round);
                snapshot.total_rounds = Some(self.total_rounds);
                snapshot.deadline = self.deadline_ms;
                snapshot.last_round = Some(self.last_round);
                snapshot.songs_remaining = Some(self.playlist.remaining_count());
                snapshot.song = self.current_song.as_ref().map(|song| song.view(false));
                snapshot.challenge = self.challenge.as_ref().map(|challenge| ChallengeView {
                    kind: challenge.kind(),
                    options: challenge.options().to_vec(),
                    correct_answer: None,
                    winners: None,
                    wrong_guesses: None,
                });
            }
            GamePhase::Reveal => {
                snapshot.join_url = self.join_url.clone();
                snapshot.round = Some(self.round);
                snapshot.total_rounds = Some(self.total_rounds);
                snapshot.last_round = Some(self.last_round);
                snapshot.song = self.current_song.as_ref().map(|song| song.view(true));
                snapshot.challenge = self.challenge.as_ref().map(|c| self.revealed_challenge(c));
                snapshot.round_results = Some(self.round_results());
                snapshot.leaderboard = Some(self.get_leaderboard());
            }
            GamePhase::Paused { reason, .. } => {
                snapshot.pause_reason = Some(reason);
            }
            GamePhase::End => {
                snapshot.winner = self.winner();
                snapshot.final_leaderboard = Some(self.get_final_leaderboard());
                snapshot.game_stats = Some(GameStats {
                    rounds_played: self.round,
                    total_rounds: self.total_rounds,
                    player_count: self.players.len(),
                });
                snapshot.superlatives = Some(self.superlatives());
            }
        }

        Some(snapshot)
    }

    fn revealed_challenge(&self, challenge: &BonusChallenge) -> ChallengeView {
        let winners = challenge
            .correct_guesses()
            .iter()
            .enumerate()
            .map(|(index, guess)| ChallengeWinner {
                name: guess.name.clone(),
                elapsed_secs: guess.elapsed_secs,
                bonus: match challenge.kind() {
                    ChallengeKind::Movie => scoring::movie_bonus_by_rank(index + 1, &self.scoring),
                    ChallengeKind::Artist => self.scoring.artist_exact_points,
                },
            })
            .collect();

        ChallengeView {
            kind: challenge.kind(),
            options: challenge.options().to_vec(),
            correct_answer: Some(challenge.correct_answer().to_owned()),
            winners: Some(winners),
            wrong_guesses: Some(challenge.wrong_guesses().to_vec()),
        }
    }

    fn round_results(&self) -> Vec<RoundResult> {
        leaderboard::rank(self.players.values())
            .into_iter()
            .map(|(_, player)| {
                let round = &player.round;
                RoundResult {
                    name: player.name().to_owned(),
                    guess: round.guess,
                    years_off: round.years_off,
                    years_off_text: round.years_off.map(scoring::years_off_text),
                    base_score: round.base_score,
                    speed_multiplier: round.speed_multiplier,
                    round_score: round.round_score,
                    bet: round.bet,
                    bet_outcome: round.bet_outcome,
                    streak: player.streak,
                    previous_streak: round.previous_streak,
                    streak_bonus: round.streak_bonus,
                    movie_bonus: round.movie_bonus,
                    artist_bonus: round.artist_bonus,
                    artist_match: round.artist_match,
                    missed_round: round.missed_round,
                    score: player.score,
                }
            })
            .collect()
    }
}

/// Apply one round of scoring to a connected player.
fn score_player(player: &mut PlayerSession, ctx: &RoundContext<'_>) {
    if let Some(answer) = ctx.artist_answer {
        if let Some(guess) = player.round.artist_guess.as_deref() {
            let (bonus, matched) = scoring::artist_match(guess, answer, ctx.scoring);
            player.round.artist_bonus = bonus;
            player.round.artist_match = matched;
        }
    }

    match player.round.guess.filter(|_| player.round.submitted) {
        Some(guess) => {
            let base = scoring::accuracy(guess, ctx.actual_year, ctx.difficulty, ctx.scoring);
            let multiplier = scoring::speed_multiplier(
                player.round.elapsed_ms as f64 / 1000.0,
                ctx.duration_secs,
                ctx.scoring.max_speed_multiplier,
            );
            let (round_score, outcome) =
                scoring::apply_bet(scoring::round_score(base, multiplier), player.round.bet);

            player.round.years_off = Some(guess.abs_diff(ctx.actual_year));
            player.round.base_score = base;
            player.round.speed_multiplier = multiplier;
            player.round.round_score = round_score;
            player.round.bet_outcome = outcome;

            if round_score > 0 {
                player.streak += 1;
                player.round.streak_bonus = scoring::streak_bonus(player.streak, ctx.scoring);
            } else {
                player.break_streak();
            }

            player.rounds_played += 1;
            if outcome == Some(scoring::BetOutcome::Won) {
                player.bets_won += 1;
            }
        }
        None => {
            player.round.round_score = 0;
            player.round.years_off = None;
            player.round.missed_round = true;
            player.round.bet_outcome = None;
            player.break_streak();
        }
    }

    let round = &player.round;
    player.score += round.round_score + round.streak_bonus + round.movie_bonus + round.artist_bonus;
    player.best_streak = player.best_streak.max(player.streak);
    player.movie_bonus_total += round.movie_bonus;
    player.artist_bonus_total += round.artist_bonus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::media_player::ScriptedMediaPlayer,
        state::{clock::ManualClock, playlist::song, scoring::BetOutcome, state_machine::ResumePhase},
    };

    const START: u64 = 1_700_000_000_000;

    fn rules(min_players: usize) -> GameRules {
        GameRules {
            playback_settle_ms: 0,
            min_players,
            ..GameRules::default()
        }
    }

    fn session_with(clock: Arc<ManualClock>, min_players: usize) -> GameSession {
        GameSession::new(rules(min_players), ScoringConfig::default(), clock)
    }

    fn lobby(clock: &Arc<ManualClock>, songs: &[Song], flags: GameFlags) -> GameSession {
        let mut session = session_with(clock.clone(), 1);
        session.create_game(vec!["80s.json".into()], songs, "http://ha.local:8123/", flags);
        session
    }

    fn movie_song() -> Song {
        Song {
            movie: Some("Top Gun".into()),
            movie_choices: vec!["Grease".into(), "Footloose".into()],
            ..song(1986, "spotify:track:danger")
        }
    }

    #[test]
    fn create_game_builds_join_url_and_resets() {
        let clock = Arc::new(ManualClock::new(START));
        let mut session = session_with(clock, 2);

        let created = session.create_game(
            vec!["80s.json".into()],
            &[song(1984, "a"), song(1985, "b")],
            "http://ha.local:8123/",
            GameFlags::default(),
        );

        assert_eq!(created.game_id.len(), GAME_ID_LENGTH);
        assert_eq!(
            created.join_url,
            format!("http://ha.local:8123/beatify/play?game={}", created.game_id)
        );
        assert_eq!(created.phase, VisibleGamePhase::Lobby);
        assert_eq!(created.song_count, 2);
        assert_eq!(session.round(), 0);
    }

    #[test]
    fn add_player_validation() {
        let clock = Arc::new(ManualClock::new(START));
        let mut session = session_with(clock, 1);
        assert_eq!(session.add_player("ana", None), Err(ErrorCode::NoActiveGame));

        session.create_game(vec![], &[song(1984, "a")], "http://x", GameFlags::default());

        assert_eq!(session.add_player("  Ana  ", None), Ok("Ana".into()));
        assert_eq!(session.add_player("ANA", None), Err(ErrorCode::NameTaken));
        assert_eq!(session.add_player("   ", None), Err(ErrorCode::NameInvalid));
        assert_eq!(
            session.add_player(&"x".repeat(21), None),
            Err(ErrorCode::NameInvalid)
        );
        assert!(session.add_player(&"é".repeat(20), None).is_ok());
        assert!(!session.player("ana").unwrap().joined_late);
    }

    #[test]
    fn roster_capacity_is_enforced() {
        let clock = Arc::new(ManualClock::new(START));
        let mut session = session_with(clock, 1);
        session.create_game(vec![], &[song(1984, "a")], "http://x", GameFlags::default());

        for index in 0..20 {
            session.add_player(&format!("p{index}"), None).unwrap();
        }
        assert_eq!(session.add_player("late", None), Err(ErrorCode::GameFull));
    }

    #[test]
    fn disconnected_player_can_reconnect() {
        let clock = Arc::new(ManualClock::new(START));
        let mut session = session_with(clock, 1);
        session.create_game(vec![], &[song(1984, "a")], "http://x", GameFlags::default());
        let first = ConnectionId::new_v4();
        let second = ConnectionId::new_v4();
        session.add_player("Ana", Some(first)).unwrap();
        session.set_admin("ana");

        assert_eq!(session.reconnect("ana", second), None);

        session.mark_connection_lost(first);
        assert!(!session.player("ana").unwrap().connected);
        let detached = session.detach_connection(first).unwrap();
        assert!(detached.was_admin);

        assert_eq!(session.reconnect("ANA", second), Some("Ana".into()));
        let ana = session.player_by_connection(second).unwrap();
        assert!(ana.connected && ana.is_admin);
    }

    #[tokio::test]
    async fn start_game_requires_enough_connected_players() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = session_with(clock, 2);
        session.create_game(vec![], &[song(1984, "a")], "http://x", GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();
        session.mark_disconnected("bo");

        let err = session.start_game(&media).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotEnoughPlayers));
        assert_eq!(session.phase(), GamePhase::Lobby);
    }

    #[tokio::test]
    async fn late_joiners_are_flagged_and_end_rejects_joins() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        assert!(session.start_game(&media).await.unwrap());

        session.add_player("bo", None).unwrap();
        assert!(session.player("bo").unwrap().joined_late);

        let err = session.start_game(&media).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::GameAlreadyStarted));

        session.end_round().unwrap();
        assert!(!session.advance(&media).await.unwrap());
        assert_eq!(session.phase(), GamePhase::End);
        assert_eq!(session.add_player("cy", None), Err(ErrorCode::GameEnded));
    }

    #[tokio::test]
    async fn playback_failures_skip_to_next_song() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::failing_on(&["bad-1", "bad-2"]);
        let songs = [song(1970, "bad-1"), song(1980, "bad-2"), song(1990, "good")];
        let mut session = lobby(&clock, &songs, GameFlags::default());
        session.add_player("ana", None).unwrap();

        assert!(session.start_game(&media).await.unwrap());

        assert_eq!(media.played().last().map(String::as_str), Some("good"));
        assert_eq!(session.round(), 1);
        assert_eq!(session.phase(), GamePhase::Playing);
        assert_eq!(
            session.get_state().unwrap().songs_remaining,
            Some(3 - media.played().len())
        );
    }

    #[tokio::test]
    async fn all_playback_failing_ends_the_game() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::failing_on(&["a", "b"]);
        let mut session = lobby(&clock, &[song(1970, "a"), song(1980, "b")], GameFlags::default());
        session.add_player("ana", None).unwrap();

        assert!(!session.start_game(&media).await.unwrap());
        assert_eq!(session.phase(), GamePhase::End);
        assert_eq!(media.played().len(), 2);
    }

    #[tokio::test]
    async fn hanging_device_counts_as_failure() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer {
            hang_metadata: true,
            ..ScriptedMediaPlayer::hanging_on(&["stuck"])
        };
        let rules = GameRules {
            media_timeout_ms: 20,
            ..rules(1)
        };
        let mut session = GameSession::new(rules, ScoringConfig::default(), clock);
        session.create_game(
            vec![],
            &[song(1970, "stuck"), song(1990, "good")],
            "http://x",
            GameFlags::default(),
        );
        session.add_player("ana", None).unwrap();

        assert!(session.start_game(&media).await.unwrap());

        assert_eq!(session.phase(), GamePhase::Playing);
        let current = session.current_song.as_ref().unwrap();
        assert_eq!(current.uri, "good");
        assert_eq!(current.metadata.artist, "Unknown Artist");
    }

    #[tokio::test]
    async fn playing_snapshot_hides_answers() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut tagged = movie_song();
        tagged.fun_fact = Some("Kenny Loggins".into());
        let flags = GameFlags {
            movie_quiz: true,
            ..GameFlags::default()
        };
        let mut session = lobby(&clock, &[tagged], flags);
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();

        let playing = session.get_state().unwrap();
        let song = playing.song.unwrap();
        assert_eq!(playing.phase, VisibleGamePhase::Playing);
        assert_eq!(song.artist, "Unknown Artist");
        assert_eq!(song.title, "Unknown Title");
        assert!(song.year.is_none() && song.fun_fact.is_none() && song.uri.is_none());
        let challenge = playing.challenge.unwrap();
        assert!(challenge.correct_answer.is_none());
        assert_eq!(challenge.options.len(), 3);
        assert!(playing.round_results.is_none());
        assert_eq!(playing.deadline, Some(START + 30_000));

        session.end_round().unwrap();
        let reveal = session.get_state().unwrap();
        let song = reveal.song.unwrap();
        assert_eq!(song.year, Some(1986));
        assert_eq!(song.fun_fact.as_deref(), Some("Kenny Loggins"));
        assert_eq!(
            reveal.challenge.unwrap().correct_answer.as_deref(),
            Some("Top Gun")
        );
        assert_eq!(reveal.round_results.unwrap().len(), 1);
        assert!(reveal.leaderboard.is_some());
    }

    #[tokio::test]
    async fn submissions_are_validated() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a"), song(1990, "b")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();

        assert_eq!(
            session.submit_guess("ana", 1984, false, START).unwrap_err().code(),
            Some(ErrorCode::RoundNotActive)
        );

        session.start_game(&media).await.unwrap();
        assert_eq!(
            session.submit_guess("ana", 1850, false, START).unwrap_err().code(),
            Some(ErrorCode::InvalidYear)
        );
        session.submit_guess("ana", 1984, false, START + 1_000).unwrap();
        assert_eq!(
            session.submit_guess("ANA", 1985, false, START + 2_000).unwrap_err().code(),
            Some(ErrorCode::AlreadySubmitted)
        );
        assert_eq!(
            session.submit_guess("bo", 1985, false, START + 30_000).unwrap_err().code(),
            Some(ErrorCode::RoundExpired)
        );
        assert!(matches!(
            session.submit_guess("ghost", 1985, false, START),
            Err(GameError::UnknownPlayer(_))
        ));
    }

    #[tokio::test]
    async fn guess_stamped_before_the_round_opened_is_rejected() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();

        assert_eq!(
            session.submit_guess("ana", 1984, false, START - 60_000).unwrap_err().code(),
            Some(ErrorCode::RoundNotActive)
        );
        assert!(!session.player("ana").unwrap().round.submitted);

        session.submit_guess("ana", 1984, false, START).unwrap();
        assert_eq!(session.player("ana").unwrap().round.elapsed_ms, 0);
    }

    #[tokio::test]
    async fn missed_round_forfeits_bet_and_breaks_streak() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();

        {
            let ana = session.players.get_mut("ana").unwrap();
            ana.streak = 4;
            ana.score = 30;
            ana.round.bet = true;
        }

        session.end_round().unwrap();

        let ana = session.player("ana").unwrap();
        assert_eq!(ana.round.round_score, 0);
        assert!(ana.round.missed_round);
        assert_eq!(ana.round.bet_outcome, None);
        assert_eq!(ana.round.previous_streak, 4);
        assert_eq!(ana.streak, 0);
        assert_eq!(ana.score, 30);
        assert_eq!(ana.rounds_played, 0);
    }

    #[tokio::test]
    async fn bet_doubles_only_the_year_score() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();
        session.start_game(&media).await.unwrap();

        session.players.get_mut("ana").unwrap().streak = 2;
        session.submit_guess("ana", 1987, true, START + 15_000).unwrap();
        session.submit_guess("bo", 2020, true, START).unwrap();
        assert!(session.check_all_guesses_complete());
        session.end_round().unwrap();

        let ana = session.player("ana").unwrap();
        // 5 points at 1.25x -> 6, doubled by the bet; streak hits 3 for +20.
        assert_eq!(ana.round.base_score, 5);
        assert_eq!(ana.round.round_score, 12);
        assert_eq!(ana.round.bet_outcome, Some(BetOutcome::Won));
        assert_eq!(ana.round.streak_bonus, 20);
        assert_eq!(ana.score, 32);
        assert_eq!(ana.bets_won, 1);
        assert_eq!(ana.best_streak, 3);

        let bo = session.player("bo").unwrap();
        assert_eq!(bo.round.round_score, 0);
        assert_eq!(bo.round.bet_outcome, Some(BetOutcome::Lost));
        assert!(!bo.round.missed_round);
        assert_eq!(bo.rounds_played, 1);
    }

    #[tokio::test]
    async fn end_round_is_idempotent() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a"), song(1999, "b")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();
        session.submit_guess("ana", 1984, false, START).unwrap();

        assert!(session.end_round().unwrap());
        let score = session.player("ana").unwrap().score;
        assert_eq!(score, 15);

        assert!(!session.end_round().unwrap());
        assert_eq!(session.player("ana").unwrap().score, score);
        assert_eq!(session.phase(), GamePhase::Reveal);
    }

    #[tokio::test]
    async fn disconnected_players_do_not_block_completion_and_are_not_scored() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();
        session.start_game(&media).await.unwrap();
        session.players.get_mut("bo").unwrap().streak = 2;

        session.submit_guess("ana", 1984, false, START).unwrap();
        assert!(!session.check_all_guesses_complete());

        session.mark_disconnected("bo");
        assert!(session.check_all_guesses_complete());

        session.end_round().unwrap();
        let bo = session.player("bo").unwrap();
        assert_eq!(bo.streak, 2);
        assert!(!bo.round.missed_round);
        assert_eq!(bo.round.previous_rank, Some(1));
    }

    #[tokio::test]
    async fn movie_guesses_ranked_and_idempotent() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let flags = GameFlags {
            movie_quiz: true,
            ..GameFlags::default()
        };
        let mut session = lobby(&clock, &[movie_song()], flags);
        for name in ["ana", "bo", "cy"] {
            session.add_player(name, None).unwrap();
        }
        session.start_game(&media).await.unwrap();

        let first = session.submit_movie_guess("bo", " top gun", START + 1_000).unwrap();
        assert_eq!((first.correct, first.rank, first.bonus), (true, Some(1), 5));

        let wrong = session.submit_movie_guess("cy", "Grease", START + 1_500).unwrap();
        assert!(!wrong.correct);

        let second = session.submit_movie_guess("ana", "TOP GUN", START + 2_000).unwrap();
        assert_eq!((second.rank, second.bonus), (Some(2), 3));

        let again = session.submit_movie_guess("bo", "Top Gun", START + 3_000).unwrap();
        assert!(again.already_guessed);
        assert_eq!(again.rank, None);
        assert_eq!(session.player("bo").unwrap().round.movie_bonus, 5);

        assert!(!session.check_all_guesses_complete());
        for name in ["ana", "bo", "cy"] {
            session.submit_guess(name, 1950, false, START + 4_000).unwrap();
        }
        assert!(session.check_all_guesses_complete());

        session.end_round().unwrap();
        // Year guesses miss entirely; only the movie bonus counts.
        assert_eq!(session.player("bo").unwrap().score, 5);
        assert_eq!(session.player("ana").unwrap().score, 3);
        assert_eq!(session.player("bo").unwrap().movie_bonus_total, 5);
    }

    #[tokio::test]
    async fn bonus_guess_without_challenge_is_contract_violation() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();

        let err = session.submit_movie_guess("ana", "Top Gun", START).unwrap_err();
        assert!(matches!(err, GameError::NoMovieChallenge));
        assert!(err.is_contract_violation());

        let err = session.submit_artist_guess("ana", "Queen", START).unwrap_err();
        assert!(matches!(err, GameError::NoArtistChallenge));
    }

    #[tokio::test]
    async fn artist_bonus_applies_at_round_end() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let with_artist = |year: i32, uri: &str, artist: &str| Song {
            artist: Some(artist.into()),
            ..song(year, uri)
        };
        let songs = [
            with_artist(1977, "a", "David Bowie"),
            with_artist(1977, "b", "David Bowie"),
        ];
        let flags = GameFlags {
            artist_quiz: true,
            ..GameFlags::default()
        };
        // No other artist in the catalog: no challenge can be built.
        let mut session = lobby(&clock, &songs, flags);
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();
        assert!(session.get_state().unwrap().challenge.is_none());

        let songs = [
            with_artist(1977, "a", "David Bowie"),
            with_artist(1980, "b", "Blondie"),
        ];
        let mut session = lobby(&clock, &songs, flags);
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();
        session.start_game(&media).await.unwrap();

        let answer = session.challenge.as_ref().unwrap().correct_answer().to_owned();
        let outcome = session.submit_artist_guess("ana", &answer, START).unwrap();
        assert!(outcome.correct);
        assert!(session.submit_artist_guess("ana", "x", START).unwrap().already_guessed);
        session.submit_artist_guess("bo", "nobody", START).unwrap();

        session.end_round().unwrap();
        let ana = session.player("ana").unwrap();
        assert_eq!(ana.round.artist_bonus, 10);
        assert_eq!(ana.score, 10);
        assert_eq!(session.player("bo").unwrap().round.artist_bonus, 0);
    }

    #[tokio::test]
    async fn pause_freezes_the_window() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();

        clock.advance(10_000);
        session.pause(PauseReason::Manual).unwrap();
        assert_eq!(
            session.phase(),
            GamePhase::Paused {
                resume_to: ResumePhase::Playing,
                reason: PauseReason::Manual
            }
        );
        let paused = session.get_state().unwrap();
        assert_eq!(paused.pause_reason, Some(PauseReason::Manual));
        assert!(paused.song.is_none());

        assert_eq!(
            session.end_round().unwrap_err().code(),
            Some(ErrorCode::RoundNotActive)
        );
        assert_eq!(
            session.submit_guess("ana", 1984, false, clock.now_ms()).unwrap_err().code(),
            Some(ErrorCode::RoundNotActive)
        );

        clock.advance(60_000);
        assert_eq!(session.resume().unwrap(), GamePhase::Playing);
        assert_eq!(session.deadline_ms(), Some(clock.now_ms() + 20_000));

        clock.advance(5_000);
        session.submit_guess("ana", 1984, false, clock.now_ms()).unwrap();
        session.end_round().unwrap();

        // 15 s of window used: 1.25x.
        let ana = session.player("ana").unwrap();
        assert_eq!(ana.round.speed_multiplier, 1.25);
        assert_eq!(ana.score, 12);
    }

    #[tokio::test]
    async fn pause_during_reveal_resumes_to_reveal() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a"), song(1985, "b")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();
        session.end_round().unwrap();

        session.pause(PauseReason::AdminDisconnected).unwrap();
        assert!(session.pause(PauseReason::Manual).is_err());
        assert_eq!(session.resume().unwrap(), GamePhase::Reveal);
    }

    #[tokio::test]
    async fn end_snapshot_carries_winner_and_superlatives() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();
        session.start_game(&media).await.unwrap();
        session.submit_guess("ana", 1984, true, START).unwrap();
        session.submit_guess("bo", 1986, false, START).unwrap();
        session.end_round().unwrap();
        session.advance(&media).await.unwrap();

        let end = session.get_state().unwrap();
        assert_eq!(end.phase, VisibleGamePhase::End);
        assert_eq!(
            end.winner,
            Some(Winner {
                name: "ana".into(),
                score: 30
            })
        );
        let stats = end.game_stats.unwrap();
        assert_eq!((stats.rounds_played, stats.player_count), (1, 2));

        let awards = end.superlatives.unwrap();
        let high_roller = awards
            .iter()
            .find(|a| a.award == SuperlativeKind::HighRoller)
            .unwrap();
        assert_eq!((high_roller.name.as_str(), high_roller.value), ("ana", 1));
        assert!(awards.iter().all(|a| a.award != SuperlativeKind::FilmBuff));
        assert!(awards.iter().all(|a| a.award != SuperlativeKind::ArtistAce));

        let summary = session.summary().unwrap();
        assert_eq!(summary.playlist, "80s.json");
        assert_eq!(summary.total_points, 30 + 7);
        assert_eq!(summary.winner.as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn end_game_clears_everything() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.start_game(&media).await.unwrap();

        session.end_game();

        assert!(session.get_state().is_none());
        assert!(session.game_id().is_none());
        assert_eq!(session.phase(), GamePhase::Lobby);
        assert_eq!(session.players().count(), 0);
        assert_eq!(session.round(), 0);
    }

    #[tokio::test]
    async fn rank_snapshot_feeds_rank_change() {
        let clock = Arc::new(ManualClock::new(START));
        let media = ScriptedMediaPlayer::default();
        let mut session = lobby(&clock, &[song(1984, "a"), song(1990, "b")], GameFlags::default());
        session.add_player("ana", None).unwrap();
        session.add_player("bo", None).unwrap();
        session.players.get_mut("ana").unwrap().score = 10;
        session.start_game(&media).await.unwrap();

        let year = session.current_song.as_ref().unwrap().year;
        session.submit_guess("bo", year, false, START).unwrap();
        session.end_round().unwrap();

        let board = session.get_leaderboard();
        assert_eq!(board[0].name, "bo");
        assert_eq!(board[0].rank_change, 1);
        assert_eq!(board[1].rank_change, -1);
    }
}
