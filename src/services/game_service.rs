//! Orchestrates the game session with its collaborators: media device, round timer,
//! statistics and client broadcasts.

use tracing::{info, warn};

use crate::{
    dto::{admin::CreateGameRequest, state::GameSnapshot, stats::GameComparison},
    error::{ErrorCode, GameError, ServiceError},
    services::{broadcast, catalog_service, media_player::clamp_volume},
    state::{
        SharedState,
        game::{BonusGuessOutcome, CreatedGame, GameFlags, GameSession},
        leaderboard::{FinalLeaderboardEntry, LeaderboardEntry},
        player::ConnectionId,
        state_machine::{GamePhase, PauseReason},
    },
};

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Name as stored in the roster.
    pub name: String,
    /// Whether the player holds admin rights after joining.
    pub is_admin: bool,
    /// A disconnected player was re-attached instead of added.
    pub reconnected: bool,
}

/// Current snapshot enriched with statistics, or `None` without a game.
pub async fn snapshot(state: &SharedState) -> Option<GameSnapshot> {
    let mut snapshot = state.game().lock().await.get_state()?;

    if let Some(song) = snapshot.song.as_mut() {
        if let Some(uri) = song.uri.as_deref() {
            song.song_difficulty = state.stats().song_difficulty(uri).await;
        }
    }

    if snapshot.final_leaderboard.is_some() {
        snapshot.comparison = state.last_comparison().read().await.clone();
    }

    Some(snapshot)
}

/// Create a new game from the selected playlists, replacing any existing one.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<CreatedGame, ServiceError> {
    let config = state.config();
    let songs =
        catalog_service::load_songs(&config.playlist_dir, &request.playlists, &config.rules).await?;

    state.round_timer().cancel().await;
    *state.last_comparison().write().await = None;

    let flags = GameFlags {
        difficulty: request.difficulty.unwrap_or(config.scoring.default_difficulty),
        movie_quiz: request.movie_quiz,
        artist_quiz: request.artist_quiz,
    };

    let created = {
        let mut game = state.game().lock().await;
        game.create_game(request.playlists, &songs, &config.base_url, flags)
    };

    broadcast::broadcast_state(state).await;
    Ok(created)
}

/// Add the player behind `connection`, or re-attach them if they dropped earlier.
pub async fn join(
    state: &SharedState,
    name: &str,
    connection: ConnectionId,
    wants_admin: bool,
) -> Result<JoinOutcome, ServiceError> {
    let outcome = {
        let mut game = state.game().lock().await;
        if game.player_by_connection(connection).is_some() {
            return Err(ErrorCode::AlreadyJoined.into());
        }

        let (stored, reconnected) = match game.reconnect(name, connection) {
            Some(stored) => (stored, true),
            None => (game.add_player(name, Some(connection))?, false),
        };

        if wants_admin && !game.has_admin() {
            game.set_admin(&stored);
        }

        let is_admin = game.player(&stored).is_some_and(|player| player.is_admin);
        JoinOutcome {
            name: stored,
            is_admin,
            reconnected,
        }
    };

    broadcast::broadcast_state(state).await;
    Ok(outcome)
}

/// The player on `connection` leaves the game for good.
///
/// Closes the round early when everyone still connected has already answered.
pub async fn leave(state: &SharedState, connection: ConnectionId) -> Result<(), ServiceError> {
    let complete = {
        let mut game = state.game().lock().await;
        let name = game
            .player_by_connection(connection)
            .map(|player| player.name().to_owned())
            .ok_or(ErrorCode::NotJoined)?;
        game.remove_player(&name);
        game.check_all_guesses_complete()
    };

    after_submission(state, complete).await;
    Ok(())
}

/// Socket closed: mark its player disconnected, pausing the game if it was the admin.
///
/// Otherwise the round closes early when the remaining connected players have all answered.
pub async fn disconnect(state: &SharedState, connection: ConnectionId) {
    let (paused, complete) = {
        let mut game = state.game().lock().await;
        let Some(detached) = game.detach_connection(connection) else {
            return;
        };

        let in_round = matches!(game.phase(), GamePhase::Playing | GamePhase::Reveal);
        let paused = if detached.was_admin && in_round {
            match game.pause(PauseReason::AdminDisconnected) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "failed to pause after admin disconnect");
                    false
                }
            }
        } else {
            false
        };
        (paused, game.check_all_guesses_complete())
    };

    if paused {
        state.round_timer().cancel().await;
        broadcast::broadcast_state(state).await;
    } else {
        after_submission(state, complete).await;
    }
}

/// Leave the lobby and start the first round.
pub async fn start_game(state: &SharedState) -> Result<(), ServiceError> {
    let started = {
        let mut game = state.game().lock().await;
        let started = game.start_game(state.media()).await?;
        started.then(|| (game.round(), game.deadline_ms()))
    };

    after_round_start(state, started).await;
    Ok(())
}

/// Move from the reveal to the next round, or to the end when no song is left.
///
/// A rejected request leaves the running round and its deadline untouched.
pub async fn next_round(state: &SharedState) -> Result<(), ServiceError> {
    let started = {
        let mut game = state.game().lock().await;
        let started = game.advance(state.media()).await?;
        started.then(|| (game.round(), game.deadline_ms()))
    };

    state.round_timer().cancel().await;
    after_round_start(state, started).await;
    Ok(())
}

async fn after_round_start(state: &SharedState, started: Option<(usize, Option<u64>)>) {
    match started {
        Some((round, Some(deadline))) => {
            state.round_timer().schedule(state, round, deadline).await;
        }
        Some((_, None)) => {}
        None => finish_game(state).await,
    }
    broadcast::broadcast_state(state).await;
}

/// Record the finished game in the statistics and keep the comparison for the final screen.
async fn finish_game(state: &SharedState) {
    let summary = state.game().lock().await.summary();
    let Some(summary) = summary else {
        return;
    };

    if let Err(err) = state.media().stop().await {
        warn!(error = %err, "failed to stop playback at game end");
    }

    let comparison: GameComparison = state.stats().record_game(&summary).await;
    *state.last_comparison().write().await = Some(comparison);
    info!(rounds = summary.rounds, players = summary.player_count, "game finished");
}

/// Record a year guess; closes the round early once everyone has answered.
pub async fn submit_guess(
    state: &SharedState,
    name: &str,
    year: i32,
    bet: bool,
) -> Result<(), ServiceError> {
    let complete = {
        let mut game = state.game().lock().await;
        let now = state.clock().now_ms();
        game.submit_guess(name, year, bet, now)?;
        game.check_all_guesses_complete()
    };

    after_submission(state, complete).await;
    Ok(())
}

/// Record a movie-title guess.
pub async fn submit_movie_guess(
    state: &SharedState,
    name: &str,
    guess: &str,
) -> Result<BonusGuessOutcome, ServiceError> {
    let (outcome, complete) = {
        let mut game = state.game().lock().await;
        let now = state.clock().now_ms();
        let outcome = game
            .submit_movie_guess(name, guess, now)
            .inspect_err(|err| warn_on_contract_violation(err, name))?;
        (outcome, game.check_all_guesses_complete())
    };

    after_submission(state, complete).await;
    Ok(outcome)
}

/// Record an artist guess.
pub async fn submit_artist_guess(
    state: &SharedState,
    name: &str,
    guess: &str,
) -> Result<BonusGuessOutcome, ServiceError> {
    let (outcome, complete) = {
        let mut game = state.game().lock().await;
        let now = state.clock().now_ms();
        let outcome = game
            .submit_artist_guess(name, guess, now)
            .inspect_err(|err| warn_on_contract_violation(err, name))?;
        (outcome, game.check_all_guesses_complete())
    };

    after_submission(state, complete).await;
    Ok(outcome)
}

fn warn_on_contract_violation(err: &GameError, name: &str) {
    if err.is_contract_violation() {
        warn!(player = %name, error = %err, "bonus guess rejected");
    }
}

async fn after_submission(state: &SharedState, complete: bool) {
    if complete {
        info!("all guesses in; closing round early");
        if let Err(err) = close_round(state).await {
            warn!(error = %err, "failed to close round early");
        }
    } else {
        broadcast::broadcast_state(state).await;
    }
}

/// Score the current round and move to the reveal.
///
/// Returns `false` if the round had already been scored.
pub async fn close_round(state: &SharedState) -> Result<bool, ServiceError> {
    state.round_timer().cancel().await;
    close_round_inner(state, None).await
}

/// Deadline path: closes `round` only if it is still the round being played.
pub async fn close_round_on_timeout(state: &SharedState, round: usize) {
    info!(round, "round deadline reached");
    if let Err(err) = close_round_inner(state, Some(round)).await {
        warn!(round, error = %err, "failed to close round on deadline");
    }
}

async fn close_round_inner(
    state: &SharedState,
    expected_round: Option<usize>,
) -> Result<bool, ServiceError> {
    let outcome = {
        let mut game = state.game().lock().await;
        let stale = expected_round
            .is_some_and(|round| round != game.round() || game.phase() != GamePhase::Playing);
        if stale {
            return Ok(false);
        }
        if !game.end_round()? {
            return Ok(false);
        }
        game.round_outcome()
    };

    if let Some(outcome) = outcome {
        state.stats().record_song_result(&outcome).await;
    }
    broadcast::broadcast_state(state).await;
    Ok(true)
}

/// Suspend gameplay.
pub async fn pause(state: &SharedState, reason: PauseReason) -> Result<(), ServiceError> {
    state.game().lock().await.pause(reason)?;
    state.round_timer().cancel().await;

    broadcast::broadcast_state(state).await;
    Ok(())
}

/// Resume gameplay, re-arming the deadline when returning to a round.
pub async fn resume(state: &SharedState) -> Result<(), ServiceError> {
    let armed = {
        let mut game = state.game().lock().await;
        let phase = game.resume()?;
        (phase == GamePhase::Playing)
            .then(|| game.deadline_ms().map(|deadline| (game.round(), deadline)))
            .flatten()
    };

    if let Some((round, deadline)) = armed {
        state.round_timer().schedule(state, round, deadline).await;
    }
    broadcast::broadcast_state(state).await;
    Ok(())
}

/// Drop the game entirely and stop playback.
pub async fn end_game(state: &SharedState) -> Result<(), ServiceError> {
    state.round_timer().cancel().await;
    {
        let mut game = state.game().lock().await;
        if !game.is_active() {
            return Err(ErrorCode::NoActiveGame.into());
        }
        game.end_game();
    }
    *state.last_comparison().write().await = None;

    if let Err(err) = state.media().stop().await {
        warn!(error = %err, "failed to stop playback");
    }

    broadcast::broadcast_state(state).await;
    Ok(())
}

/// Grant admin rights to `name`.
pub async fn set_admin(state: &SharedState, name: &str) -> Result<(), ServiceError> {
    let found = with_active_game(state, |game| Ok(game.set_admin(name))).await?;
    if !found {
        return Err(ServiceError::NotFound(format!("player `{name}`")));
    }
    broadcast::broadcast_state(state).await;
    Ok(())
}

/// Remove `name` from the roster.
pub async fn remove_player(state: &SharedState, name: &str) -> Result<(), ServiceError> {
    let removed = with_active_game(state, |game| Ok(game.remove_player(name))).await?;
    if !removed {
        return Err(ServiceError::NotFound(format!("player `{name}`")));
    }
    broadcast::broadcast_state(state).await;
    Ok(())
}

/// Set the playback volume; returns the clamped level actually applied.
pub async fn set_volume(state: &SharedState, level: f64) -> Result<f64, ServiceError> {
    let level = clamp_volume(level);
    state
        .media()
        .set_volume(level)
        .await
        .map_err(|err| ServiceError::InvalidState(format!("media player: {err}")))?;
    Ok(level)
}

pub async fn leaderboard(state: &SharedState) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    with_active_game(state, |game| Ok(game.get_leaderboard())).await
}

pub async fn final_leaderboard(
    state: &SharedState,
) -> Result<Vec<FinalLeaderboardEntry>, ServiceError> {
    with_active_game(state, |game| Ok(game.get_final_leaderboard())).await
}

async fn with_active_game<T>(
    state: &SharedState,
    f: impl FnOnce(&mut GameSession) -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let mut game = state.game().lock().await;
    if !game.is_active() {
        return Err(ErrorCode::NoActiveGame.into());
    }
    f(&mut game)
}
