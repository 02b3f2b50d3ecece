use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dao::models::GameRecord,
    dto::{
        playlist::PlaylistInfo,
        state::GameSnapshot,
        stats::{HistoryQuery, StatsOverview},
    },
    error::{AppError, ErrorCode},
    services::{catalog_service, game_service, stats_service::DEFAULT_HISTORY_LIMIT},
    state::{
        SharedState,
        leaderboard::{FinalLeaderboardEntry, LeaderboardEntry},
    },
};

/// Public read-only endpoints for playlists, game state and statistics.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/playlists", get(list_playlists))
        .route("/api/state", get(get_state))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/leaderboard/final", get(get_final_leaderboard))
        .route("/api/stats", get(get_stats))
        .route("/api/stats/history", get(get_history))
}

#[utoipa::path(
    get,
    path = "/api/playlists",
    tag = "public",
    responses((status = 200, description = "Playlist files with their validation status", body = [PlaylistInfo]))
)]
/// List every playlist file in the playlist directory, valid or not.
pub async fn list_playlists(State(state): State<SharedState>) -> Json<Vec<PlaylistInfo>> {
    let config = state.config();
    Json(catalog_service::discover(&config.playlist_dir, &config.rules).await)
}

#[utoipa::path(
    get,
    path = "/api/state",
    tag = "public",
    responses(
        (status = 200, description = "Current game snapshot", body = GameSnapshot),
        (status = 409, description = "No active game", body = crate::error::ErrorBody)
    )
)]
/// Return the same snapshot WebSocket clients receive.
pub async fn get_state(State(state): State<SharedState>) -> Result<Json<GameSnapshot>, AppError> {
    game_service::snapshot(&state)
        .await
        .map(Json)
        .ok_or(AppError::Rejected(ErrorCode::NoActiveGame))
}

#[utoipa::path(
    get,
    path = "/api/leaderboard",
    tag = "public",
    responses(
        (status = 200, description = "Ranked players", body = [LeaderboardEntry]),
        (status = 409, description = "No active game", body = crate::error::ErrorBody)
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(game_service::leaderboard(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/leaderboard/final",
    tag = "public",
    responses(
        (status = 200, description = "Ranked players with end-of-game stats", body = [FinalLeaderboardEntry]),
        (status = 409, description = "No active game", body = crate::error::ErrorBody)
    )
)]
pub async fn get_final_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<Vec<FinalLeaderboardEntry>>, AppError> {
    Ok(Json(game_service::final_leaderboard(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "stats",
    responses((status = 200, description = "All-time summary and per-playlist counters", body = StatsOverview))
)]
/// All-time statistics across finished games.
pub async fn get_stats(State(state): State<SharedState>) -> Json<StatsOverview> {
    Json(state.stats().overview().await)
}

#[utoipa::path(
    get,
    path = "/api/stats/history",
    tag = "stats",
    params(HistoryQuery),
    responses((status = 200, description = "Recent games, newest first", body = [GameRecord]))
)]
/// Recent game records, newest first.
pub async fn get_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<GameRecord>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.stats().history(limit).await)
}
