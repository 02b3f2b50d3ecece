use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Beatify backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::player_socket,
        crate::routes::public::list_playlists,
        crate::routes::public::get_state,
        crate::routes::public::get_leaderboard,
        crate::routes::public::get_final_leaderboard,
        crate::routes::public::get_stats,
        crate::routes::public::get_history,
        crate::routes::admin::create_game,
        crate::routes::admin::start_game,
        crate::routes::admin::next_round,
        crate::routes::admin::pause_game,
        crate::routes::admin::resume_game,
        crate::routes::admin::end_game,
        crate::routes::admin::set_admin,
        crate::routes::admin::remove_player,
        crate::routes::admin::set_volume,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::AdminAction,
            crate::dto::admin::CreateGameRequest,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::VolumeRequest,
            crate::dto::admin::VolumeResponse,
            crate::dto::state::GameSnapshot,
            crate::dto::playlist::PlaylistInfo,
            crate::dto::stats::StatsOverview,
            crate::dto::stats::GameComparison,
            crate::dao::models::GameRecord,
            crate::error::ErrorBody,
            crate::error::ErrorCode,
            crate::state::game::CreatedGame,
            crate::state::game::BonusGuessOutcome,
            crate::state::leaderboard::LeaderboardEntry,
            crate::state::leaderboard::FinalLeaderboardEntry,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Read-only game state"),
        (name = "stats", description = "Historical game statistics"),
        (name = "admin", description = "Game control, guarded by `X-Admin-Token` when configured"),
        (name = "players", description = "WebSocket protocol for player clients"),
    )
)]
pub struct ApiDoc;
