use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, post},
};
use validator::Validate;

use crate::{
    dto::admin::{ActionResponse, CreateGameRequest, VolumeRequest, VolumeResponse},
    error::AppError,
    services::game_service,
    state::{SharedState, game::CreatedGame, state_machine::PauseReason},
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints for creating and driving the game.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/game", post(create_game))
        .route("/admin/game/start", post(start_game))
        .route("/admin/game/next", post(next_round))
        .route("/admin/game/pause", post(pause_game))
        .route("/admin/game/resume", post(resume_game))
        .route("/admin/game/end", post(end_game))
        .route("/admin/players/{name}/admin", post(set_admin))
        .route("/admin/players/{name}", delete(remove_player))
        .route("/admin/media/volume", post(set_volume))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Create a new game from playlist files, replacing any existing one.
#[utoipa::path(
    post,
    path = "/admin/game",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created in the lobby", body = CreatedGame),
        (status = 400, description = "Invalid playlist selection"),
        (status = 404, description = "Playlist file not found")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<CreatedGame>, AppError> {
    payload.validate()?;
    Ok(Json(game_service::create_game(&state, payload).await?))
}

/// Leave the lobby and play the first round.
#[utoipa::path(
    post,
    path = "/admin/game/start",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses(
        (status = 200, description = "Game started", body = ActionResponse),
        (status = 409, description = "Game cannot start", body = crate::error::ErrorBody)
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    game_service::start_game(&state).await?;
    Ok(Json(ActionResponse::new("game started")))
}

/// Move from the reveal to the next round, or to the final scoreboard.
#[utoipa::path(
    post,
    path = "/admin/game/next",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses(
        (status = 200, description = "Advanced", body = ActionResponse),
        (status = 409, description = "Not in the reveal phase")
    )
)]
pub async fn next_round(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    game_service::next_round(&state).await?;
    Ok(Json(ActionResponse::new("advanced")))
}

#[utoipa::path(
    post,
    path = "/admin/game/pause",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses(
        (status = 200, description = "Game paused", body = ActionResponse),
        (status = 409, description = "Nothing to pause")
    )
)]
pub async fn pause_game(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    game_service::pause(&state, PauseReason::Manual).await?;
    Ok(Json(ActionResponse::new("game paused")))
}

#[utoipa::path(
    post,
    path = "/admin/game/resume",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses(
        (status = 200, description = "Game resumed", body = ActionResponse),
        (status = 409, description = "Game is not paused")
    )
)]
pub async fn resume_game(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    game_service::resume(&state).await?;
    Ok(Json(ActionResponse::new("game resumed")))
}

/// Discard the current game and return every client to the "no game" screen.
#[utoipa::path(
    post,
    path = "/admin/game/end",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses(
        (status = 200, description = "Game ended", body = ActionResponse),
        (status = 409, description = "No active game", body = crate::error::ErrorBody)
    )
)]
pub async fn end_game(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    game_service::end_game(&state).await?;
    Ok(Json(ActionResponse::new("game ended")))
}

/// Hand the admin seat to `name`.
#[utoipa::path(
    post,
    path = "/admin/players/{name}/admin",
    tag = "admin",
    params(
        ("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
        ("name" = String, Path, description = "Player name, case-insensitive")
    ),
    responses(
        (status = 200, description = "Admin reassigned", body = ActionResponse),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn set_admin(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    game_service::set_admin(&state, &name).await?;
    Ok(Json(ActionResponse::new(format!("{name} is now admin"))))
}

/// Remove a player from the roster.
#[utoipa::path(
    delete,
    path = "/admin/players/{name}",
    tag = "admin",
    params(
        ("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
        ("name" = String, Path, description = "Player name, case-insensitive")
    ),
    responses(
        (status = 204, description = "Player removed"),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    game_service::remove_player(&state, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the device volume; the applied level is clamped to 0.0 to 1.0.
#[utoipa::path(
    post,
    path = "/admin/media/volume",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    request_body = VolumeRequest,
    responses(
        (status = 200, description = "Volume applied", body = VolumeResponse),
        (status = 409, description = "Device rejected the request")
    )
)]
pub async fn set_volume(
    State(state): State<SharedState>,
    Json(payload): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, AppError> {
    let level = game_service::set_volume(&state, payload.level).await?;
    Ok(Json(VolumeResponse { level }))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let config = state.config();
    let Some(expected) = config.admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if provided == expected {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin token".into()))
    }
}
