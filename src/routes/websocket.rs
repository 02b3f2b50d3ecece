use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "players",
    responses(
        (status = 101, description = "Switching protocols; exchange `ClientMessage`/`ServerMessage` JSON frames"),
        (status = 400, description = "Not a WebSocket upgrade request")
    )
)]
/// Upgrade the HTTP connection into a player session; the current state is pushed right away.
pub async fn player_socket(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket))
}

/// Configure the player WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(player_socket))
}
