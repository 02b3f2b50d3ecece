//! Fan-out of game snapshots to every open socket.

use axum::extract::ws::Message;
use tracing::{debug, warn};

use crate::{
    dto::ws::ServerMessage,
    services::game_service,
    state::{SharedState, player::ConnectionId},
};

/// Serialize `message` once into a text frame.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize server message `{message:?}`");
            None
        }
    }
}

/// Current state as a server message.
pub async fn state_message(state: &SharedState) -> ServerMessage {
    match game_service::snapshot(state).await {
        Some(snapshot) => ServerMessage::State(snapshot),
        None => ServerMessage::NoGame,
    }
}

/// Push the current snapshot to every connection.
///
/// A connection whose writer is gone is dropped from the registry and its player is
/// flagged disconnected.
pub async fn broadcast_state(state: &SharedState) {
    let Some(frame) = encode(&state_message(state).await) else {
        return;
    };

    let failed: Vec<ConnectionId> = state
        .connections()
        .iter()
        .filter(|connection| connection.tx.send(frame.clone()).is_err())
        .map(|connection| *connection.key())
        .collect();

    debug!(
        recipients = state.connections().len(),
        failed = failed.len(),
        "broadcast state"
    );

    if failed.is_empty() {
        return;
    }

    for id in &failed {
        state.connections().remove(id);
    }

    let mut game = state.game().lock().await;
    for id in failed {
        game.mark_connection_lost(id);
    }
}
