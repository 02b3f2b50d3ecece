use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{AdminAction, ClientMessage, ServerMessage},
    error::{ErrorCode, ServiceError},
    services::{broadcast, game_service},
    state::{ClientConnection, SharedState, player::ConnectionId, state_machine::PauseReason},
};

/// Internal error type for socket message handling.
///
/// Distinct from `ServiceError`, which is also used for HTTP responses.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed; the connection should be terminated.
    #[error("connection closed")]
    ConnectionClosed,
    /// Message requires a joined player.
    #[error("join the game first")]
    NotJoined,
    /// Admin action from a player without admin rights.
    #[error("admin privileges required")]
    NotAdmin,
    /// Join sent on a socket that already plays under a name.
    #[error("already joined on this connection")]
    AlreadyJoined,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SocketError {
    /// Error frame for the client, or `None` when the socket is gone.
    fn to_message(&self) -> Option<ServerMessage> {
        let code = match self {
            SocketError::ConnectionClosed => return None,
            SocketError::NotJoined => Some(ErrorCode::NotJoined),
            SocketError::NotAdmin => Some(ErrorCode::NotAdmin),
            SocketError::AlreadyJoined => Some(ErrorCode::AlreadyJoined),
            SocketError::Service(ServiceError::Rejected(code)) => Some(*code),
            SocketError::Service(_) => None,
        };

        Some(ServerMessage::Error {
            code,
            message: self.to_string(),
        })
    }
}

/// Per-socket session data.
struct Session {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
    player: Option<String>,
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        id: Uuid::new_v4(),
        tx: outbound_tx.clone(),
        player: None,
    };

    state.connections().insert(
        session.id,
        ClientConnection {
            id: session.id,
            tx: outbound_tx.clone(),
        },
    );
    info!(connection = %session.id, "client connected");

    if send_message_to_websocket(&outbound_tx, &broadcast::state_message(&state).await).is_err() {
        state.connections().remove(&session.id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection = %session.id, payload = %text, "received client message");

                let inbound = match ClientMessage::from_json_str(&text) {
                    Ok(inbound) => inbound,
                    Err(err) => {
                        warn!(
                            connection = %session.id,
                            error = %err,
                            "failed to parse client message"
                        );
                        continue;
                    }
                };

                if let Err(err) = handle_message(&state, &mut session, inbound).await {
                    let Some(reply) = err.to_message() else {
                        info!(connection = %session.id, "connection closed while replying");
                        break;
                    };
                    debug!(connection = %session.id, error = %err, "client request rejected");
                    if send_message_to_websocket(&session.tx, &reply).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %session.id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %session.id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&session.id);
    if session.player.is_some() {
        game_service::disconnect(&state, session.id).await;
    }
    info!(connection = %session.id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

async fn handle_message(
    state: &SharedState,
    session: &mut Session,
    message: ClientMessage,
) -> Result<(), SocketError> {
    match message {
        ClientMessage::Join { name, is_admin } => {
            if session.player.is_some() {
                return Err(SocketError::AlreadyJoined);
            }
            let joined = game_service::join(state, &name, session.id, is_admin).await?;
            session.player = Some(joined.name.clone());
            send_message_to_websocket(
                &session.tx,
                &ServerMessage::Joined {
                    name: joined.name,
                    is_admin: joined.is_admin,
                },
            )
        }
        ClientMessage::Submit { year, bet } => {
            let player = joined_player(session)?;
            game_service::submit_guess(state, &player, year, bet).await?;
            send_message_to_websocket(&session.tx, &ServerMessage::SubmitAck { year, bet })
        }
        ClientMessage::MovieGuess { guess } => {
            let player = joined_player(session)?;
            let outcome = game_service::submit_movie_guess(state, &player, &guess).await?;
            send_message_to_websocket(&session.tx, &ServerMessage::BonusResult(outcome))
        }
        ClientMessage::ArtistGuess { guess } => {
            let player = joined_player(session)?;
            let outcome = game_service::submit_artist_guess(state, &player, &guess).await?;
            send_message_to_websocket(&session.tx, &ServerMessage::BonusResult(outcome))
        }
        ClientMessage::Leave => {
            joined_player(session)?;
            game_service::leave(state, session.id).await?;
            session.player = None;
            Ok(())
        }
        ClientMessage::Admin { action } => {
            let player = joined_player(session)?;
            let is_admin = state
                .game()
                .lock()
                .await
                .player(&player)
                .is_some_and(|p| p.is_admin);
            if !is_admin {
                return Err(SocketError::NotAdmin);
            }

            info!(player = %player, action = ?action, "admin action");
            match action {
                AdminAction::StartGame => game_service::start_game(state).await?,
                AdminAction::NextRound => game_service::next_round(state).await?,
                AdminAction::Pause => game_service::pause(state, PauseReason::Manual).await?,
                AdminAction::Resume => game_service::resume(state).await?,
                AdminAction::EndGame => game_service::end_game(state).await?,
            }
            Ok(())
        }
        ClientMessage::Unknown => {
            warn!(connection = %session.id, "ignoring unknown message type");
            Ok(())
        }
    }
}

fn joined_player(session: &Session) -> Result<String, SocketError> {
    session.player.clone().ok_or(SocketError::NotJoined)
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is reported.
fn send_message_to_websocket(
    tx: &mpsc::UnboundedSender<Message>,
    value: &ServerMessage,
) -> Result<(), SocketError> {
    let Some(frame) = broadcast::encode(value) else {
        return Ok(());
    };

    tx.send(frame).map_err(|_| SocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
