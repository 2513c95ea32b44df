use crate::router::RelayState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use meshlink_core::{ClientMessage, Participant, RoomId, ServerMessage, SessionId};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: RelayState) {
    let session_id = SessionId::new();
    info!("New WebSocket connection: {}", session_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    state.signaling.add_session(session_id, tx);
    state.signaling.send(
        &session_id,
        ServerMessage::Welcome {
            session_id,
            ice_servers: state.config.ice_servers.clone(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut joined: HashSet<RoomId> = HashSet::new();

    tokio::select! {
        _ = (&mut send_task) => {},
        _ = receive_frames(&mut receiver, &state, session_id, &mut joined) => {},
    };
    send_task.abort();

    // Transport loss takes the same path as an explicit leave-room.
    for room_id in joined.drain() {
        if let Err(e) = state.rooms.leave(&room_id, session_id).await {
            warn!("Leaving room '{}' for {} failed: {}", room_id, session_id, e);
        }
    }

    state.signaling.remove_session(&session_id);
    info!("WebSocket disconnected: {}", session_id);
}

async fn receive_frames(
    receiver: &mut SplitStream<WebSocket>,
    state: &RelayState,
    session_id: SessionId,
    joined: &mut HashSet<RoomId>,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(frame) => handle_frame(frame, state, session_id, joined).await,
                Err(e) => {
                    warn!("Invalid frame from {}: {}", session_id, e);
                    state.signaling.send(
                        &session_id,
                        ServerMessage::Error {
                            message: format!("malformed frame: {e}"),
                        },
                    );
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn handle_frame(
    frame: ClientMessage,
    state: &RelayState,
    session_id: SessionId,
    joined: &mut HashSet<RoomId>,
) {
    match frame {
        ClientMessage::JoinRoom { room_id, user_id } => {
            if state.config.single_room_per_session && !joined.contains(&room_id) {
                let previous: Vec<RoomId> = joined.drain().collect();
                for old in previous {
                    debug!("{} switches from room '{}' to '{}'", session_id, old, room_id);
                    if let Err(e) = state.rooms.leave(&old, session_id).await {
                        warn!("Leaving room '{}' for {} failed: {}", old, session_id, e);
                    }
                }
            }

            let participant = Participant {
                session_id,
                user_id,
            };
            match state.rooms.join(&room_id, participant).await {
                Ok(_) => {
                    joined.insert(room_id);
                }
                Err(e) => error!("{} could not join room '{}': {}", session_id, room_id, e),
            }
        }

        ClientMessage::LeaveRoom { room_id } => {
            joined.remove(&room_id);
            if let Err(e) = state.rooms.leave(&room_id, session_id).await {
                warn!("Leaving room '{}' for {} failed: {}", room_id, session_id, e);
            }
        }

        ClientMessage::Signal {
            room_id,
            to,
            envelope,
        } => {
            if !joined.contains(&room_id) {
                warn!(
                    "Dropping {:?} signal from {}: not joined to room '{}'",
                    envelope.kind, session_id, room_id
                );
                return;
            }
            if let Err(e) = state.rooms.signal(&room_id, session_id, to, envelope) {
                warn!("Signal from {} not routed: {}", session_id, e);
            }
        }

        ClientMessage::Ping => state.signaling.send(&session_id, ServerMessage::Pong),
    }
}
