use crate::error::ClientError;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshlink_core::{
    ClientMessage, IceCandidate, IceServerConfig, RoomId, ServerMessage, SessionDescription,
    SessionId, Signal,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// WebSocket connection to the relay.
pub struct SignalingClient {
    session_id: SessionId,
    ice_servers: Vec<IceServerConfig>,
    user_id: Option<String>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl SignalingClient {
    /// Connects, waits for `welcome`, and returns the client together with the
    /// stream of every later relay frame. The stream ends when the connection
    /// drops.
    pub async fn connect(
        url: &str,
        user_id: Option<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), ClientError> {
        info!("Connecting to relay at {}", url);
        let (stream, _) = connect_async(url).await?;
        let (mut sink, mut source) = stream.split();

        let (session_id, ice_servers) = tokio::time::timeout(WELCOME_TIMEOUT, async {
            while let Some(frame) = source.next().await {
                if let Message::Text(text) = frame? {
                    if let ServerMessage::Welcome {
                        session_id,
                        ice_servers,
                    } = serde_json::from_str(text.as_str())?
                    {
                        return Ok::<_, ClientError>((session_id, ice_servers));
                    }
                }
            }
            Err(ClientError::NoWelcome)
        })
        .await
        .map_err(|_| ClientError::WelcomeTimeout)??;

        info!("Relay assigned session {}", session_id);

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

        let send_task = tokio::spawn(async move {
            let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
            keepalive.tick().await;

            loop {
                let msg = tokio::select! {
                    msg = outbound_rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                    _ = keepalive.tick() => ClientMessage::Ping,
                };

                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize client message: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let recv_task = tokio::spawn(async move {
            while let Some(Ok(frame)) = source.next().await {
                match frame {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(ServerMessage::Pong) => debug!("Relay pong"),
                        Ok(ServerMessage::Error { message }) => {
                            warn!("Relay rejected a frame: {}", message)
                        }
                        Ok(msg) => {
                            if inbound_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid frame from relay: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            info!("Relay connection closed");
        });

        let client = Self {
            session_id,
            ice_servers,
            user_id,
            outbound,
            tasks: vec![send_task, recv_task],
        };
        Ok((client, inbound_rx))
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// ICE servers announced by the relay.
    pub fn ice_servers(&self) -> &[IceServerConfig] {
        &self.ice_servers
    }

    pub fn send(&self, msg: ClientMessage) {
        if self.outbound.send(msg).is_err() {
            warn!("Relay connection is gone, dropping outbound frame");
        }
    }

    fn send_signal(&self, room: &RoomId, to: SessionId, signal: Signal) {
        self.send(ClientMessage::Signal {
            room_id: room.clone(),
            to,
            envelope: signal.into_envelope(self.user_id.clone()),
        });
    }

    /// Drops the connection; the inbound stream ends.
    pub fn close(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingClient {
    async fn send_offer(&self, room: &RoomId, to: SessionId, offer: SessionDescription) {
        self.send_signal(room, to, Signal::Offer(offer));
    }

    async fn send_answer(&self, room: &RoomId, to: SessionId, answer: SessionDescription) {
        self.send_signal(room, to, Signal::Answer(answer));
    }

    async fn send_ice(&self, room: &RoomId, to: SessionId, candidate: IceCandidate) {
        self.send_signal(room, to, Signal::Candidate(candidate));
    }

    async fn join_room(&self, room: &RoomId, user_id: Option<String>) {
        self.send(ClientMessage::JoinRoom {
            room_id: room.clone(),
            user_id,
        });
    }

    async fn leave_room(&self, room: &RoomId) {
        self.send(ClientMessage::LeaveRoom {
            room_id: room.clone(),
        });
    }
}
