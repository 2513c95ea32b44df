use anyhow::{Context, Result, bail};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use meshlink_core::{ClientMessage, IceServerConfig, ServerMessage, SessionId};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::signal_helpers::RELAY_TIMEOUT_MS;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Raw WebSocket participant speaking the relay protocol.
pub struct TestClient {
    /// Assigned by the relay in `welcome`.
    pub session_id: SessionId,
    pub ice_servers: Vec<IceServerConfig>,
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl TestClient {
    /// Connects and consumes the `welcome` frame.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (stream, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .context("Failed to connect to relay")?;
        let (write, read) = stream.split();

        let mut client = Self {
            session_id: SessionId::default(),
            ice_servers: Vec::new(),
            write,
            read,
        };

        match client.recv().await? {
            ServerMessage::Welcome {
                session_id,
                ice_servers,
            } => {
                client.session_id = session_id;
                client.ice_servers = ice_servers;
            }
            other => bail!("expected welcome, got {:?}", other),
        }

        Ok(client)
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.send_raw(&json).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.write
            .send(Message::text(text.to_string()))
            .await
            .context("Failed to send frame")
    }

    /// Next relay frame, failing after [`RELAY_TIMEOUT_MS`].
    pub async fn recv(&mut self) -> Result<ServerMessage> {
        let deadline = Duration::from_millis(RELAY_TIMEOUT_MS);

        loop {
            let frame = tokio::time::timeout(deadline, self.read.next())
                .await
                .context("Timed out waiting for relay frame")?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).context("Undecodable relay frame");
                }
                Some(Ok(Message::Close(_))) | None => bail!("relay closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Asserts that nothing arrives within `ms`.
    pub async fn expect_silence(&mut self, ms: u64) -> Result<()> {
        match tokio::time::timeout(Duration::from_millis(ms), self.read.next()).await {
            Err(_) => Ok(()),
            Ok(frame) => bail!("unexpected frame: {:?}", frame),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.write.close().await.context("Failed to close")
    }
}
