use async_trait::async_trait;
use meshlink_core::{ServerMessage, SessionId};

/// Implemented by whatever owns the participants' connections (the WebSocket
/// server in production, recorders in tests) so that rooms can reach members.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver one frame to a connected session. Delivery to a session that is
    /// no longer connected is logged and dropped.
    async fn deliver(&self, to: &SessionId, msg: ServerMessage);
}
