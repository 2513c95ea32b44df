use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use meshlink_core::{ServerMessage, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[derive(Default)]
struct SignalingInner {
    sessions: DashMap<SessionId, mpsc::UnboundedSender<ServerMessage>>,
}

/// Outbound queue of every live connection, keyed by session.
#[derive(Clone, Default)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, session_id: SessionId, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.inner.sessions.insert(session_id, tx);
    }

    pub fn remove_session(&self, session_id: &SessionId) {
        self.inner.sessions.remove(session_id);
    }

    pub fn is_connected(&self, session_id: &SessionId) -> bool {
        self.inner.sessions.contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn send(&self, session_id: &SessionId, msg: ServerMessage) {
        let Some(session) = self.inner.sessions.get(session_id) else {
            warn!("Attempted to send {:?} to disconnected session {}", msg, session_id);
            return;
        };

        if let Err(e) = session.send(msg) {
            error!("Failed to queue message to {}: {:?}", session_id, e.0);
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn deliver(&self, to: &SessionId, msg: ServerMessage) {
        self.send(to, msg);
    }
}
