use async_trait::async_trait;
use meshlink_core::{IceCandidate, RoomId, SessionDescription, SessionId};
use meshlink_peer::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentSignal {
    Offer { to: SessionId, sdp: String },
    Answer { to: SessionId, sdp: String },
    Ice { to: SessionId, candidate: String },
    Join { room: RoomId },
    Leave { room: RoomId },
}

/// Mock SignalingOutput that captures everything a link or mesh sends.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<SentSignal>,
    sent: Arc<Mutex<Vec<SentSignal>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            sent: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    pub async fn sent(&self) -> Vec<SentSignal> {
        self.sent.lock().await.clone()
    }

    pub async fn answers(&self) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| matches!(s, SentSignal::Answer { .. }))
            .count()
    }

    async fn push(&self, signal: SentSignal) {
        tracing::debug!("[MockSignaling] {:?}", signal);
        self.sent.lock().await.push(signal.clone());
        let _ = self.tx.send(signal);
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_offer(&self, _room: &RoomId, to: SessionId, offer: SessionDescription) {
        self.push(SentSignal::Offer { to, sdp: offer.sdp }).await;
    }

    async fn send_answer(&self, _room: &RoomId, to: SessionId, answer: SessionDescription) {
        self.push(SentSignal::Answer { to, sdp: answer.sdp }).await;
    }

    async fn send_ice(&self, _room: &RoomId, to: SessionId, candidate: IceCandidate) {
        self.push(SentSignal::Ice {
            to,
            candidate: candidate.candidate,
        })
        .await;
    }

    async fn join_room(&self, room: &RoomId, _user_id: Option<String>) {
        self.push(SentSignal::Join { room: room.clone() }).await;
    }

    async fn leave_room(&self, room: &RoomId) {
        self.push(SentSignal::Leave { room: room.clone() }).await;
    }
}
