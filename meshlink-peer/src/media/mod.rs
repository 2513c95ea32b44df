mod transport_config;
mod webrtc_media;

pub use transport_config::*;
pub use webrtc_media::*;

use crate::error::MediaError;
use async_trait::async_trait;
use meshlink_core::{IceCandidate, SessionDescription, SessionId};
use tokio::sync::mpsc;

/// Connection state as reported by the media layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Emitted by a media session on its own schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Trickle ICE: a local candidate to forward to the remote.
    LocalCandidate {
        peer: SessionId,
        candidate: IceCandidate,
    },
    StateChanged {
        peer: SessionId,
        state: ConnectionState,
    },
}

/// One media connection to one remote peer. Every operation may take an
/// unbounded amount of time.
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, MediaError>;

    async fn create_answer(&self) -> Result<SessionDescription, MediaError>;

    /// Also accepts a rollback description.
    async fn set_local_description(&self, description: SessionDescription)
    -> Result<(), MediaError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), MediaError>;

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError>;

    async fn close(&self) -> Result<(), MediaError>;
}

#[async_trait]
pub trait MediaFactory: Send + Sync {
    async fn create(
        &self,
        local: SessionId,
        remote: SessionId,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaSession>, MediaError>;
}
