use crate::link::NegotiationState;
use meshlink_core::{SessionId, SignalError};
use thiserror::Error;

/// Failure reported by the media layer. Fatal to the link it happened on.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{operation} failed: {reason}")]
    Operation {
        operation: &'static str,
        reason: String,
    },

    #[error("connection to {0} failed")]
    ConnectionFailed(SessionId),

    #[error("media session is closed")]
    Closed,
}

impl MediaError {
    pub fn operation(operation: &'static str, err: impl std::fmt::Display) -> Self {
        MediaError::Operation {
            operation,
            reason: err.to_string(),
        }
    }
}

/// Messages that do not fit the current state. Logged and dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("initiate is only valid from Idle, link is {0:?}")]
    InvalidInitiate(NegotiationState),

    #[error("answer received while {0:?}")]
    UnexpectedAnswer(NegotiationState),

    #[error("link is closed")]
    Closed,

    #[error("signal from {0}, who is not a member of the room")]
    UnknownParticipant(SessionId),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("relay closed the connection before sending welcome")]
    NoWelcome,

    #[error("timed out waiting for welcome")]
    WelcomeTimeout,

    #[error("undecodable relay frame: {0}")]
    Decode(#[from] serde_json::Error),
}
