use crate::model::participant::Participant;
use crate::model::room::RoomId;
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Opaque session description produced by the media layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    #[serde(default)]
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Description that discards the pending local offer when set locally.
    pub fn rollback() -> Self {
        Self {
            sdp_type: SdpType::Rollback,
            sdp: String::new(),
        }
    }
}

/// Opaque connectivity candidate (trickle ICE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Wire form of a directed signal. The relay forwards it untouched apart from
/// stamping the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("{0:?} signal carries no description")]
    MissingDescription(SignalKind),

    #[error("ice-candidate signal carries no candidate")]
    MissingCandidate,

    #[error("{kind:?} signal carries a {sdp_type:?} description")]
    DescriptionMismatch { kind: SignalKind, sdp_type: SdpType },
}

/// Typed view of a [`SignalEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Offer(_) => SignalKind::Offer,
            Signal::Answer(_) => SignalKind::Answer,
            Signal::Candidate(_) => SignalKind::IceCandidate,
        }
    }

    pub fn into_envelope(self, user_id: Option<String>) -> SignalEnvelope {
        let kind = self.kind();
        let (description, candidate) = match self {
            Signal::Offer(d) | Signal::Answer(d) => (Some(d), None),
            Signal::Candidate(c) => (None, Some(c)),
        };
        SignalEnvelope {
            kind,
            description,
            candidate,
            user_id,
        }
    }
}

impl TryFrom<SignalEnvelope> for Signal {
    type Error = SignalError;

    fn try_from(envelope: SignalEnvelope) -> Result<Self, Self::Error> {
        match envelope.kind {
            SignalKind::Offer => {
                let description = envelope
                    .description
                    .ok_or(SignalError::MissingDescription(SignalKind::Offer))?;
                if description.sdp_type != SdpType::Offer {
                    return Err(SignalError::DescriptionMismatch {
                        kind: SignalKind::Offer,
                        sdp_type: description.sdp_type,
                    });
                }
                Ok(Signal::Offer(description))
            }
            SignalKind::Answer => {
                let description = envelope
                    .description
                    .ok_or(SignalError::MissingDescription(SignalKind::Answer))?;
                if !matches!(description.sdp_type, SdpType::Answer | SdpType::Pranswer) {
                    return Err(SignalError::DescriptionMismatch {
                        kind: SignalKind::Answer,
                        sdp_type: description.sdp_type,
                    });
                }
                Ok(Signal::Answer(description))
            }
            SignalKind::IceCandidate => envelope
                .candidate
                .map(Signal::Candidate)
                .ok_or(SignalError::MissingCandidate),
        }
    }
}

/// Frames sent by a participant to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    JoinRoom {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Signal {
        room_id: RoomId,
        to: SessionId,
        #[serde(flatten)]
        envelope: SignalEnvelope,
    },
    Ping,
}

/// Frames sent by the relay to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// First frame on every connection.
    Welcome {
        session_id: SessionId,
        ice_servers: Vec<IceServerConfig>,
    },
    /// Current membership, sent to a joiner right after `join-room`.
    Peers {
        room_id: RoomId,
        peers: Vec<Participant>,
    },
    PeerJoined {
        room_id: RoomId,
        #[serde(flatten)]
        peer: Participant,
    },
    PeerLeft {
        room_id: RoomId,
        peer_id: SessionId,
    },
    Signal {
        room_id: RoomId,
        from: SessionId,
        #[serde(flatten)]
        envelope: SignalEnvelope,
    },
    Pong,
    /// Only for frames the relay could not parse.
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            ServerMessage::Peers { room_id, .. }
            | ServerMessage::PeerJoined { room_id, .. }
            | ServerMessage::PeerLeft { room_id, .. }
            | ServerMessage::Signal { room_id, .. } => Some(room_id),
            ServerMessage::Welcome { .. } | ServerMessage::Pong | ServerMessage::Error { .. } => {
                None
            }
        }
    }
}
