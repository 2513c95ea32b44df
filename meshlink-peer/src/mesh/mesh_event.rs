use crate::link::NegotiationState;
use crate::media::ConnectionState;
use meshlink_core::{Participant, SessionId};

/// Application-facing events of one mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    MemberJoined(Participant),
    MemberLeft(Participant),
    Negotiation {
        peer: SessionId,
        state: NegotiationState,
    },
    Connection {
        peer: SessionId,
        state: ConnectionState,
    },
    LinkFailed {
        peer: SessionId,
        attempt: u32,
        reason: String,
    },
    /// The link to `peer` failed `attempts` times; no further re-sync is tried.
    PeerUnreachable {
        peer: SessionId,
        attempts: u32,
    },
}
