use crate::room::membership::{JoinOutcome, LeaveOutcome};
use meshlink_core::{Participant, SessionId, SignalEnvelope};
use tokio::sync::oneshot;

/// Commands processed by a room, one at a time, in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    /// A session asks to join (or re-sync with) the room.
    Join {
        participant: Participant,
        reply: Option<oneshot::Sender<JoinOutcome>>,
    },

    /// A session leaves, explicitly or because its connection dropped.
    Leave {
        session_id: SessionId,
        reply: Option<oneshot::Sender<LeaveOutcome>>,
    },

    /// Directed signal between two members.
    Signal {
        from: SessionId,
        to: SessionId,
        envelope: SignalEnvelope,
    },

    /// Current member list, in join order.
    Snapshot {
        reply: oneshot::Sender<Vec<Participant>>,
    },
}
