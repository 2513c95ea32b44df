use meshlink_core::{Participant, RoomId};

/// Membership changes published by the relay for other collaborators
/// (presence, UI). Emitted in the same step as the membership mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    MemberJoined {
        room_id: RoomId,
        participant: Participant,
    },
    MemberLeft {
        room_id: RoomId,
        participant: Participant,
    },
}

impl MembershipEvent {
    pub fn room_id(&self) -> &RoomId {
        match self {
            MembershipEvent::MemberJoined { room_id, .. }
            | MembershipEvent::MemberLeft { room_id, .. } => room_id,
        }
    }
}
