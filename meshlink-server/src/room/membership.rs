use meshlink_core::{Participant, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// `false` when the session was already a member; nothing changed.
    pub is_new: bool,
    /// Members other than the joiner, in join order.
    pub existing_members: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub was_member: bool,
    pub remaining_members: Vec<Participant>,
}

/// Membership set of one room. Insertion-ordered, one entry per session.
#[derive(Debug, Default, Clone)]
pub struct RoomMembers {
    members: Vec<Participant>,
}

impl RoomMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, participant: Participant) -> JoinOutcome {
        if self.contains(&participant.session_id) {
            return JoinOutcome {
                is_new: false,
                existing_members: self.others(&participant.session_id),
            };
        }

        let existing_members = self.members.clone();
        self.members.push(participant);

        JoinOutcome {
            is_new: true,
            existing_members,
        }
    }

    pub fn leave(&mut self, session_id: &SessionId) -> LeaveOutcome {
        let before = self.members.len();
        self.members.retain(|m| &m.session_id != session_id);

        LeaveOutcome {
            was_member: self.members.len() != before,
            remaining_members: self.members.clone(),
        }
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.members.iter().any(|m| &m.session_id == session_id)
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&Participant> {
        self.members.iter().find(|m| &m.session_id == session_id)
    }

    pub fn others(&self, session_id: &SessionId) -> Vec<Participant> {
        self.members
            .iter()
            .filter(|m| &m.session_id != session_id)
            .cloned()
            .collect()
    }

    pub fn list(&self) -> &[Participant] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
