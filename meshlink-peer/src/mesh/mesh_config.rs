use crate::link::DEFAULT_CANDIDATE_CAPACITY;
use meshlink_core::RoomId;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub room_id: RoomId,
    /// Application-level user id announced with `join-room` and signals.
    pub user_id: Option<String>,
    /// How long the impolite side of a new pair waits for the newcomer's
    /// offer before sending its own. `None` disables the backup offer.
    pub backup_offer_after: Option<Duration>,
    /// Link failures tolerated per peer before it is reported unreachable.
    pub max_link_attempts: u32,
    pub candidate_capacity: usize,
}

impl MeshConfig {
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: None,
            backup_offer_after: Some(Duration::from_secs(3)),
            max_link_attempts: 3,
            candidate_capacity: DEFAULT_CANDIDATE_CAPACITY,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
