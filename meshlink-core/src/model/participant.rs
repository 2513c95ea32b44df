use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};

/// A member of a room: one live connection, optionally tagged with the
/// application-level user it belongs to. The user id may repeat across
/// sessions (multi-device) and plays no part in negotiation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(rename = "peerId")]
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Participant {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            user_id: None,
        }
    }

    pub fn with_user(session_id: SessionId, user_id: impl Into<String>) -> Self {
        Self {
            session_id,
            user_id: Some(user_id.into()),
        }
    }
}
