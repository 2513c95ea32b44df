//! Tie-break for simultaneous offers.
//!
//! Both ends of a pair compute their role independently from the same two
//! session ids. The order used is the numeric order of the 128-bit ids: the
//! lower id is polite (yields on collision), the higher id is impolite (its
//! offer wins). Any total order would do; what matters is that both sides use
//! this one.

use crate::model::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Rolls back its own offer when one collides with the remote's.
    Polite,
    /// Ignores a colliding remote offer; its own offer survives.
    Impolite,
}

impl Role {
    pub fn for_pair(local: &SessionId, remote: &SessionId) -> Self {
        if is_polite(local, remote) {
            Role::Polite
        } else {
            Role::Impolite
        }
    }
}

/// `true` when `local` yields to `remote`. For distinct ids exactly one side
/// of the pair is polite. A session is never polite towards itself.
pub fn is_polite(local: &SessionId, remote: &SessionId) -> bool {
    local.as_u128() < remote.as_u128()
}
