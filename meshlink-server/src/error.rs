use meshlink_core::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("room '{0}' stopped before accepting the command")]
    RoomClosed(RoomId),

    #[error("room '{0}' dropped the reply")]
    NoReply(RoomId),
}
