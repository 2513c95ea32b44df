mod participant;
mod room;
mod session;
mod signaling;

pub use participant::Participant;
pub use room::RoomId;
pub use session::SessionId;
pub use signaling::{
    ClientMessage, IceCandidate, IceServerConfig, SdpType, ServerMessage, SessionDescription,
    Signal, SignalEnvelope, SignalError, SignalKind,
};
