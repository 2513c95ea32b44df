//! Signaling relay: rooms of participants exchanging directed
//! offer/answer/candidate messages over WebSocket.

pub mod config;
pub mod error;
pub mod room;
pub mod router;
pub mod signaling;

pub use config::RelayConfig;
pub use error::RelayError;
pub use room::*;
pub use router::{RelayState, build_router, serve};
pub use signaling::*;
