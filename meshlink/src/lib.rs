pub use meshlink_core::{RoomId, SessionId, is_polite};

pub mod model {
    pub use meshlink_core::model::*;
    pub use meshlink_core::politeness::Role;
}

#[cfg(feature = "server")]
pub mod server {
    pub use meshlink_server::*;
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use meshlink_peer::*;
}
