//! Participant side of the mesh: one negotiated media link per remote member
//! of a room, kept alive across joins, leaves and re-syncs.

pub mod error;
pub mod link;
pub mod media;
pub mod mesh;
pub mod signaling;

pub use error::*;
pub use link::*;
pub use media::*;
pub use mesh::*;
pub use signaling::*;
