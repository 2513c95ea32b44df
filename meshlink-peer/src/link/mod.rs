mod candidate_buffer;
mod link_command;
mod negotiator;
mod peer_link;

pub use candidate_buffer::*;
pub use link_command::*;
pub use negotiator::*;
pub use peer_link::*;
