mod membership;
mod membership_event;
mod room;
mod room_command;
mod room_manager;

pub use membership::*;
pub use membership_event::*;
pub use room::Room;
pub use room_command::*;
pub use room_manager::*;
