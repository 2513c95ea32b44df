mod signaling_output;
mod ws_client;

pub use signaling_output::*;
pub use ws_client::*;
