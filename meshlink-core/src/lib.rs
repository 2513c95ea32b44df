//! Identifiers, wire protocol and the politeness tie-break shared by the relay
//! and by participants.

pub mod model;
pub mod politeness;

pub use model::*;
pub use politeness::{Role, is_polite};
