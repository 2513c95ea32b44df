mod mesh;
mod mesh_config;
mod mesh_event;

pub use mesh::*;
pub use mesh_config::*;
pub use mesh_event::*;
