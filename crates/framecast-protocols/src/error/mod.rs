//! Error types shared between the engine and session layers.

mod engine;
mod session;

pub use engine::*;
pub use session::*;
