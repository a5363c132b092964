//! CDP page session, split by concern.

mod core;
mod emulation;
mod input;
mod navigation;

pub use self::core::PageSession;
