//! # Framecast Protocols
//!
//! Shared protocol definitions for the framecast streaming server.
//! Contains only interface definitions - no implementations.
//!
//! ## Contents
//!
//! - [`RenderEngine`] / [`PageHandle`] - the render engine adapter seam
//! - [`ClientCommand`] - inbound commands sent by a connected client
//! - [`SessionEvent`] - outbound events streamed back to the client
//! - [`Viewport`] - page dimensions with positive-only override rules
//! - [`SessionError`] / [`EngineError`] - the error taxonomy

pub mod command;
pub mod engine;
pub mod error;
pub mod event;
pub mod types;

pub use command::{ClientCommand, InputAction, InputEvent, NavigateRequest, ResizeRequest, StartSessionRequest};
pub use engine::{CaptureOptions, LaunchOptions, PageHandle, RenderEngine, WaitPolicy};
pub use error::{EngineError, SessionError};
pub use event::{PageEvent, SessionEvent};
pub use types::Viewport;
