//! # Framecast Session
//!
//! The per-connection remote session controller. A [`Session`] owns at most
//! one live page handle, runs a self-pacing capture loop while streaming, and
//! releases everything deterministically on stop, restart and destroy.
//!
//! Every mutating operation runs under one async mutex. Restarts and stops
//! additionally bump a generation counter *without* the lock, which is how a
//! long-running start or a capture tick learns that its work is stale.

mod capture;
mod forward;
mod options;
mod session;
mod sink;
mod state;

pub use options::SessionOptions;
pub use session::{Session, StartOutcome, StartTicket};
pub use sink::{Delivery, EventSink};
pub use state::SessionState;
