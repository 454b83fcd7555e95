//! High level debug session on top of the transport bridge.
mod session;
mod state;

pub use session::Session;
pub use state::{SessionEvent, SessionState, StopReason};
pub use transport::types::{Breakpoint, StackFrame, StackListing, Variable};
