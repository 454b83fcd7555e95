//! Asynchronous RPC bridge to a remote debugger.
//!
//! The debugger is reachable over a single streaming socket carrying
//! JSON envelopes in both directions. This crate turns that socket into
//! a request/reply interface: every command gets a unique id, replies
//! are correlated back to the caller that sent them, and unsolicited
//! server notifications (stop events, output, breakpoint validation)
//! are published on a separate channel.

pub mod client;
pub mod codec;
pub mod connection;
pub mod events;
pub mod messages;
pub(crate) mod request_store;
pub mod requests;
pub mod types;

/// The default address the remote debugger listens on.
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8455;

pub use client::{ClientHandle, ClientMessage, TransportError};
pub use connection::{ConnectConfig, ConnectionState};
pub use events::LifecycleEvent;
pub use messages::{Envelope, Inbound};
pub use requests::{RequestBody, UiAction};
