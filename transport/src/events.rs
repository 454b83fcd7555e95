//! Server-originated lifecycle notifications.

use serde_json::Value;

use crate::types::Breakpoint;

/// An unsolicited notification about debuggee execution state.
///
/// Replaces the original protocol's stringly-typed event names with a
/// tagged union; the wire names are preserved in [`from_wire`].
///
/// [`from_wire`]: LifecycleEvent::from_wire
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    StopOnEntry,
    StopOnStepOver,
    StopOnStepIn,
    StopOnStepOut,
    StopOnBreakpoint,
    StopOnException,
    BreakpointValidated(Breakpoint),
    /// Debuggee output; the arguments are forwarded verbatim.
    Output(Option<Value>),
    End,
}

impl LifecycleEvent {
    /// Maps a wire-level event name and its arguments onto the typed
    /// event. Unknown names (and a `breakpointValidated` without a
    /// parseable breakpoint record) return `None` and are dropped by
    /// the dispatcher.
    pub fn from_wire(event: &str, args: Option<Value>) -> Option<Self> {
        let event = match event {
            "stopOnEntry" => Self::StopOnEntry,
            "stopOnStepOver" => Self::StopOnStepOver,
            "stopOnStepIn" => Self::StopOnStepIn,
            "stopOnStepOut" => Self::StopOnStepOut,
            "stopOnBreakpoint" => Self::StopOnBreakpoint,
            "stopOnException" => Self::StopOnException,
            "breakpointValidated" => {
                let breakpoint = serde_json::from_value(args?).ok()?;
                Self::BreakpointValidated(breakpoint)
            }
            "output" => Self::Output(args),
            "end" => Self::End,
            _ => return None,
        };
        Some(event)
    }
}
