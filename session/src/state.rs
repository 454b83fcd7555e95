//! The session state machine and the events it surfaces.

use serde_json::Value;
use transport::types::Breakpoint;
use transport::LifecycleEvent;

/// `Uninitialized → Initializing → Running ⇄ Stopped → Terminated`.
///
/// Stops are driven exclusively by inbound stop events; `Running` is
/// entered on issuing continue/step; `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
    Terminated,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Entry,
    StepOver,
    StepIn,
    StepOut,
    Breakpoint,
    Exception,
}

/// What subscribers observe: debuggee stops, breakpoint validation,
/// output and termination.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Stopped(StopReason),
    BreakpointValidated(Breakpoint),
    Output(Option<Value>),
    Terminated,
}

/// Applies a debugger notification to the session state, returning the
/// next state and the event to surface, if any. Nothing moves the
/// session once it is terminal.
pub(crate) fn apply_event(
    state: SessionState,
    event: LifecycleEvent,
) -> (SessionState, Option<SessionEvent>) {
    if state.is_terminal() {
        return (state, None);
    }
    match event {
        LifecycleEvent::StopOnEntry => stopped(StopReason::Entry),
        LifecycleEvent::StopOnStepOver => stopped(StopReason::StepOver),
        LifecycleEvent::StopOnStepIn => stopped(StopReason::StepIn),
        LifecycleEvent::StopOnStepOut => stopped(StopReason::StepOut),
        LifecycleEvent::StopOnBreakpoint => stopped(StopReason::Breakpoint),
        LifecycleEvent::StopOnException => stopped(StopReason::Exception),
        LifecycleEvent::BreakpointValidated(breakpoint) => {
            (state, Some(SessionEvent::BreakpointValidated(breakpoint)))
        }
        LifecycleEvent::Output(args) => (state, Some(SessionEvent::Output(args))),
        LifecycleEvent::End => (SessionState::Terminated, Some(SessionEvent::Terminated)),
    }
}

fn stopped(reason: StopReason) -> (SessionState, Option<SessionEvent>) {
    (SessionState::Stopped, Some(SessionEvent::Stopped(reason)))
}
