//! The debug session: debugger-control operations over the bridge and
//! reactions to its lifecycle notifications.

use std::sync::{Arc, Mutex};

use eyre::WrapErr;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use transport::requests::{self, RequestBody, UiAction};
use transport::types::{Breakpoint, StackListing, Variable};
use transport::{ClientHandle, ConnectConfig, LifecycleEvent, DEFAULT_HOST, DEFAULT_PORT};

use crate::state::{apply_event, SessionEvent, SessionState};

/// A debug session bound to one remote debugger address.
///
/// The session subscribes to the bridge's event channel at construction,
/// before any connection attempt, so no notification can be missed.
pub struct Session {
    client: ClientHandle,
    host: String,
    port: u16,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Binds to the default debugger address.
    pub fn new() -> Self {
        Self::with_addr(DEFAULT_HOST, DEFAULT_PORT)
    }

    pub fn with_addr(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(host, port, ConnectConfig::default())
    }

    pub fn with_config(host: impl Into<String>, port: u16, config: ConnectConfig) -> Self {
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(64);
        let client = ClientHandle::new(config, lifecycle_tx);
        let state = Arc::new(Mutex::new(SessionState::Uninitialized));
        let (events, _) = broadcast::channel(64);
        tokio::spawn(run_events(lifecycle_rx, Arc::clone(&state), events.clone()));
        Self {
            client,
            host: host.into(),
            port,
            state,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Connects to the debugger, retrying until it is reachable or
    /// [`disconnect`](Self::disconnect) is called.
    #[tracing::instrument(skip(self))]
    pub async fn attach(&self) -> eyre::Result<()> {
        self.ensure_active()?;
        {
            let mut state = self.state.lock().unwrap();
            if *state == SessionState::Uninitialized {
                *state = SessionState::Initializing;
            }
        }
        self.client
            .attach(&self.host, self.port)
            .await
            .wrap_err("attaching to debugger")?;
        let mut state = self.state.lock().unwrap();
        if !state.is_terminal() {
            *state = SessionState::Running;
        }
        Ok(())
    }

    /// Stops any scheduled reconnect and closes the connection.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Removes all remote breakpoints for `path`. Fire-and-forget.
    pub async fn clear_breakpoints(&self, path: &str) -> eyre::Result<()> {
        self.ensure_active()?;
        self.client
            .execute(RequestBody::ClearBreakpoints(requests::ClearBreakpoints {
                path: path.to_owned(),
            }))
            .await
            .wrap_err("clearing breakpoints")
    }

    /// Sets a breakpoint and waits for the debugger to verify it,
    /// returning the verified flag, resolved line and identifier.
    #[tracing::instrument(skip(self))]
    pub async fn set_breakpoint(&self, path: &str, line: i64) -> eyre::Result<Breakpoint> {
        self.ensure_active()?;
        let reply = self
            .client
            .send(RequestBody::SetBreakpoint(requests::SetBreakpoint {
                path: path.to_owned(),
                line,
            }))
            .await
            .wrap_err("setting breakpoint")?;
        serde_json::from_value(reply).wrap_err("decoding breakpoint record")
    }

    pub async fn stack(&self, start_frame: i64, end_frame: i64) -> eyre::Result<StackListing> {
        self.ensure_active()?;
        let reply = self
            .client
            .send(RequestBody::Stack(requests::Stack {
                start_frame,
                end_frame,
            }))
            .await
            .wrap_err("requesting stack")?;
        serde_json::from_value(reply).wrap_err("decoding stack listing")
    }

    pub async fn variables(&self, args: Option<Value>) -> eyre::Result<Vec<Variable>> {
        self.ensure_active()?;
        let reply = self
            .client
            .send(RequestBody::Variables(args))
            .await
            .wrap_err("requesting variables")?;
        serde_json::from_value(reply).wrap_err("decoding variables")
    }

    /// Evaluates an expression remotely. The result is returned as the
    /// debugger sent it.
    pub async fn evaluate(
        &self,
        expression: &str,
        context: Option<&str>,
        frame_id: Option<i64>,
    ) -> eyre::Result<Value> {
        self.ensure_active()?;
        self.client
            .send(RequestBody::Evaluate(requests::Evaluate {
                expression: expression.to_owned(),
                context: context.map(str::to_owned),
                frame_id,
            }))
            .await
            .wrap_err("evaluating expression")
    }

    /// Resume execution of the debuggee.
    pub async fn r#continue(&self) -> eyre::Result<()> {
        self.ui_action(UiAction::Continue).await
    }

    /// Resume execution backwards.
    pub async fn continue_reverse(&self) -> eyre::Result<()> {
        self.ui_action(UiAction::ContinueReverse).await
    }

    /// Step over a statement.
    pub async fn step_over(&self) -> eyre::Result<()> {
        self.ui_action(UiAction::StepOver).await
    }

    /// Step backwards one statement.
    pub async fn step_back(&self) -> eyre::Result<()> {
        self.ui_action(UiAction::StepBack).await
    }

    /// Step into a statement.
    pub async fn step_in(&self) -> eyre::Result<()> {
        self.ui_action(UiAction::StepIn).await
    }

    /// Step out of a statement.
    pub async fn step_out(&self) -> eyre::Result<()> {
        self.ui_action(UiAction::StepOut).await
    }

    /// Stepping and continuing are fire-and-forget: the debugger
    /// reports the outcome through a stop event, not a reply.
    async fn ui_action(&self, action: UiAction) -> eyre::Result<()> {
        self.ensure_active()?;
        self.client
            .execute(RequestBody::UiAction(action))
            .await
            .wrap_err_with(|| format!("requesting {action:?}"))?;
        let mut state = self.state.lock().unwrap();
        if !state.is_terminal() {
            *state = SessionState::Running;
        }
        Ok(())
    }

    fn ensure_active(&self) -> eyre::Result<()> {
        if self.state().is_terminal() {
            eyre::bail!("session has terminated");
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_events(
    mut lifecycle: mpsc::Receiver<LifecycleEvent>,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
) {
    while let Some(event) = lifecycle.recv().await {
        tracing::debug!(?event, "handling lifecycle event");
        let surfaced = {
            let mut state = state.lock().unwrap();
            let (next, surfaced) = apply_event(*state, event);
            *state = next;
            surfaced
        };
        if let Some(event) = surfaced {
            // no subscribers is fine
            let _ = events.send(event);
        }
    }
}
