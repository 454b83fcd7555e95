//! The bridge client: request correlation and inbound dispatch over a
//! single shared connection.
//!
//! The connection, the pending-request table and the dispatcher all
//! live in one actor task; [`ClientHandle`] is the cheap-to-clone front
//! that talks to it over channels. Callers suspend in exactly two
//! places: waiting for connection readiness, and (for correlated sends)
//! waiting for the matching reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::codec::CodecError;
use crate::connection::{ConnectConfig, ConnectionState, Connector, FrameSink, FrameStream};
use crate::events::LifecycleEvent;
use crate::messages::{Envelope, Inbound};
use crate::request_store::PendingRequests;
use crate::requests::RequestBody;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The debugger reported an application error for this one request.
    #[error("debugger error: {0}")]
    Remote(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// The reply for this request arrived but its content could not be
    /// decoded.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    #[error("not connected to a debugger")]
    NotConnected,
    #[error("bridge task has shut down")]
    Closed,
}

#[derive(Debug)]
pub enum ClientMessage {
    Attach {
        host: String,
        port: u16,
        done: oneshot::Sender<Result<(), TransportError>>,
    },
    Send {
        request: RequestBody,
        respond_to: oneshot::Sender<Result<Value, TransportError>>,
    },
    Execute {
        request: RequestBody,
    },
    Disconnect,
}

/// Handle to the bridge actor.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<ClientMessage>,
    state: watch::Receiver<ConnectionState>,
    disconnecting: Arc<AtomicBool>,
}

impl ClientHandle {
    /// Spawns the bridge actor. Lifecycle events are published on
    /// `events`; subscribe before calling [`attach`](Self::attach) so
    /// no notification is missed.
    pub fn new(config: ConnectConfig, events: mpsc::Sender<LifecycleEvent>) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let disconnecting = Arc::new(AtomicBool::new(false));
        let client = Client {
            commands: commands_rx,
            events,
            connector: Connector::new(config, state_tx, Arc::clone(&disconnecting)),
            pending: PendingRequests::default(),
            stream: None,
            sink: None,
        };
        tokio::spawn(run_client(client));
        Self {
            commands: commands_tx,
            state: state_rx,
            disconnecting,
        }
    }

    /// Connects to the debugger. Resolves once a connection succeeds,
    /// retrying failed attempts indefinitely, or once a disconnect is
    /// requested during the retry window.
    #[tracing::instrument(skip(self))]
    pub async fn attach(&self, host: &str, port: u16) -> Result<(), TransportError> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(ClientMessage::Attach {
                host: host.to_owned(),
                port,
                done,
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    /// Sends a command and waits for the correlated reply. Any number
    /// of sends may be outstanding at once; replies are matched by id,
    /// not by send order.
    #[tracing::instrument(skip(self))]
    pub async fn send(&self, request: RequestBody) -> Result<Value, TransportError> {
        self.wait_ready().await?;
        let (respond_to, rx) = oneshot::channel();
        self.commands
            .send(ClientMessage::Send {
                request,
                respond_to,
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    /// Sends a fire-and-forget command. The frame still carries a fresh
    /// id for protocol uniformity but no reply is awaited.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, request: RequestBody) -> Result<(), TransportError> {
        self.wait_ready().await?;
        self.commands
            .send(ClientMessage::Execute { request })
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Suppresses any scheduled reconnect and closes the connection.
    /// Pending requests are failed rather than left to hang.
    pub async fn disconnect(&self) {
        self.disconnecting.store(true, Ordering::SeqCst);
        let _ = self.commands.send(ClientMessage::Disconnect).await;
    }

    /// Blocks until the connection is open. Fails instead of blocking
    /// once the connection has been lost or a disconnect was requested;
    /// a fresh [`attach`](Self::attach) clears the failure.
    pub async fn wait_ready(&self) -> Result<(), TransportError> {
        let mut state = self.state.clone();
        let disconnecting = Arc::clone(&self.disconnecting);
        let settled = state
            .wait_for(|s| {
                matches!(s, ConnectionState::Connected | ConnectionState::Failed)
                    || disconnecting.load(Ordering::SeqCst)
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        match *settled {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Failed => Err(TransportError::ConnectionLost(
                "connection to debugger failed".to_owned(),
            )),
            _ => Err(TransportError::NotConnected),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

struct Client {
    commands: mpsc::Receiver<ClientMessage>,
    events: mpsc::Sender<LifecycleEvent>,
    connector: Connector,
    pending: PendingRequests,
    stream: Option<FrameStream>,
    sink: Option<FrameSink>,
}

async fn run_client(mut client: Client) {
    loop {
        tokio::select! {
            command = client.commands.recv() => match command {
                Some(command) => client.handle_command(command).await,
                None => break,
            },
            frame = next_frame(&mut client.stream) => client.handle_frame(frame).await,
        }
    }
    tracing::debug!("bridge actor shutting down");
}

async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<Envelope, CodecError>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

impl Client {
    async fn handle_command(&mut self, command: ClientMessage) {
        match command {
            ClientMessage::Attach { host, port, done } => {
                if self.sink.is_some() {
                    let _ = done.send(Ok(()));
                    return;
                }
                match self.connector.establish(&host, port).await {
                    Some((stream, sink)) => {
                        self.stream = Some(stream);
                        self.sink = Some(sink);
                        let _ = done.send(Ok(()));
                    }
                    // disconnect requested mid-retry; resolve without a
                    // connection instead of failing the caller
                    None => {
                        let _ = done.send(Ok(()));
                    }
                }
            }
            ClientMessage::Send {
                request,
                respond_to,
            } => {
                let id = Uuid::new_v4().to_string();
                // registered before the frame hits the wire so a fast
                // reply always finds its entry
                self.pending.register(&id, respond_to);
                let envelope = Envelope::request(id.clone(), request);
                if let Err(e) = self.transmit(envelope).await {
                    match e {
                        TransportError::NotConnected => {
                            self.pending.resolve(&id, Err(TransportError::NotConnected));
                        }
                        other => self.fail_connection(&other.to_string()),
                    }
                }
            }
            ClientMessage::Execute { request } => {
                let envelope = Envelope::request(Uuid::new_v4().to_string(), request);
                if let Err(e) = self.transmit(envelope).await {
                    if !matches!(e, TransportError::NotConnected) {
                        self.fail_connection(&e.to_string());
                    }
                }
            }
            ClientMessage::Disconnect => {
                self.connector.set_state(ConnectionState::Disconnecting);
                self.stream = None;
                self.sink = None;
                self.pending.abandon_all("disconnected");
                self.connector.set_state(ConnectionState::Disconnected);
                tracing::debug!("disconnected from debugger");
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<Envelope, CodecError>>) {
        match frame {
            None => self.fail_connection("connection closed by debugger"),
            Some(Err(e)) => tracing::warn!(error = %e, "discarding malformed frame"),
            Some(Ok(envelope)) => {
                tracing::trace!(?envelope, "received frame");
                let id = envelope.id.clone();
                match envelope.classify() {
                    Ok(Inbound::Event { event, args }) => {
                        match LifecycleEvent::from_wire(&event, args) {
                            Some(lifecycle) => {
                                let _ = self.events.send(lifecycle).await;
                            }
                            None => tracing::debug!(%event, "dropping unsupported event"),
                        }
                    }
                    Ok(Inbound::Ping { id }) => {
                        if let Err(e) = self.transmit(Envelope::ping_reply(id)).await {
                            if !matches!(e, TransportError::NotConnected) {
                                self.fail_connection(&e.to_string());
                            }
                        }
                    }
                    Ok(Inbound::Reply { id, result }) => {
                        let result = result.map_err(TransportError::Remote);
                        if !self.pending.resolve(&id, result) {
                            tracing::trace!(%id, "no pending request for reply");
                        }
                    }
                    Ok(Inbound::Ignored) => tracing::debug!("ignoring unknown inbound frame"),
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding frame with malformed content");
                        // if it was a reply to a pending request, the
                        // caller still gets settled rather than hanging
                        self.pending
                            .resolve(&id, Err(TransportError::MalformedReply(e.to_string())));
                    }
                }
            }
        }
    }

    async fn transmit(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        tracing::debug!(?envelope, "sending message");
        sink.send(envelope)
            .await
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))
    }

    /// A failure on an established connection is fatal: in-flight
    /// requests cannot be replayed against a new connection, so every
    /// pending caller is failed and no reconnect is attempted. Later
    /// commands fail fast until a fresh attach succeeds.
    fn fail_connection(&mut self, reason: &str) {
        tracing::error!(%reason, "connection to debugger failed");
        self.stream = None;
        self.sink = None;
        self.pending.abandon_all(reason);
        self.connector.set_state(ConnectionState::Failed);
    }
}
