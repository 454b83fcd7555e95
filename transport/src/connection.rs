//! Connection lifecycle: establish, retry, disconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::EnvelopeCodec;

/// Observable state of the single transport connection. Owned by the
/// bridge actor; everything else watches it through a
/// [`watch::Receiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Disconnecting,
    /// An established connection was lost. In-flight requests cannot be
    /// replayed, so commands fail until a fresh attach.
    Failed,
}

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Delay between attempts that fail before a handshake succeeds.
    pub retry_delay: Duration,
    /// Upper bound on how long a single connection attempt may hang.
    pub handshake_timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

pub(crate) type FrameStream = FramedRead<OwnedReadHalf, EnvelopeCodec>;
pub(crate) type FrameSink = FramedWrite<OwnedWriteHalf, EnvelopeCodec>;

pub(crate) struct Connector {
    config: ConnectConfig,
    state_tx: watch::Sender<ConnectionState>,
    disconnecting: Arc<AtomicBool>,
}

impl Connector {
    pub(crate) fn new(
        config: ConnectConfig,
        state_tx: watch::Sender<ConnectionState>,
        disconnecting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            state_tx,
            disconnecting,
        }
    }

    /// Connects to the debugger, retrying after `retry_delay` for as
    /// long as attempts fail before the handshake completes. Returns
    /// `None` when a disconnect is requested mid-retry; the pending
    /// attach then resolves without a connection.
    pub(crate) async fn establish(&self, host: &str, port: u16) -> Option<(FrameStream, FrameSink)> {
        loop {
            if self.disconnecting.load(Ordering::SeqCst) {
                self.set_state(ConnectionState::Disconnected);
                return None;
            }

            self.set_state(ConnectionState::Connecting);
            match tokio::time::timeout(self.config.handshake_timeout, TcpStream::connect((host, port)))
                .await
            {
                Ok(Ok(stream)) => {
                    tracing::info!(%host, port, "connected to debugger");
                    let (read, write) = stream.into_split();
                    self.set_state(ConnectionState::Connected);
                    return Some((
                        FramedRead::new(read, EnvelopeCodec),
                        FramedWrite::new(write, EnvelopeCodec),
                    ));
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "connection attempt failed");
                }
                Err(_) => {
                    tracing::warn!(
                        timeout = ?self.config.handshake_timeout,
                        "connection attempt timed out"
                    );
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            tracing::info!(delay = ?self.config.retry_delay, "retrying connection to debugger");
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}
