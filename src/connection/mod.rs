//! The HTSP connection engine.
//!
//! [`HtspConnection`] owns the TCP socket and runs the four pipeline stage
//! tasks (receive, frame-assemble, dispatch, send) behind a small async API:
//! `open`, `authenticate`, `request`, `send`, `stop`. Correlated responses
//! complete a per-request oneshot; unsolicited traffic is delivered to the
//! [`HtspListener`](crate::push::HtspListener) supplied at construction.

mod config;
mod handshake;
mod pipeline;
mod registry;
mod state;

pub use config::{
    ConnectionConfig,
    DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RETRY_INTERVAL,
    HTSP_VERSION,
};
pub use handshake::SessionInfo;
pub use state::ConnectionState;

use std::sync::{Arc, RwLock};

use log::warn;
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc, oneshot, watch},
    time::sleep,
};

use self::{pipeline::Pipeline, registry::ResponseRegistry, state::StatePublisher};
use crate::{
    codec::FrameCodec,
    error::HtspError,
    message::{Message, SEQ_FIELD},
    metrics,
    push::HtspListener,
};

/// An HTSP client connection.
///
/// All methods take `&self`; the connection is shared across callers behind
/// an [`Arc`]. A pipeline fault aborts every pending `request` (each caller
/// observes [`HtspError::ConnectionClosed`]), cancels the stage tasks,
/// publishes [`ConnectionState::ErrorStopped`], and then invokes the
/// listener's `on_error`; calling [`open`](Self::open) afterwards builds a
/// fresh pipeline on the same handle.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use htsp::{ConnectionConfig, HtspConnection, HtspError, push::NullListener};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), HtspError> {
/// let config = ConnectionConfig::new("tvheadend.local", 9982).credentials("viewer", "secret");
/// let conn = HtspConnection::new(config, Arc::new(NullListener));
/// conn.open().await?;
/// if conn.authenticate().await? {
///     println!("connected to {:?}", conn.server_name());
/// }
/// # Ok(())
/// # }
/// ```
pub struct HtspConnection {
    config: ConnectionConfig,
    registry: Arc<ResponseRegistry>,
    listener: Arc<dyn HtspListener>,
    state: StatePublisher,
    pipeline: Mutex<Option<Pipeline>>,
    session: RwLock<Option<SessionInfo>>,
}

impl std::fmt::Debug for HtspConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtspConnection")
            .field("host", &self.config.host())
            .field("port", &self.config.port())
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

impl HtspConnection {
    /// Create an unopened connection for `config`, delivering unsolicited
    /// messages and faults to `listener`.
    #[must_use]
    pub fn new(config: ConnectionConfig, listener: Arc<dyn HtspListener>) -> Self {
        Self {
            config,
            registry: Arc::new(ResponseRegistry::default()),
            listener,
            state: StatePublisher::new(),
            pipeline: Mutex::new(None),
            session: RwLock::new(None),
        }
    }

    /// Connect to the server and start the pipeline.
    ///
    /// Idempotent while the pipeline is live. Connect failures are retried
    /// on the configured interval without bound; the engine is built for a
    /// long-lived service whose server may not be up yet. The retry loop
    /// runs without holding internal locks, so `stop()` stays callable and
    /// cancels an in-progress `open()`.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError::ConnectionClosed`] if `stop()` is called while
    /// the connect is still retrying, or an I/O error from socket
    /// configuration after a successful connect.
    pub async fn open(&self) -> Result<(), HtspError> {
        {
            let mut guard = self.pipeline.lock().await;
            if let Some(pipeline) = guard.as_ref() {
                if !pipeline.token.is_cancelled() {
                    return Ok(());
                }
            }
            // A faulted pipeline leaves its handle behind; reap it and fail
            // any request still awaiting a response on it.
            if let Some(stale) = guard.take() {
                stale.token.cancel();
                stale.tracker.wait().await;
                metrics::dec_connections();
                self.registry.abort_all();
            }
            self.state.set(ConnectionState::Opening);
        }

        let stream = loop {
            match TcpStream::connect((self.config.host(), self.config.port())).await {
                Ok(stream) => break stream,
                Err(err) => {
                    warn!(
                        "connect to {}:{} failed ({err}), retrying in {:?}",
                        self.config.host(),
                        self.config.port(),
                        self.config.retry_interval_value(),
                    );
                    sleep(self.config.retry_interval_value()).await;
                    if self.state.current() != ConnectionState::Opening {
                        return Err(HtspError::ConnectionClosed);
                    }
                }
            }
        };
        stream.set_nodelay(true)?;

        let mut guard = self.pipeline.lock().await;
        if let Some(pipeline) = guard.as_ref() {
            // A concurrent open() won the race; keep its pipeline.
            if !pipeline.token.is_cancelled() {
                return Ok(());
            }
        }
        if self.state.current() != ConnectionState::Opening {
            // stop() ran between the connect and here.
            return Err(HtspError::ConnectionClosed);
        }
        let (reader, writer) = stream.into_split();

        let codec = FrameCodec::new(self.config.max_frame_len_value());
        *guard = Some(pipeline::spawn(
            reader,
            writer,
            codec,
            self.config.queue_capacity_value(),
            Arc::clone(&self.registry),
            Arc::clone(&self.listener),
            self.state.clone(),
        ));
        metrics::inc_connections();
        self.state.set(ConnectionState::Connected);
        Ok(())
    }

    /// Perform the `hello`/`authenticate` handshake.
    ///
    /// On success queries disk space, sends the fire-and-forget
    /// `enableAsyncMetadata` (after which the server starts pushing
    /// unsolicited state), records the negotiated [`SessionInfo`], and
    /// publishes [`ConnectionState::Authenticated`]. Returns `Ok(false)` when
    /// the server denies access; the connection stays open.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError`] if the connection is not open, drops mid
    /// handshake, or the `hello` response is malformed.
    pub async fn authenticate(&self) -> Result<bool, HtspError> {
        let hello = self.request(handshake::hello_request(&self.config)).await?;
        let (mut session, challenge) = handshake::parse_hello(&hello)?;

        let grant = self
            .request(handshake::authenticate_request(&self.config, &challenge))
            .await?;
        if !handshake::access_granted(&grant) {
            warn!("server denied access for user {}", self.config.username());
            return Ok(false);
        }

        let disk = self.request(Message::request("getDiskSpace")).await?;
        session.disk_space = handshake::disk_space_string(&disk);
        self.send(Message::request("enableAsyncMetadata")).await?;

        *self.session.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(session);
        self.state.set(ConnectionState::Authenticated);
        Ok(true)
    }

    /// Send `message` and await its correlated response.
    ///
    /// A sequence number is assigned and stamped onto the message; the
    /// response that echoes it completes this future. Safe to call
    /// concurrently; submission order is preserved by the single send task.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError::NotConnected`] before `open()`, or
    /// [`HtspError::ConnectionClosed`] if the pipeline stops before the
    /// response arrives.
    pub async fn request(&self, mut message: Message) -> Result<Message, HtspError> {
        let (tx, rx) = oneshot::channel();
        let seq = self.registry.register(tx);
        message.insert(SEQ_FIELD, seq);
        self.enqueue(message).await?;
        rx.await.map_err(|_| HtspError::ConnectionClosed)
    }

    /// Send `message` without expecting a correlated response.
    ///
    /// No sequence number is attached, so the server's un-sequenced ack (if
    /// any) lands on the log-only path rather than the missing-handler
    /// anomaly.
    ///
    /// # Errors
    ///
    /// Returns [`HtspError::NotConnected`] before `open()`, or
    /// [`HtspError::ConnectionClosed`] if the pipeline has stopped.
    pub async fn send(&self, message: Message) -> Result<(), HtspError> {
        self.enqueue(message).await
    }

    async fn enqueue(&self, message: Message) -> Result<(), HtspError> {
        let send_tx = {
            let guard = self.pipeline.lock().await;
            let pipeline = guard.as_ref().ok_or(HtspError::NotConnected)?;
            pipeline.send_tx.clone()
        };
        send_tx
            .send(message)
            .await
            .map_err(|mpsc::error::SendError(_)| HtspError::ConnectionClosed)
    }

    /// Stop the pipeline, close the socket, and abort pending requests.
    ///
    /// Cooperative: the cancellation token unblocks every stage, the tasks
    /// are awaited, and each awaiting `request` caller observes
    /// [`HtspError::ConnectionClosed`]. The handle is reusable: `open()`
    /// builds a fresh pipeline.
    pub async fn stop(&self) {
        let mut guard = self.pipeline.lock().await;
        if let Some(pipeline) = guard.take() {
            pipeline.token.cancel();
            pipeline.tracker.wait().await;
            metrics::dec_connections();
        }
        self.registry.abort_all();
        *self.session.write().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        self.state.set(ConnectionState::ErrorStopped);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { self.state.current() }

    /// Subscribe to lifecycle state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> { self.state.subscribe() }

    /// Facts negotiated by the last successful `authenticate`.
    #[must_use]
    pub fn session(&self) -> Option<SessionInfo> {
        self.session
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// HTSP protocol revision the server speaks, once authenticated.
    #[must_use]
    pub fn server_protocol_version(&self) -> Option<i64> {
        self.session().map(|s| s.protocol_version)
    }

    /// Server software name, once authenticated.
    #[must_use]
    pub fn server_name(&self) -> Option<String> { self.session().map(|s| s.server_name) }

    /// Server software version, once authenticated.
    #[must_use]
    pub fn server_version(&self) -> Option<String> { self.session().map(|s| s.server_version) }

    /// Human-readable recording disk usage, once authenticated.
    #[must_use]
    pub fn disk_space(&self) -> Option<String> { self.session().and_then(|s| s.disk_space) }
}
