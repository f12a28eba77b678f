//! Connection lifecycle state.

use tokio::sync::watch;

/// Lifecycle state of an [`HtspConnection`](super::HtspConnection).
///
/// `ErrorStopped` is terminal for a pipeline: explicit `stop()` and stage
/// faults both land here, and a fresh `open()` is required afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connect attempt has been made yet.
    #[default]
    Unopened,
    /// `open()` is retrying the TCP connect.
    Opening,
    /// The socket is up and the pipeline is running.
    Connected,
    /// The `hello`/`authenticate` handshake succeeded.
    Authenticated,
    /// The pipeline has been torn down; `open()` must be called again.
    ErrorStopped,
}

/// Publishes state transitions on a watch channel so consumers can await
/// "connected" without polling.
#[derive(Clone, Debug)]
pub(super) struct StatePublisher {
    tx: watch::Sender<ConnectionState>,
}

impl StatePublisher {
    pub(super) fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Unopened);
        Self { tx }
    }

    pub(super) fn set(&self, state: ConnectionState) {
        // send_replace delivers even when no subscriber is listening yet.
        self.tx.send_replace(state);
    }

    pub(super) fn current(&self) -> ConnectionState { *self.tx.borrow() }

    pub(super) fn subscribe(&self) -> watch::Receiver<ConnectionState> { self.tx.subscribe() }
}
