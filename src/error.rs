//! Error types for HTSP connection operations.

use std::io;

use crate::codec::CodecError;

/// Errors emitted by [`crate::HtspConnection`].
#[derive(Debug, thiserror::Error)]
pub enum HtspError {
    /// Transport error on the underlying socket.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// Framing or field-level protocol damage; fatal for the connection.
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),
    /// The connection stopped (peer closed, fault, or explicit `stop()`)
    /// before the operation completed.
    #[error("connection closed")]
    ConnectionClosed,
    /// An operation that needs a live pipeline was called before `open()`.
    #[error("connection not open")]
    NotConnected,
    /// The server's handshake response is missing a required field.
    #[error("malformed {method} response: missing field `{field}`")]
    Handshake {
        /// Method whose response was malformed.
        method: &'static str,
        /// Field the handshake requires.
        field: &'static str,
    },
}
