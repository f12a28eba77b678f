//! Error types for the wire codec.
//!
//! Framing and field-level decode failures are fatal for a connection: the
//! tag scheme carries no synchronization marks, so a single misparse poisons
//! every subsequent frame boundary. The connection engine therefore treats
//! any [`CodecError`] as grounds for teardown rather than attempting to
//! resynchronize the stream.

use std::io;

use thiserror::Error;

/// Errors raised while encoding or decoding HTSP frames and fields.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A field carried a type tag outside the five legal values.
    #[error("unknown field type tag {tag:#04x}")]
    UnknownTag {
        /// Tag byte found on the wire.
        tag: u8,
    },

    /// A declared length exceeds the bytes actually present.
    ///
    /// Frame bodies have a fixed length, so a field header that promises
    /// more bytes than remain cannot be satisfied by waiting for input.
    #[error("truncated field: declared {declared} bytes, {available} available")]
    Truncated {
        /// Bytes the header declared.
        declared: usize,
        /// Bytes remaining in the enclosing body.
        available: usize,
    },

    /// An integer body wider than 64 bits.
    #[error("integer body of {len} bytes exceeds 64 bits")]
    IntTooWide {
        /// Length of the offending body.
        len: usize,
    },

    /// A string field or field name that is not valid UTF-8.
    #[error("invalid UTF-8 in field data")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A field name longer than the one-byte name length can express.
    #[error("field name of {len} bytes exceeds the 255-byte limit")]
    NameTooLong {
        /// Length of the offending name.
        len: usize,
    },

    /// An encoded body longer than the four-byte length prefix can express.
    #[error("field body of {len} bytes exceeds the u32 length prefix")]
    BodyTooLarge {
        /// Length of the offending body.
        len: usize,
    },

    /// A frame longer than the configured maximum.
    ///
    /// Guards both directions: inbound it bounds memory committed on the
    /// strength of an unauthenticated length prefix, outbound it catches
    /// requests that could never be delivered.
    #[error("frame of {size} bytes exceeds the configured maximum of {max}")]
    FrameTooLarge {
        /// Size the length prefix declared, or the encoded size.
        size: usize,
        /// Configured maximum frame length.
        max: usize,
    },

    /// Transport error surfaced through the framed read/write path.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Returns the error category as a string for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTag { .. } => "unknown-tag",
            Self::Truncated { .. } => "truncated",
            Self::IntTooWide { .. } => "int-too-wide",
            Self::InvalidUtf8(_) => "invalid-utf8",
            Self::NameTooLong { .. } => "name-too-long",
            Self::BodyTooLarge { .. } => "body-too-large",
            Self::FrameTooLarge { .. } => "frame-too-large",
            Self::Io(_) => "io",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
