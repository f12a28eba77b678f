//! Wire codec for length-prefixed HTSP frames.
//!
//! A frame is a 4-byte big-endian unsigned length followed by exactly that
//! many bytes of serialized [`Message`] body. [`FrameCodec`] adapts the body
//! codec to `tokio_util`'s [`Decoder`]/[`Encoder`] pair for use with framed
//! stream halves; [`FrameAssembler`] drives the same decoder over manually
//! appended byte chunks, which is how the receive pipeline (and tests that
//! split streams at awkward offsets) consume it.

mod error;
mod wire;

pub use error::CodecError;
pub use wire::{TAG_BIN, TAG_INT, TAG_LIST, TAG_MAP, TAG_STR, decode_message, encode_message};

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::message::Message;

/// Bytes occupied by the frame length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound on a frame body, in bytes.
///
/// Inbound, this bounds the memory committed on the strength of a length
/// prefix read from an untrusted stream. 16 MiB comfortably covers the
/// largest observed HTSP payloads (full EPG listings with artwork URLs).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// [`Decoder`]/[`Encoder`] for HTSP frames.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use htsp::{Message, codec::FrameCodec};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = FrameCodec::default();
/// let mut wire = BytesMut::new();
/// codec.encode(Message::request("hello"), &mut wire).unwrap();
/// let decoded = codec.decode(&mut wire).unwrap().unwrap();
/// assert_eq!(decoded.method(), Some("hello"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    /// Create a codec enforcing `max_frame_len` on frame bodies in both
    /// directions.
    #[must_use]
    pub const fn new(max_frame_len: usize) -> Self { Self { max_frame_len } }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LEN) }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0_u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&src[..FRAME_HEADER_LEN]);
        let body_len = u32::from_be_bytes(header) as usize;
        if body_len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_len,
            });
        }
        if src.len() < FRAME_HEADER_LEN + body_len {
            // Partial frame: reserve what the prefix promised and wait.
            src.reserve(FRAME_HEADER_LEN + body_len - src.len());
            return Ok(None);
        }
        src.advance(FRAME_HEADER_LEN);
        let body = src.split_to(body_len);
        decode_message(&body).map(Some)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let mut body = BytesMut::new();
        encode_message(&msg, &mut body)?;
        if body.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                size: body.len(),
                max: self.max_frame_len,
            });
        }
        let prefix = u32::try_from(body.len()).map_err(|_| CodecError::BodyTooLarge {
            len: body.len(),
        })?;
        dst.reserve(FRAME_HEADER_LEN + body.len());
        dst.extend_from_slice(&prefix.to_be_bytes());
        dst.extend_from_slice(&body);
        Ok(())
    }
}

/// Accumulates received byte chunks and yields complete decoded messages.
///
/// Feeding a stream split at arbitrary offsets yields the same message
/// sequence as feeding it whole; partial frames stay buffered until the
/// remaining bytes arrive.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    codec: FrameCodec,
    buf: BytesMut,
}

impl FrameAssembler {
    /// Create an assembler using `codec`'s frame length limit.
    #[must_use]
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            buf: BytesMut::new(),
        }
    }

    /// Append received bytes to the tail of the buffer.
    pub fn extend(&mut self, chunk: &[u8]) { self.buf.extend_from_slice(chunk); }

    /// Extract and decode the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed; this is the normal idle
    /// condition, not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on protocol damage. The stream cannot be
    /// resynchronized afterwards; callers must treat this as fatal for the
    /// connection.
    pub fn next_message(&mut self) -> Result<Option<Message>, CodecError> {
        self.codec.decode(&mut self.buf)
    }

    /// Bytes currently buffered and not yet consumed by a complete frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buf.len() }
}
