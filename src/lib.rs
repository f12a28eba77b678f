#![doc(html_root_url = "https://docs.rs/htsp/latest")]
//! Public API for the `htsp` library.
//!
//! An async client engine for the HTSP binary protocol spoken by TVHeadEnd
//! servers: length-prefixed framing, the tagged map/list/string/binary/int
//! field codec, request/response correlation by sequence number, and a
//! four-stage pipeline delivering correlated responses to awaiting callers
//! and unsolicited push messages to a listener.

pub mod auth;
pub mod codec;
pub mod connection;
pub mod dvr;
pub mod epg;
mod error;
pub mod message;
pub mod metrics;
pub mod push;

pub use codec::{CodecError, FrameAssembler, FrameCodec};
pub use connection::{ConnectionConfig, ConnectionState, HtspConnection, SessionInfo};
pub use epg::{EventWindow, ProgramCategory, ProgramEvent};
pub use error::HtspError;
pub use message::{Message, Value};
pub use push::{HtspListener, NullListener, ServerEvent};
