//! Field-level binary encoding of [`Message`] values.
//!
//! Every field is written as
//! `[u8 type tag][u8 name length][u32 BE body length][name][body]`.
//! Map bodies concatenate named sub-fields; list bodies concatenate unnamed
//! elements (name length 0). The decoder synthesizes ordinal names for
//! unnamed map entries and drops them again for list elements, preserving
//! element order.

use bytes::{BufMut, Bytes, BytesMut};

use super::error::CodecError;
use crate::message::{Message, Value};

/// Type tag for a nested map body.
pub const TAG_MAP: u8 = 1;
/// Type tag for a signed 64-bit integer body.
pub const TAG_INT: u8 = 2;
/// Type tag for a UTF-8 string body.
pub const TAG_STR: u8 = 3;
/// Type tag for a raw binary body.
pub const TAG_BIN: u8 = 4;
/// Type tag for an ordered list body.
pub const TAG_LIST: u8 = 5;

/// Bytes occupied by a field header (tag, name length, body length).
pub(crate) const FIELD_HEADER_LEN: usize = 6;

/// Serialize `msg` as a concatenation of its fields, appending to `dst`.
///
/// The root of a frame body is an implicit map: it carries no tag or header
/// of its own.
///
/// # Errors
///
/// Returns [`CodecError::NameTooLong`] or [`CodecError::BodyTooLarge`] if a
/// field cannot be expressed in the header's one-byte name length or
/// four-byte body length.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
    for (name, value) in msg.iter() {
        encode_field(name, value, dst)?;
    }
    Ok(())
}

/// Parse a complete frame body into a [`Message`].
///
/// # Errors
///
/// Returns a [`CodecError`] if a tag is unknown, a declared length overruns
/// the body, or string data is not valid UTF-8. Any such error is fatal for
/// the connection the body arrived on.
pub fn decode_message(body: &[u8]) -> Result<Message, CodecError> {
    Ok(decode_fields(body)?.into_iter().collect())
}

fn tag_for(value: &Value) -> u8 {
    match value {
        Value::Map(_) => TAG_MAP,
        Value::Int(_) => TAG_INT,
        Value::Str(_) => TAG_STR,
        Value::Bin(_) => TAG_BIN,
        Value::List(_) => TAG_LIST,
    }
}

fn encode_field(name: &str, value: &Value, dst: &mut BytesMut) -> Result<(), CodecError> {
    let name_len =
        u8::try_from(name.len()).map_err(|_| CodecError::NameTooLong { len: name.len() })?;

    dst.put_u8(tag_for(value));
    dst.put_u8(name_len);
    let len_at = dst.len();
    dst.put_u32(0); // patched once the body length is known
    dst.extend_from_slice(name.as_bytes());

    let body_at = dst.len();
    encode_body(value, dst)?;
    let body_len = dst.len() - body_at;
    let prefix =
        u32::try_from(body_len).map_err(|_| CodecError::BodyTooLarge { len: body_len })?;
    dst[len_at..len_at + 4].copy_from_slice(&prefix.to_be_bytes());
    Ok(())
}

fn encode_body(value: &Value, dst: &mut BytesMut) -> Result<(), CodecError> {
    match value {
        Value::Int(v) => {
            put_int(*v, dst);
            Ok(())
        }
        Value::Str(s) => {
            dst.extend_from_slice(s.as_bytes());
            Ok(())
        }
        Value::Bin(b) => {
            dst.extend_from_slice(b);
            Ok(())
        }
        Value::Map(m) => encode_message(m, dst),
        Value::List(items) => {
            for item in items {
                encode_field("", item, dst)?;
            }
            Ok(())
        }
    }
}

/// Append the minimal big-endian two's-complement form of `v`.
///
/// Redundant leading bytes are stripped: `0x00` while the following byte has
/// a clear sign bit, `0xFF` while it has a set one. Zero keeps a single zero
/// byte so the value is never bodiless on the wire.
fn put_int(v: i64, dst: &mut BytesMut) {
    let be = v.to_be_bytes();
    let mut start = 0;
    while start < be.len() - 1 {
        let redundant = match be[start] {
            0x00 => be[start + 1] & 0x80 == 0,
            0xFF => be[start + 1] & 0x80 != 0,
            _ => false,
        };
        if !redundant {
            break;
        }
        start += 1;
    }
    dst.extend_from_slice(&be[start..]);
}

/// Sign-extend a minimal big-endian two's-complement body into an `i64`.
///
/// An empty body decodes as zero; some servers elide the single zero byte
/// the encoder always writes.
fn int_from_wire(body: &[u8]) -> Result<i64, CodecError> {
    if body.is_empty() {
        return Ok(0);
    }
    if body.len() > 8 {
        return Err(CodecError::IntTooWide { len: body.len() });
    }
    let fill = if body[0] & 0x80 == 0 { 0x00 } else { 0xFF };
    let mut be = [fill; 8];
    be[8 - body.len()..].copy_from_slice(body);
    Ok(i64::from_be_bytes(be))
}

fn decode_value(tag: u8, body: &[u8]) -> Result<Value, CodecError> {
    match tag {
        TAG_MAP => Ok(Value::Map(decode_message(body)?)),
        TAG_INT => int_from_wire(body).map(Value::Int),
        TAG_STR => Ok(Value::Str(std::str::from_utf8(body)?.to_owned())),
        TAG_BIN => Ok(Value::Bin(Bytes::copy_from_slice(body))),
        TAG_LIST => Ok(Value::List(
            decode_fields(body)?.into_iter().map(|(_, value)| value).collect(),
        )),
        tag => Err(CodecError::UnknownTag { tag }),
    }
}

/// Walk a body, yielding `(name, value)` pairs in input order.
///
/// Unnamed entries receive synthesized ordinal names so map contents survive
/// the trip; list decoding discards them again.
fn decode_fields(mut body: &[u8]) -> Result<Vec<(String, Value)>, CodecError> {
    let mut fields = Vec::new();
    let mut ordinal = 0_usize;

    while !body.is_empty() {
        if body.len() < FIELD_HEADER_LEN {
            return Err(CodecError::Truncated {
                declared: FIELD_HEADER_LEN,
                available: body.len(),
            });
        }
        let tag = body[0];
        let name_len = usize::from(body[1]);
        let mut len_bytes = [0_u8; 4];
        len_bytes.copy_from_slice(&body[2..FIELD_HEADER_LEN]);
        let body_len = usize::try_from(u32::from_be_bytes(len_bytes))
            .map_err(|_| CodecError::Truncated {
                declared: usize::MAX,
                available: body.len(),
            })?;

        let total = FIELD_HEADER_LEN + name_len + body_len;
        if body.len() < total {
            return Err(CodecError::Truncated {
                declared: total,
                available: body.len(),
            });
        }

        let name = if name_len == 0 {
            let synthesized = ordinal.to_string();
            ordinal += 1;
            synthesized
        } else {
            std::str::from_utf8(&body[FIELD_HEADER_LEN..FIELD_HEADER_LEN + name_len])?.to_owned()
        };
        let value = decode_value(tag, &body[FIELD_HEADER_LEN + name_len..total])?;
        fields.push((name, value));
        body = &body[total..];
    }

    Ok(fields)
}
