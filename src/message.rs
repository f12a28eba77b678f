//! Typed key-value messages exchanged over an HTSP connection.
//!
//! A [`Message`] maps string field names to tagged [`Value`]s and is the unit
//! carried by every frame in both directions. Requests name their operation
//! in the `method` field; correlated traffic carries a `seq` field stamped by
//! the connection engine. Field order is not significant on the wire, so the
//! map is stored sorted for deterministic encoding.

use std::collections::BTreeMap;

use bytes::Bytes;

/// Field name carrying the operation of a request or the event name of an
/// unsolicited message.
pub(crate) const METHOD_FIELD: &str = "method";

/// Field name correlating a request with its response.
pub(crate) const SEQ_FIELD: &str = "seq";

/// A single tagged value inside a [`Message`].
///
/// These five variants are the only legal wire types. Integers are signed
/// 64-bit; the codec transmits them in minimal big-endian two's-complement
/// form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes, used verbatim (for example the authentication challenge).
    Bin(Bytes),
    /// Nested message.
    Map(Message),
    /// Ordered sequence of values.
    List(Vec<Value>),
}

impl Value {
    /// Return the integer value, if this is an [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Return the string slice, if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Return the raw bytes, if this is a [`Value::Bin`].
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bin(v) => Some(v),
            _ => None,
        }
    }

    /// Return the nested message, if this is a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&Message> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Return the element slice, if this is a [`Value::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Self::Int(i64::from(v)) }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self { Self::Int(i64::from(v)) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::Str(v.to_owned()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::Str(v) }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self { Self::Bin(v) }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Self::Bin(Bytes::from(v)) }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self { Self::Bin(Bytes::copy_from_slice(v)) }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self { Self::List(v) }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self { Self::Map(v) }
}

/// Typed key-value message exchanged with an HTSP server.
///
/// # Examples
///
/// ```
/// use htsp::Message;
///
/// let hello = Message::request("hello")
///     .with("clientname", "htsp")
///     .with("htspversion", 25_i64);
/// assert_eq!(hello.method(), Some("hello"));
/// assert_eq!(hello.get_int("htspversion"), Some(25));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    fields: BTreeMap<String, Value>,
}

impl Message {
    /// Create an empty message.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a request message with its `method` field set.
    #[must_use]
    pub fn request(method: impl Into<String>) -> Self {
        let mut msg = Self::new();
        msg.insert(METHOD_FIELD, method.into());
        msg
    }

    /// Insert a field, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> { self.fields.get(name) }

    /// Look up an integer field.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> { self.get(name).and_then(Value::as_int) }

    /// Look up a string field.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> { self.get(name).and_then(Value::as_str) }

    /// Look up a binary field.
    #[must_use]
    pub fn get_bytes(&self, name: &str) -> Option<&Bytes> {
        self.get(name).and_then(Value::as_bytes)
    }

    /// Look up a nested message field.
    #[must_use]
    pub fn get_map(&self, name: &str) -> Option<&Message> {
        self.get(name).and_then(Value::as_map)
    }

    /// Look up a list field.
    #[must_use]
    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    /// Returns `true` if a field with `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.fields.contains_key(name) }

    /// The operation name of a request, or the event name of an unsolicited
    /// message.
    #[must_use]
    pub fn method(&self) -> Option<&str> { self.get_str(METHOD_FIELD) }

    /// The correlation sequence number, if this message carries one.
    #[must_use]
    pub fn seq(&self) -> Option<i64> { self.get_int(SEQ_FIELD) }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize { self.fields.len() }

    /// Returns `true` if the message has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    /// Iterate over the fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Message {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sets_method_field() {
        let msg = Message::request("getEvents").with("channelId", 4_i64);
        assert_eq!(msg.method(), Some("getEvents"));
        assert_eq!(msg.get_int("channelId"), Some(4));
        assert!(msg.seq().is_none());
    }

    #[test]
    fn insert_replaces_existing_field() {
        let mut msg = Message::new();
        msg.insert("title", "first");
        msg.insert("title", "second");
        assert_eq!(msg.get_str("title"), Some("second"));
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn typed_accessors_reject_mismatched_variants() {
        let msg = Message::new().with("name", "text").with("count", 3_i64);
        assert!(msg.get_int("name").is_none());
        assert!(msg.get_str("count").is_none());
        assert!(msg.get_bytes("missing").is_none());
    }

    #[test]
    fn nested_values_round_trip_through_accessors() {
        let inner = Message::new().with("eventId", 9_i64);
        let msg = Message::new()
            .with("events", vec![Value::Map(inner.clone())])
            .with("challenge", vec![0xDE_u8, 0xAD]);

        let events = msg.get_list("events").expect("list field");
        assert_eq!(events[0].as_map(), Some(&inner));
        assert_eq!(
            msg.get_bytes("challenge").map(bytes::Bytes::as_ref),
            Some([0xDE_u8, 0xAD].as_slice())
        );
    }
}
