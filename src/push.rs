//! Unsolicited server messages and the listener that receives them.
//!
//! Once `enableAsyncMetadata` is sent, the server pushes state changes
//! without sequence numbers. The dispatch stage classifies each into a
//! [`ServerEvent`] and awaits the registered [`HtspListener`], so a slow
//! subscriber applies backpressure to the pipeline instead of growing a
//! queue.

use async_trait::async_trait;

use crate::{error::HtspError, message::Message};

/// Methods the engine acknowledges but does not deliver: tag and EPG churn,
/// plus per-subscription streaming status traffic.
const LOG_ONLY_METHODS: &[&str] = &[
    "tagAdd",
    "tagUpdate",
    "tagDelete",
    "eventAdd",
    "eventUpdate",
    "eventDelete",
    "subscriptionStart",
    "subscriptionGrace",
    "subscriptionStop",
    "subscriptionSkip",
    "subscriptionSpeed",
    "subscriptionStatus",
    "queueStatus",
    "signalStatus",
    "timeshiftStatus",
    "muxpkt",
];

/// A classified unsolicited message.
///
/// Each variant carries the raw [`Message`]; the channel/DVR mapping layer
/// that consumes these owns the field-level interpretation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// A channel appeared.
    ChannelAdd(Message),
    /// A channel changed.
    ChannelUpdate(Message),
    /// A channel disappeared.
    ChannelDelete(Message),
    /// A recording entry appeared.
    DvrEntryAdd(Message),
    /// A recording entry changed.
    DvrEntryUpdate(Message),
    /// A recording entry disappeared.
    DvrEntryDelete(Message),
    /// An auto-record rule appeared.
    AutorecEntryAdd(Message),
    /// An auto-record rule changed.
    AutorecEntryUpdate(Message),
    /// An auto-record rule disappeared.
    AutorecEntryDelete(Message),
    /// The server finished replaying its current state after
    /// `enableAsyncMetadata`.
    InitialSyncCompleted,
}

impl ServerEvent {
    /// Classify an unsolicited message by its `method` field.
    ///
    /// # Errors
    ///
    /// Returns the message back when it is log-only or unrecognized; the
    /// dispatch stage logs and drops it.
    pub fn classify(msg: Message) -> Result<Self, Message> {
        match msg.method() {
            Some("channelAdd") => Ok(Self::ChannelAdd(msg)),
            Some("channelUpdate") => Ok(Self::ChannelUpdate(msg)),
            Some("channelDelete") => Ok(Self::ChannelDelete(msg)),
            Some("dvrEntryAdd") => Ok(Self::DvrEntryAdd(msg)),
            Some("dvrEntryUpdate") => Ok(Self::DvrEntryUpdate(msg)),
            Some("dvrEntryDelete") => Ok(Self::DvrEntryDelete(msg)),
            Some("autorecEntryAdd") => Ok(Self::AutorecEntryAdd(msg)),
            Some("autorecEntryUpdate") => Ok(Self::AutorecEntryUpdate(msg)),
            Some("autorecEntryDelete") => Ok(Self::AutorecEntryDelete(msg)),
            Some("initialSyncCompleted") => Ok(Self::InitialSyncCompleted),
            _ => Err(msg),
        }
    }

    /// Returns `true` if `method` is acknowledged-but-ignored traffic, as
    /// opposed to genuinely unknown.
    #[must_use]
    pub fn is_log_only(method: &str) -> bool { LOG_ONLY_METHODS.contains(&method) }
}

/// Observer for unsolicited messages and connection faults.
///
/// Registered at [`HtspConnection::new`](crate::HtspConnection::new); the
/// dispatch stage awaits `on_message`, so a slow implementation applies
/// backpressure. `on_error` fires once per connection after teardown has
/// completed, off the pipeline tasks, so an implementation may respond by
/// calling [`stop`](crate::HtspConnection::stop). Implementations that need
/// fan-out can forward into their own broadcast channel.
#[async_trait]
pub trait HtspListener: Send + Sync + 'static {
    /// An unsolicited message arrived.
    async fn on_message(&self, event: ServerEvent);

    /// A pipeline stage faulted; the connection is tearing down.
    async fn on_error(&self, error: &HtspError);
}

/// Listener that discards everything; for connections only used for
/// request/response traffic.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

#[async_trait]
impl HtspListener for NullListener {
    async fn on_message(&self, _event: ServerEvent) {}

    async fn on_error(&self, _error: &HtspError) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sync_marker_without_payload() {
        let msg = Message::request("initialSyncCompleted");
        assert_eq!(
            ServerEvent::classify(msg),
            Ok(ServerEvent::InitialSyncCompleted)
        );
    }

    #[test]
    fn classifies_channel_and_dvr_methods() {
        let msg = Message::request("channelAdd").with("channelId", 3_i64);
        match ServerEvent::classify(msg.clone()) {
            Ok(ServerEvent::ChannelAdd(inner)) => assert_eq!(inner, msg),
            other => panic!("unexpected classification: {other:?}"),
        }
        assert!(matches!(
            ServerEvent::classify(Message::request("autorecEntryDelete")),
            Ok(ServerEvent::AutorecEntryDelete(_))
        ));
    }

    #[test]
    fn log_only_methods_are_returned_unclassified() {
        let msg = Message::request("signalStatus");
        let returned = ServerEvent::classify(msg.clone()).expect_err("log-only");
        assert_eq!(returned, msg);
        assert!(ServerEvent::is_log_only("signalStatus"));
        assert!(!ServerEvent::is_log_only("channelAdd"));
    }
}
