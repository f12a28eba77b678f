//! Pending-response registry: sequence assignment and one-shot completion.

use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;
use log::warn;
use tokio::sync::oneshot;

use crate::message::Message;

/// Maps pending sequence numbers to the sender that completes the awaiting
/// request.
///
/// Sequence numbers are the wire-faithful 32-bit signed counter, widened to
/// `i64` as keys because that is how they travel in a [`Message`] field. The
/// counter wraps through two's-complement overflow; a still-pending entry for
/// a number about to be reused is evicted best-effort, which can only collide
/// when 2^31 requests are simultaneously in flight.
#[derive(Debug, Default)]
pub(super) struct ResponseRegistry {
    next_seq: AtomicI32,
    pending: DashMap<i64, oneshot::Sender<Message>>,
}

impl ResponseRegistry {
    /// Assign the next sequence number and register `tx` for its response.
    pub(super) fn register(&self, tx: oneshot::Sender<Message>) -> i64 {
        let seq = i64::from(self.next_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1));
        if self.pending.insert(seq, tx).is_some() {
            warn!("evicted stale response handler for reused seq {seq}");
        }
        seq
    }

    /// Complete and remove the handler registered for `seq`.
    ///
    /// Returns `false` if no handler is registered, which the dispatch stage
    /// logs as an anomaly without stopping the connection.
    pub(super) fn complete(&self, seq: i64, response: Message) -> bool {
        match self.pending.remove(&seq) {
            Some((_, tx)) => {
                // A dropped receiver means the caller gave up waiting; the
                // response is discarded, which is fine for one-shot delivery.
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Drop every pending sender so awaiting callers observe closure.
    pub(super) fn abort_all(&self) { self.pending.clear(); }

    /// Number of requests awaiting a response.
    #[cfg(test)]
    pub(super) fn pending_len(&self) -> usize { self.pending.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_each_seq_exactly_once() {
        let registry = ResponseRegistry::default();
        let (tx, rx) = oneshot::channel();
        let seq = registry.register(tx);

        assert!(registry.complete(seq, Message::new().with("seq", seq)));
        assert!(!registry.complete(seq, Message::new()));
        let response = rx.await.expect("response delivered");
        assert_eq!(response.seq(), Some(seq));
    }

    #[tokio::test]
    async fn abort_drops_pending_senders() {
        let registry = ResponseRegistry::default();
        let (tx, rx) = oneshot::channel::<Message>();
        registry.register(tx);

        registry.abort_all();
        assert_eq!(registry.pending_len(), 0);
        assert!(rx.await.is_err());
    }

    #[test]
    fn sequence_numbers_increase_monotonically() {
        let registry = ResponseRegistry::default();
        let (a, b) = (oneshot::channel().0, oneshot::channel().0);
        let first = registry.register(a);
        let second = registry.register(b);
        assert_eq!(second, first + 1);
    }
}
