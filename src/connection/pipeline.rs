//! The four pipeline stage tasks behind an open connection.
//!
//! Receive reads raw chunks from the socket; assemble turns chunks into
//! decoded [`Message`]s; dispatch routes each message to its correlated
//! handler or to the unsolicited listener; send drains the outbound queue
//! onto the socket. Stages hand off through bounded channels, so a stalled
//! consumer slows its producer instead of growing a queue without bound.

use std::{io, sync::Arc};

use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use log::error;
use tokio::{
    io::AsyncReadExt,
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::mpsc,
};
use tokio_util::{codec::FramedWrite, sync::CancellationToken, task::TaskTracker};
use tracing::{debug, trace};

use super::{
    registry::ResponseRegistry,
    state::{ConnectionState, StatePublisher},
};
use crate::{
    codec::{FrameAssembler, FrameCodec},
    error::HtspError,
    message::Message,
    metrics,
    push::{HtspListener, ServerEvent},
};

/// Bytes read from the socket per `read_buf` call.
const READ_CHUNK_LEN: usize = 8 * 1024;

/// Shared fault funnel: the first stage error wins and tears the pipeline
/// down; later errors (usually knock-on effects of the teardown) are only
/// logged.
pub(super) struct FaultChannel {
    token: CancellationToken,
    listener: Arc<dyn HtspListener>,
    registry: Arc<ResponseRegistry>,
    state: StatePublisher,
    fired: std::sync::Mutex<bool>,
}

impl FaultChannel {
    fn new(
        token: CancellationToken,
        listener: Arc<dyn HtspListener>,
        registry: Arc<ResponseRegistry>,
        state: StatePublisher,
    ) -> Self {
        Self {
            token,
            listener,
            registry,
            state,
            fired: std::sync::Mutex::new(false),
        }
    }

    fn fault(&self, stage: &'static str, err: HtspError) {
        let first = {
            let mut fired = self.fired.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            !std::mem::replace(&mut *fired, true)
        };
        if first {
            error!("htsp {stage} stage failed: {err}");
            metrics::inc_faults(stage);
            // Teardown completes before the listener hears about it: pending
            // requests observe closure, the state change is published, and
            // the stage tasks are cancelled.
            self.registry.abort_all();
            self.state.set(ConnectionState::ErrorStopped);
            self.token.cancel();
            // Delivered from an untracked task: the stage tasks are awaited
            // by `stop()`, so a listener that responds to a fault by calling
            // `stop()` must not run on one of them.
            let listener = Arc::clone(&self.listener);
            tokio::spawn(async move { listener.on_error(&err).await });
        } else {
            debug!(stage, error = %err, "suppressing fault after teardown began");
        }
    }
}

/// Handles owned by the engine while the pipeline is live.
pub(super) struct Pipeline {
    pub(super) send_tx: mpsc::Sender<Message>,
    pub(super) token: CancellationToken,
    pub(super) tracker: TaskTracker,
}

/// Split the connected stream and spawn the four stage tasks.
pub(super) fn spawn(
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    codec: FrameCodec,
    queue_capacity: usize,
    registry: Arc<ResponseRegistry>,
    listener: Arc<dyn HtspListener>,
    state: StatePublisher,
) -> Pipeline {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let faults = Arc::new(FaultChannel::new(
        token.clone(),
        Arc::clone(&listener),
        Arc::clone(&registry),
        state,
    ));

    let (send_tx, send_rx) = mpsc::channel(queue_capacity);
    let (chunk_tx, chunk_rx) = mpsc::channel(queue_capacity);
    let (msg_tx, msg_rx) = mpsc::channel(queue_capacity);

    tracker.spawn(stage(
        "receive",
        Arc::clone(&faults),
        receive(reader, chunk_tx, token.clone()),
    ));
    tracker.spawn(stage(
        "assemble",
        Arc::clone(&faults),
        assemble(chunk_rx, msg_tx, codec),
    ));
    tracker.spawn(stage(
        "dispatch",
        Arc::clone(&faults),
        dispatch(msg_rx, registry, listener),
    ));
    tracker.spawn(stage(
        "send",
        faults,
        send(writer, send_rx, codec, token.clone()),
    ));
    tracker.close();

    Pipeline {
        send_tx,
        token,
        tracker,
    }
}

async fn stage(
    name: &'static str,
    faults: Arc<FaultChannel>,
    fut: impl std::future::Future<Output = Result<(), HtspError>>,
) {
    if let Err(err) = fut.await {
        faults.fault(name, err);
    }
    trace!(stage = name, "pipeline stage exited");
}

/// Read raw bytes from the socket and forward them as chunks.
async fn receive(
    mut reader: OwnedReadHalf,
    chunk_tx: mpsc::Sender<Bytes>,
    token: CancellationToken,
) -> Result<(), HtspError> {
    let mut scratch = BytesMut::with_capacity(READ_CHUNK_LEN);
    loop {
        scratch.reserve(READ_CHUNK_LEN);
        let read = tokio::select! {
            () = token.cancelled() => return Ok(()),
            read = reader.read_buf(&mut scratch) => read?,
        };
        if read == 0 {
            return Err(HtspError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        if chunk_tx.send(scratch.split().freeze()).await.is_err() {
            return Ok(());
        }
    }
}

/// Assemble chunks into frames and decode each into a [`Message`].
async fn assemble(
    mut chunk_rx: mpsc::Receiver<Bytes>,
    msg_tx: mpsc::Sender<Message>,
    codec: FrameCodec,
) -> Result<(), HtspError> {
    let mut assembler = FrameAssembler::new(codec);
    while let Some(chunk) = chunk_rx.recv().await {
        assembler.extend(&chunk);
        while let Some(msg) = assembler.next_message()? {
            metrics::inc_frames(metrics::Direction::Inbound);
            if msg_tx.send(msg).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Route decoded messages: correlated responses to the registry, everything
/// else to the unsolicited listener.
async fn dispatch(
    mut msg_rx: mpsc::Receiver<Message>,
    registry: Arc<ResponseRegistry>,
    listener: Arc<dyn HtspListener>,
) -> Result<(), HtspError> {
    while let Some(msg) = msg_rx.recv().await {
        if let Some(seq) = msg.seq() {
            if !registry.complete(seq, msg) {
                // A registry bug or a duplicate/late response, not an I/O
                // fault; the connection survives.
                error!("no response handler registered for seq {seq}");
            }
            continue;
        }
        match ServerEvent::classify(msg) {
            Ok(event) => listener.on_message(event).await,
            Err(msg) => {
                let method = msg.method().unwrap_or("<none>");
                if ServerEvent::is_log_only(method) {
                    trace!(method, "ignoring status message");
                } else {
                    debug!(method, "ignoring unrecognized server message");
                }
            }
        }
    }
    Ok(())
}

/// Drain the send queue onto the socket, one frame per message.
async fn send(
    writer: OwnedWriteHalf,
    mut send_rx: mpsc::Receiver<Message>,
    codec: FrameCodec,
    token: CancellationToken,
) -> Result<(), HtspError> {
    let mut framed = FramedWrite::new(writer, codec);
    loop {
        let msg = tokio::select! {
            () = token.cancelled() => return Ok(()),
            msg = send_rx.recv() => match msg {
                Some(msg) => msg,
                None => return Ok(()),
            },
        };
        trace!(method = msg.method().unwrap_or("<none>"), seq = msg.seq(), "sending frame");
        framed.send(msg).await?;
        metrics::inc_frames(metrics::Direction::Outbound);
    }
}
