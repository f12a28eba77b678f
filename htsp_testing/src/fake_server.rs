//! Scripted loopback HTSP server.

use std::{collections::HashMap, io, net::SocketAddr};

use futures::{SinkExt, StreamExt};
use htsp::{FrameCodec, Message, Value, auth::challenge_digest};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tokio_util::codec::Framed;

/// Fixture values and behaviour for a [`FakeTvServer`].
#[derive(Clone, Debug)]
pub struct ServerScript {
    /// Value of `servername` in the `hello` response.
    pub server_name: String,
    /// Value of `serverversion` in the `hello` response.
    pub server_version: String,
    /// Value of `htspversion` in the `hello` response.
    pub protocol_version: i64,
    /// Challenge salt in the `hello` response.
    pub challenge: Vec<u8>,
    /// Password whose digest the server accepts.
    pub password: String,
    /// When `false`, every `authenticate` is denied regardless of digest.
    pub grant_access: bool,
    /// `freediskspace` in the `getDiskSpace` response, bytes.
    pub free_disk_bytes: i64,
    /// `totaldiskspace` in the `getDiskSpace` response, bytes.
    pub total_disk_bytes: i64,
    /// Entries of the `events` list returned for `getEvents`.
    pub events: Vec<Message>,
    /// Canned reply fields per method, overriding the default echo.
    pub responses: HashMap<String, Message>,
    /// When non-zero, non-handshake replies are buffered and flushed in
    /// reverse once this many are pending; used to permute response order
    /// for correlation tests.
    pub permute_batch: usize,
}

impl Default for ServerScript {
    fn default() -> Self {
        const GIB: i64 = 1024 * 1024 * 1024;
        Self {
            server_name: "Tvheadend".to_owned(),
            server_version: "4.3-testing".to_owned(),
            protocol_version: 34,
            challenge: (0_u8..16).collect(),
            password: "secret".to_owned(),
            grant_access: true,
            free_disk_bytes: 410 * GIB,
            total_disk_bytes: 932 * GIB,
            events: Vec::new(),
            responses: HashMap::new(),
            permute_batch: 0,
        }
    }
}

/// A loopback HTSP server driving one scripted connection.
///
/// The accept task is aborted when the server is dropped.
#[derive(Debug)]
pub struct FakeTvServer {
    addr: SocketAddr,
    push_tx: mpsc::UnboundedSender<Message>,
    received_rx: mpsc::UnboundedReceiver<Message>,
    handle: JoinHandle<io::Result<()>>,
}

impl FakeTvServer {
    /// Bind an ephemeral loopback port and start serving `script`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind.
    pub async fn spawn(script: ServerScript) -> io::Result<Self> {
        Self::spawn_on("127.0.0.1:0".parse().expect("loopback address"), script).await
    }

    /// Bind `addr` and start serving `script`; useful for open-retry tests
    /// that reserve a port before the server exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind.
    pub async fn spawn_on(addr: SocketAddr, script: ServerScript) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(serve(listener, script, push_rx, received_tx));
        Ok(Self {
            addr,
            push_tx,
            received_rx,
            handle,
        })
    }

    /// Address the server is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Inject an unsolicited message; it is written to the client verbatim.
    ///
    /// # Panics
    ///
    /// Panics if the serve task has already exited.
    pub fn push(&self, msg: Message) {
        assert!(msg.seq().is_none(), "unsolicited messages carry no seq");
        self.push_tx.send(msg).expect("serve task alive");
    }

    /// Next request the client sent, in arrival order.
    pub async fn next_request(&mut self) -> Option<Message> { self.received_rx.recv().await }
}

impl Drop for FakeTvServer {
    fn drop(&mut self) { self.handle.abort(); }
}

async fn serve(
    listener: TcpListener,
    script: ServerScript,
    mut push_rx: mpsc::UnboundedReceiver<Message>,
    received_tx: mpsc::UnboundedSender<Message>,
) -> io::Result<()> {
    let (stream, _) = listener.accept().await?;
    let mut framed = Framed::new(stream, FrameCodec::default());
    let mut pending: Vec<Message> = Vec::new();

    loop {
        tokio::select! {
            Some(push) = push_rx.recv() => {
                framed.send(push).await?;
            }
            frame = framed.next() => {
                let Some(frame) = frame else { return Ok(()) };
                let request = frame?;
                let _ = received_tx.send(request.clone());
                let Some((reply, immediate)) = respond(&script, &request) else {
                    continue;
                };
                if immediate || script.permute_batch == 0 {
                    framed.send(reply).await?;
                } else {
                    pending.push(reply);
                    if pending.len() >= script.permute_batch {
                        for buffered in pending.drain(..).rev() {
                            framed.send(buffered).await?;
                        }
                    }
                }
            }
        }
    }
}

/// Build the reply for `request`, and whether it bypasses permutation.
fn respond(script: &ServerScript, request: &Message) -> Option<(Message, bool)> {
    let method = request.method()?;
    let seq = request.seq();

    let (mut reply, immediate) = match method {
        "hello" => (
            Message::new()
                .with("htspversion", script.protocol_version)
                .with("servername", script.server_name.as_str())
                .with("serverversion", script.server_version.as_str())
                .with("challenge", script.challenge.clone()),
            true,
        ),
        "authenticate" => {
            let expected = challenge_digest(&script.password, &script.challenge);
            let granted = script.grant_access
                && request.get_bytes("digest").map(bytes::Bytes::as_ref) == Some(&expected[..]);
            let reply = if granted {
                Message::new()
            } else {
                Message::new().with("noaccess", 1_i64)
            };
            (reply, true)
        }
        "getDiskSpace" => (
            Message::new()
                .with("freediskspace", script.free_disk_bytes)
                .with("totaldiskspace", script.total_disk_bytes),
            true,
        ),
        "getEvents" => (
            Message::new().with(
                "events",
                script.events.iter().cloned().map(Value::Map).collect::<Vec<_>>(),
            ),
            false,
        ),
        method => match script.responses.get(method) {
            Some(canned) => (canned.clone(), false),
            // Default ack: echo the request fields back with success:1, which
            // lets correlation tests verify per-request payload routing.
            None => {
                seq?;
                let mut echo = request.clone();
                echo.insert("success", 1_i64);
                (echo, false)
            }
        },
    };

    if let Some(seq) = seq {
        reply.insert("seq", seq);
    }
    Some((reply, immediate))
}
