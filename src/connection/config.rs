//! Connection configuration for [`HtspConnection`](super::HtspConnection).

use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_LEN;

/// Default delay between connect attempts while the server is unreachable.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Default capacity of each pipeline stage channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// HTSP protocol revision this client requests in `hello`.
pub const HTSP_VERSION: i64 = 25;

/// Configuration for a single HTSP connection.
///
/// Built with chained setters; only host, port, and credentials vary between
/// typical deployments.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use htsp::ConnectionConfig;
///
/// let config = ConnectionConfig::new("tvheadend.local", 9982)
///     .credentials("viewer", "secret")
///     .retry_interval(Duration::from_millis(500));
/// assert_eq!(config.port(), 9982);
/// ```
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    client_name: String,
    client_version: String,
    retry_interval: Duration,
    queue_capacity: usize,
    max_frame_len: usize,
}

impl ConnectionConfig {
    /// Create a configuration for the server at `host:port` with empty
    /// credentials.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            client_name: env!("CARGO_PKG_NAME").to_owned(),
            client_version: env!("CARGO_PKG_VERSION").to_owned(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Set the username and password sent during `authenticate`.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the client name and version advertised in `hello`.
    #[must_use]
    pub fn client_identity(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    /// Set the delay between connect attempts while the server is down.
    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the capacity of each pipeline stage channel.
    ///
    /// Senders await when a channel is full, so this bound is what turns a
    /// stalled consumer into backpressure instead of memory growth.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the maximum frame body length accepted or produced.
    #[must_use]
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Server hostname or address.
    #[must_use]
    pub fn host(&self) -> &str { &self.host }

    /// Server TCP port.
    #[must_use]
    pub fn port(&self) -> u16 { self.port }

    /// Username for the handshake.
    #[must_use]
    pub fn username(&self) -> &str { &self.username }

    /// Password for the handshake digest.
    #[must_use]
    pub fn password(&self) -> &str { &self.password }

    /// Advertised client name.
    #[must_use]
    pub fn client_name(&self) -> &str { &self.client_name }

    /// Advertised client version.
    #[must_use]
    pub fn client_version(&self) -> &str { &self.client_version }

    /// Delay between connect attempts.
    #[must_use]
    pub fn retry_interval_value(&self) -> Duration { self.retry_interval }

    /// Stage channel capacity.
    #[must_use]
    pub fn queue_capacity_value(&self) -> usize { self.queue_capacity }

    /// Maximum frame body length.
    #[must_use]
    pub fn max_frame_len_value(&self) -> usize { self.max_frame_len }
}
