//! Test support for the `htsp` crate.
//!
//! [`FakeTvServer`] speaks enough scripted HTSP over a loopback socket to
//! exercise the connection engine end to end: the
//! `hello`/`authenticate`/`getDiskSpace` handshake with fixture values,
//! canned or echoed request replies, permuted response ordering for
//! correlation tests, and unsolicited push injection.
//!
//! ```rust,no_run
//! use htsp_testing::{FakeTvServer, ServerScript};
//!
//! # async fn example() -> std::io::Result<()> {
//! let server = FakeTvServer::spawn(ServerScript::default()).await?;
//! println!("connect to {}", server.addr());
//! # Ok(())
//! # }
//! ```

mod fake_server;
pub mod logging;

pub use fake_server::{FakeTvServer, ServerScript};
pub use logging::{LogCapture, log_capture};
