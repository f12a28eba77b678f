//! Captured-log assertions for the soft-failure policy tests.
//!
//! Server refusals of mutating requests are reported through the `log`
//! facade rather than as errors, so those tests assert on captured records.

use std::sync::{Mutex, MutexGuard, OnceLock};

use logtest::Logger;
use rstest::fixture;

/// Exclusive handle over the process-wide log capture.
///
/// The `log` facade allows one logger per process, so tests that assert on
/// captured records serialise by holding the capture for their whole body.
/// Acquiring it discards records left over from earlier tests.
pub struct LogCapture {
    logger: MutexGuard<'static, Logger>,
}

impl LogCapture {
    fn acquire() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let mut capture = Self {
            logger: logger.lock().expect("log capture poisoned"),
        };
        capture.clear();
        capture
    }

    /// Discard everything captured so far.
    pub fn clear(&mut self) { while self.logger.pop().is_some() {} }

    /// Drain the capture into `(level, message)` pairs in emission order.
    pub fn drain(&mut self) -> Vec<(log::Level, String)> {
        std::iter::from_fn(|| self.logger.pop())
            .map(|record| (record.level(), record.args().to_owned()))
            .collect()
    }

    /// Drain and return the first error-level message containing `needle`.
    pub fn error_containing(&mut self, needle: &str) -> Option<String> {
        self.drain()
            .into_iter()
            .find(|(level, message)| *level == log::Level::Error && message.contains(needle))
            .map(|(_, message)| message)
    }

    /// Drain and assert that no captured record mentions `needle`.
    ///
    /// # Panics
    ///
    /// Panics with the offending records if any message contains `needle`.
    pub fn assert_none_containing(&mut self, needle: &str) {
        let hits: Vec<_> = self
            .drain()
            .into_iter()
            .filter(|(_, message)| message.contains(needle))
            .collect();
        assert!(hits.is_empty(), "unexpected log records mentioning {needle:?}: {hits:?}");
    }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn log_capture() -> LogCapture { LogCapture::acquire() }
