//! Metric helpers for the HTSP engine.
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) facade; no
//! exporter is installed by the library. Every helper compiles to a no-op
//! when the `metrics` feature is disabled, so call sites stay unconditional.

/// Name of the gauge tracking open connections.
pub const CONNECTIONS_ACTIVE: &str = "htsp_connections_active";
/// Name of the counter tracking frames by direction.
pub const FRAMES_TOTAL: &str = "htsp_frames_total";
/// Name of the counter tracking pipeline faults by stage.
pub const FAULTS_TOTAL: &str = "htsp_faults_total";

/// Direction of frame traffic.
#[derive(Clone, Copy)]
pub enum Direction {
    /// Frames decoded from the server.
    Inbound,
    /// Frames written to the server.
    Outbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the open-connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the open-connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record one frame in the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    metrics::counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction.as_str();
}

/// Record a pipeline fault in the named stage.
pub fn inc_faults(stage: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!(FAULTS_TOTAL, "stage" => stage).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = stage;
}
