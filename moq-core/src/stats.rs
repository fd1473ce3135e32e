//! Application-level byte accounting hooks.
//!
//! Group writers and readers report payload bytes as they frame them, so a
//! server can compute per-track throughput without counting transport
//! overhead or retransmissions.

/// A sink for application-level byte accounting.
///
/// Implementations should be fast and non-blocking (e.g., atomics).
pub trait Stats: Send + Sync + 'static {
	/// Record payload bytes delivered by a group reader.
	fn add_rx_bytes(&self, bytes: u64);

	/// Record payload bytes accepted by a group writer.
	fn add_tx_bytes(&self, bytes: u64);
}

/// Default stats sink that does nothing.
#[derive(Default)]
pub struct NoopStats;

impl Stats for NoopStats {
	fn add_rx_bytes(&self, _bytes: u64) {}
	fn add_tx_bytes(&self, _bytes: u64) {}
}
