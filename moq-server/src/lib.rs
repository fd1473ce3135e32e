//! # moq-server: the native MOQ Lite server
//!
//! One [Server] instance accepts both transports on a single UDP socket:
//! - Raw QUIC, negotiated with the [moq_core::ALPN_MOQ] ALPN.
//! - WebTransport, negotiated with HTTP/3 ([moq_core::ALPN_H3]) and
//!   upgraded via Extended CONNECT.
//!
//! Connections are dispatched by the negotiated protocol, the setup offer
//! is decoded on the first bidirectional stream, and a [SetupHandler]
//! decides whether to accept each session. The server tracks every
//! accepted session so [Server::shutdown] can drain them with GOAWAY and
//! [Server::close] can terminate them immediately.

mod error;
mod handler;
mod server;
mod session;
mod transport;
mod webtransport;

pub use error::*;
pub use handler::*;
pub use server::*;
pub use session::*;
pub use transport::*;
pub use webtransport::*;

// Re-export these crates.
pub use moq_core;
pub use quinn;
pub use rustls;
pub use web_transport_quinn;
