//! # moq-core: server primitives for Media over QUIC
//!
//! The transport-generic half of a MOQ Lite server. It owns the wire
//! primitives and the pieces of a session that do not care which QUIC
//! flavor they run over:
//!
//! - [coding]: QUIC varints, [coding::Decode]/[coding::Encode], and the
//!   buffered [coding::Reader]/[coding::Writer] stream codec.
//! - [transport]: the narrow [transport::SendStream]/[transport::RecvStream]/
//!   [transport::Session] traits that adapt a concrete QUIC or WebTransport
//!   implementation.
//! - [message]: the setup exchange ([message::SessionClient],
//!   [message::SessionServer]), parameters, and control messages.
//! - [Context]: hierarchical cancellation with cause propagation,
//!   linking a track to its groups to their streams.
//! - [GroupWriter]/[GroupReader]: length-delimited frames over one
//!   unidirectional stream per group.
//! - [accept_session_stream]: decode the setup offer on the first
//!   bidirectional stream and hand out a [SetupRequest].
//!
//! Everything here is generic over [transport::Session]; see the
//! `moq-server` crate for the quinn/WebTransport binding.

mod context;
mod error;
mod frame;
mod group;
mod setup;
mod stats;

pub mod coding;
pub mod message;
pub mod transport;

pub use context::*;
pub use error::*;
pub use frame::*;
pub use group::*;
pub use setup::*;
pub use stats::*;

#[cfg(any(test, feature = "mock"))]
#[doc(hidden)]
pub mod mock;
