//! Narrow adapters over QUIC streams.
//!
//! A concrete transport (quinn, WebTransport, an in-memory pipe) implements
//! these traits once; everything else in the crate is generic over them.
//! The surface is deliberately small: ordered byte streams with graceful
//! FIN, reset/stop with an application error code, and close detection.

use std::future::Future;

/// An error produced by a transport stream or session.
pub trait StreamError: std::error::Error + Send + Sync + 'static {
	/// The application error code, if the peer terminated the stream with one.
	///
	/// `None` for local failures and connection-level errors.
	fn reset_code(&self) -> Option<u32> {
		None
	}
}

/// The send half of a QUIC stream.
///
/// Terminal operations (`finish`, `reset`) are no-ops after the first
/// terminal call, mirroring quinn.
pub trait SendStream: Send {
	type Error: StreamError;

	/// Write some bytes, returning how many were accepted.
	fn write(&mut self, buf: &[u8]) -> impl Future<Output = Result<usize, Self::Error>> + Send;

	/// Close the stream gracefully (FIN).
	fn finish(&mut self);

	/// Reset the stream with an application error code.
	fn reset(&mut self, code: u32);

	/// Wait until the peer acknowledged the FIN, stopped the stream, or the stream died.
	fn closed(&mut self) -> impl Future<Output = ()> + Send;
}

/// The receive half of a QUIC stream.
pub trait RecvStream: Send {
	type Error: StreamError;

	/// Read some bytes into `buf`; `Ok(None)` once the peer finished the stream.
	fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<Option<usize>, Self::Error>> + Send;

	/// Ask the peer to stop sending, with an application error code.
	fn stop(&mut self, code: u32);
}

/// A QUIC or WebTransport connection.
pub trait Session: Clone + Send + Sync + 'static {
	type SendStream: SendStream;
	type RecvStream: RecvStream;
	type Error: StreamError;

	fn accept_bi(&self) -> impl Future<Output = Result<(Self::SendStream, Self::RecvStream), Self::Error>> + Send;
	fn open_bi(&self) -> impl Future<Output = Result<(Self::SendStream, Self::RecvStream), Self::Error>> + Send;
	fn accept_uni(&self) -> impl Future<Output = Result<Self::RecvStream, Self::Error>> + Send;
	fn open_uni(&self) -> impl Future<Output = Result<Self::SendStream, Self::Error>> + Send;

	/// Close the connection with an application error code.
	fn close(&self, code: u32, reason: &str);

	/// Wait until the connection is closed, locally or by the peer.
	fn closed(&self) -> impl Future<Output = ()> + Send;
}
