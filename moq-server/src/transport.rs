//! The concrete transports behind the core's stream traits.
//!
//! A native connection is a bare [quinn::Connection]; a WebTransport
//! connection is a [web_transport_quinn::Session] layered over the same
//! quinn machinery. Both flow through one enum so the session and group
//! layers never branch on the transport again.

use std::sync::Arc;

use moq_core::transport::{RecvStream, SendStream, Session, StreamError};

/// A connection serving MOQ over either native QUIC or WebTransport.
#[derive(Clone)]
pub enum Transport {
	Quic(quinn::Connection),
	WebTransport(web_transport_quinn::Session),
}

/// Errors surfaced by the concrete transports.
#[derive(thiserror::Error, Debug, Clone)]
pub enum TransportError {
	#[error("connection error: {0}")]
	Connection(#[from] quinn::ConnectionError),

	#[error("write error: {0}")]
	Write(#[from] quinn::WriteError),

	#[error("read error: {0}")]
	Read(#[from] quinn::ReadError),

	#[error("webtransport error: {0}")]
	WebTransport(Arc<dyn std::error::Error + Send + Sync>),
}

impl StreamError for TransportError {
	fn reset_code(&self) -> Option<u32> {
		match self {
			Self::Read(quinn::ReadError::Reset(code)) => u32::try_from(code.into_inner()).ok(),
			Self::Write(quinn::WriteError::Stopped(code)) => u32::try_from(code.into_inner()).ok(),
			_ => None,
		}
	}
}

fn wt_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> TransportError {
	TransportError::WebTransport(Arc::new(err))
}

pub enum TransportSend {
	Quic(quinn::SendStream),
	WebTransport(web_transport_quinn::SendStream),
}

impl SendStream for TransportSend {
	type Error = TransportError;

	async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
		match self {
			Self::Quic(stream) => Ok(stream.write(buf).await?),
			Self::WebTransport(stream) => {
				let mut buf = buf;
				web_transport_trait::SendStream::write_buf(stream, &mut buf)
					.await
					.map_err(wt_error)
			}
		}
	}

	fn finish(&mut self) {
		match self {
			Self::Quic(stream) => {
				let _ = stream.finish();
			}
			Self::WebTransport(stream) => {
				let _ = web_transport_trait::SendStream::finish(stream);
			}
		}
	}

	fn reset(&mut self, code: u32) {
		match self {
			Self::Quic(stream) => {
				let _ = stream.reset(quinn::VarInt::from_u32(code));
			}
			Self::WebTransport(stream) => {
				web_transport_trait::SendStream::reset(stream, code);
			}
		}
	}

	async fn closed(&mut self) {
		match self {
			Self::Quic(stream) => {
				let _ = stream.stopped().await;
			}
			Self::WebTransport(stream) => {
				let _ = web_transport_trait::SendStream::closed(stream).await;
			}
		}
	}
}

pub enum TransportRecv {
	Quic(quinn::RecvStream),
	WebTransport(web_transport_quinn::RecvStream),
}

impl RecvStream for TransportRecv {
	type Error = TransportError;

	async fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
		match self {
			Self::Quic(stream) => Ok(stream.read(buf).await?),
			Self::WebTransport(stream) => {
				let mut buf = buf;
				web_transport_trait::RecvStream::read_buf(stream, &mut buf)
					.await
					.map_err(wt_error)
			}
		}
	}

	fn stop(&mut self, code: u32) {
		match self {
			Self::Quic(stream) => {
				let _ = stream.stop(quinn::VarInt::from_u32(code));
			}
			Self::WebTransport(stream) => {
				web_transport_trait::RecvStream::stop(stream, code);
			}
		}
	}
}

impl Session for Transport {
	type SendStream = TransportSend;
	type RecvStream = TransportRecv;
	type Error = TransportError;

	async fn accept_bi(&self) -> Result<(TransportSend, TransportRecv), TransportError> {
		match self {
			Self::Quic(conn) => {
				let (send, recv) = conn.accept_bi().await?;
				Ok((TransportSend::Quic(send), TransportRecv::Quic(recv)))
			}
			Self::WebTransport(session) => {
				let (send, recv) = web_transport_trait::Session::accept_bi(session)
					.await
					.map_err(wt_error)?;
				Ok((TransportSend::WebTransport(send), TransportRecv::WebTransport(recv)))
			}
		}
	}

	async fn open_bi(&self) -> Result<(TransportSend, TransportRecv), TransportError> {
		match self {
			Self::Quic(conn) => {
				let (send, recv) = conn.open_bi().await?;
				Ok((TransportSend::Quic(send), TransportRecv::Quic(recv)))
			}
			Self::WebTransport(session) => {
				let (send, recv) = web_transport_trait::Session::open_bi(session).await.map_err(wt_error)?;
				Ok((TransportSend::WebTransport(send), TransportRecv::WebTransport(recv)))
			}
		}
	}

	async fn accept_uni(&self) -> Result<TransportRecv, TransportError> {
		match self {
			Self::Quic(conn) => Ok(TransportRecv::Quic(conn.accept_uni().await?)),
			Self::WebTransport(session) => Ok(TransportRecv::WebTransport(
				web_transport_trait::Session::accept_uni(session)
					.await
					.map_err(wt_error)?,
			)),
		}
	}

	async fn open_uni(&self) -> Result<TransportSend, TransportError> {
		match self {
			Self::Quic(conn) => Ok(TransportSend::Quic(conn.open_uni().await?)),
			Self::WebTransport(session) => Ok(TransportSend::WebTransport(
				web_transport_trait::Session::open_uni(session).await.map_err(wt_error)?,
			)),
		}
	}

	fn close(&self, code: u32, reason: &str) {
		match self {
			Self::Quic(conn) => conn.close(quinn::VarInt::from_u32(code), reason.as_bytes()),
			Self::WebTransport(session) => web_transport_trait::Session::close(session, code, reason),
		}
	}

	async fn closed(&self) {
		match self {
			Self::Quic(conn) => {
				conn.closed().await;
			}
			Self::WebTransport(session) => {
				let _ = web_transport_trait::Session::closed(session).await;
			}
		}
	}
}
