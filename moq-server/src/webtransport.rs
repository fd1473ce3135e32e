//! The WebTransport half of the acceptor.
//!
//! [web_transport_quinn] drives the HTTP/3 layer: the SETTINGS frame
//! advertising WebTransport support (datagrams plus the 0x2b603742 flag)
//! and the Extended CONNECT exchange both happen inside the upgrade
//! handshake. This wrapper owns the policy around that machinery: origin
//! checks, the authoritative request path, session tracking, and a
//! teardown that cannot hang server shutdown.

use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use moq_core::SessionErrorCode;

use crate::Error;

/// Decides whether a WebTransport request's URL is allowed.
pub type OriginCheck = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// How long server teardown waits for the WebTransport layer to close.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Accepts WebTransport sessions on HTTP/3-negotiated QUIC connections.
pub struct WebTransportServer {
	check_origin: Option<OriginCheck>,
	sessions: Mutex<Vec<web_transport_quinn::Session>>,
}

impl WebTransportServer {
	/// A `None` origin check accepts every origin.
	pub fn new(check_origin: Option<OriginCheck>) -> Self {
		Self {
			check_origin,
			sessions: Mutex::new(Vec::new()),
		}
	}

	/// Drive the CONNECT handshake on a fresh HTTP/3 connection, returning
	/// the session and the HTTP request path.
	pub async fn upgrade(&self, conn: quinn::Connection) -> Result<(web_transport_quinn::Session, String), Error> {
		let request = web_transport_quinn::Request::accept(conn)
			.await
			.map_err(|e| Error::Upgrade(Arc::new(e)))?;

		self.complete(request).await
	}

	/// Apply the origin check and answer a pending CONNECT request.
	pub async fn complete(
		&self,
		request: web_transport_quinn::Request,
	) -> Result<(web_transport_quinn::Session, String), Error> {
		let url = request.url().clone();

		if let Some(check) = &self.check_origin {
			if !check(&url) {
				tracing::debug!(%url, "origin rejected");
				let _ = request.close(http::StatusCode::FORBIDDEN).await;
				return Err(Error::OriginRejected);
			}
		}

		let session = request.ok().await.map_err(|e| Error::Upgrade(Arc::new(e)))?;
		self.sessions.lock().unwrap().push(session.clone());

		Ok((session, url.path().to_string()))
	}

	/// Close every session accepted through this wrapper.
	pub fn close(&self) {
		let sessions = mem::take(&mut *self.sessions.lock().unwrap());
		for session in sessions {
			web_transport_trait::Session::close(&session, SessionErrorCode::NoError.into(), "server closed");
		}
	}

	/// Close all sessions and wait for them to terminate, bounded by `ctx`.
	pub async fn shutdown(&self, ctx: &CancellationToken) {
		let sessions = mem::take(&mut *self.sessions.lock().unwrap());
		for session in &sessions {
			web_transport_trait::Session::close(session, SessionErrorCode::NoError.into(), "server closed");
		}

		for session in &sessions {
			tokio::select! {
				_ = ctx.cancelled() => return,
				_ = web_transport_trait::Session::closed(session) => {}
			}
		}
	}
}

/// Run a close routine on its own task, bounded by [CLOSE_TIMEOUT].
///
/// A hang or panic in the underlying implementation must not prevent
/// server teardown from terminating.
pub(crate) async fn close_guarded<F>(close: F)
where
	F: Future<Output = ()> + Send + 'static,
{
	let task = tokio::spawn(close);

	match tokio::time::timeout(CLOSE_TIMEOUT, task).await {
		Ok(Ok(())) => {}
		Ok(Err(err)) => tracing::warn!(%err, "webtransport close panicked"),
		Err(_) => tracing::warn!("webtransport close timed out"),
	}
}

#[cfg(test)]
mod tests {
	use std::time::Instant;

	use super::*;

	#[test]
	fn test_construct_without_origin_check() {
		// A nil origin check must not panic and accepts everything.
		let server = WebTransportServer::new(None);
		server.close();

		let allow: OriginCheck = Arc::new(|url: &Url| url.host_str() == Some("trusted.example"));
		let server = WebTransportServer::new(Some(allow));
		server.close();
	}

	#[tokio::test]
	async fn test_close_guarded_completes() {
		close_guarded(async {}).await;
	}

	#[tokio::test]
	async fn test_close_guarded_times_out() {
		let start = Instant::now();
		close_guarded(std::future::pending()).await;

		let elapsed = start.elapsed();
		assert!(elapsed >= CLOSE_TIMEOUT);
		assert!(elapsed < Duration::from_secs(2));
	}

	#[tokio::test]
	async fn test_close_guarded_swallows_panic() {
		close_guarded(async { panic!("underlying implementation panicked") }).await;
	}

	#[tokio::test]
	async fn test_shutdown_with_no_sessions() {
		let server = WebTransportServer::new(None);
		server.shutdown(&CancellationToken::new()).await;
	}
}
