use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use moq_core::{ALPN_H3, ALPN_MOQ, SessionErrorCode, accept_session_stream};

use crate::handler::{DefaultSetupHandler, SetupHandler};
use crate::session::{Session, SetupResponder};
use crate::transport::Transport;
use crate::webtransport::{OriginCheck, WebTransportServer, close_guarded};
use crate::Error;

/// Tunables for the MOQ layer.
#[derive(Clone, Debug)]
pub struct Config {
	/// How long a connection may take to complete the setup exchange.
	pub setup_timeout: Duration,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			setup_timeout: Duration::from_secs(5),
		}
	}
}

/// Bind and serve until the server errors, using the default setup handler.
pub async fn listen_and_serve(addr: SocketAddr, tls: rustls::ServerConfig) -> Result<(), Error> {
	let mut server = Server::new(addr);
	server.tls = Some(tls);
	server.listen_and_serve().await
}

/// A MOQ server accepting both native QUIC and WebTransport connections
/// on the same endpoint, dispatched by the negotiated ALPN.
///
/// Configure the public fields before the first serve call; that call
/// snapshots them. Each instance owns listener sockets, so treat it as a
/// resource: tear it down with [Server::close] or [Server::shutdown]
/// rather than leaking it (tests included).
pub struct Server {
	/// Address to bind when using [Server::listen_and_serve].
	pub addr: SocketAddr,

	/// TLS configuration; the ALPN list defaults to `[ALPN_MOQ]` when empty.
	pub tls: Option<rustls::ServerConfig>,

	pub config: Config,

	/// Serves each setup request; [DefaultSetupHandler] when None.
	pub handler: Option<Arc<dyn SetupHandler<Transport>>>,

	/// Validates WebTransport request URLs; None accepts all origins.
	pub check_origin: Option<OriginCheck>,

	state: OnceLock<Arc<State>>,
}

impl Server {
	pub fn new(addr: SocketAddr) -> Self {
		Self {
			addr,
			tls: None,
			config: Config::default(),
			handler: None,
			check_origin: None,
			state: OnceLock::new(),
		}
	}

	pub(crate) fn init(&self) -> Arc<State> {
		self.state
			.get_or_init(|| {
				Arc::new(State {
					config: self.config.clone(),
					handler: self.handler.clone().unwrap_or_else(|| Arc::new(DefaultSetupHandler)),
					webtransport: WebTransportServer::new(self.check_origin.clone()),
					listeners: Default::default(),
					listener_tracker: TaskTracker::new(),
					next_listener_id: Default::default(),
					sessions: Default::default(),
					next_session_id: Default::default(),
					in_shutdown: Default::default(),
					accept: CancellationToken::new(),
					done: CancellationToken::new(),
				})
			})
			.clone()
	}

	/// Whether [Server::close] or [Server::shutdown] was called.
	pub fn shutting_down(&self) -> bool {
		self.state.get().is_some_and(|state| state.shutting_down())
	}

	/// Bind [Server::addr] and serve QUIC connections until shutdown.
	pub async fn listen_and_serve(&self) -> Result<(), Error> {
		let mut tls = self.tls.clone().ok_or(Error::MissingTls)?;

		if tls.alpn_protocols.is_empty() {
			tls.alpn_protocols = vec![ALPN_MOQ.as_bytes().to_vec()];
		}

		self.serve_tls(tls).await
	}

	/// Like [Server::listen_and_serve], loading the certificate and key
	/// from PEM files and advertising both the native and HTTP/3 ALPNs.
	pub async fn listen_and_serve_tls(&self, cert_file: &str, key_file: &str) -> Result<(), Error> {
		if self.shutting_down() {
			return Err(Error::Closed);
		}

		let mut reader = BufReader::new(File::open(cert_file)?);
		let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;

		let mut reader = BufReader::new(File::open(key_file)?);
		let key = rustls_pemfile::private_key(&mut reader)?
			.ok_or_else(|| Error::Tls(format!("no private key in {key_file}")))?;

		let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
		let mut tls = rustls::ServerConfig::builder_with_provider(provider)
			.with_protocol_versions(&[&rustls::version::TLS13])
			.map_err(|e| Error::Tls(e.to_string()))?
			.with_no_client_auth()
			.with_single_cert(certs, key)
			.map_err(|e| Error::Tls(e.to_string()))?;

		tls.alpn_protocols = vec![ALPN_MOQ.as_bytes().to_vec(), ALPN_H3.as_bytes().to_vec()];

		self.serve_tls(tls).await
	}

	async fn serve_tls(&self, tls: rustls::ServerConfig) -> Result<(), Error> {
		let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(tls).map_err(|e| Error::Tls(e.to_string()))?;
		let config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
		let endpoint = quinn::Endpoint::server(config, self.addr)?;

		self.serve_endpoint(endpoint).await
	}

	/// Accept connections on an endpoint the caller built, until shutdown.
	///
	/// Multiple listeners may serve one server concurrently.
	pub async fn serve_endpoint(&self, endpoint: quinn::Endpoint) -> Result<(), Error> {
		let state = self.init();
		if state.shutting_down() {
			return Err(Error::Closed);
		}

		let id = state.add_listener(endpoint.clone());
		tracing::info!(addr = ?endpoint.local_addr().ok(), "listening");

		let accept = state.accept.clone();
		let serve = {
			let state = state.clone();
			async move {
				loop {
					let incoming = tokio::select! {
						// Accept participates in the shutdown signal directly
						// rather than polling a flag.
						_ = accept.cancelled() => return,
						incoming = endpoint.accept() => match incoming {
							Some(incoming) => incoming,
							None => return,
						},
					};

					let state = state.clone();
					tokio::spawn(async move {
						let conn = match incoming.await {
							Ok(conn) => conn,
							Err(err) => {
								tracing::debug!(%err, "handshake failed");
								return;
							}
						};

						if let Err(err) = state.serve_conn(conn).await {
							tracing::warn!(%err, "connection closed");
						}
					});
				}
			}
		};

		state.listener_tracker.track_future(serve).await;
		state.remove_listener(id);

		Err(Error::Closed)
	}

	/// Serve a single, already-accepted QUIC connection, dispatching on the
	/// negotiated ALPN.
	pub async fn serve_conn(&self, conn: quinn::Connection) -> Result<(), Error> {
		self.init().serve_conn(conn).await
	}

	/// Serve a pending WebTransport CONNECT request, when the caller drives
	/// its own HTTP/3 accept loop.
	pub async fn handle_webtransport(&self, request: web_transport_quinn::Request) -> Result<(), Error> {
		let state = self.init();
		if state.shutting_down() {
			return Err(Error::Closed);
		}

		let (session, path) = state.webtransport.complete(request).await?;
		state.serve_transport(Transport::WebTransport(session), Some(path)).await
	}

	/// Terminate immediately: stop listening, close every session with
	/// [SessionErrorCode::NoError], and wait for teardown.
	pub async fn close(&self) -> Result<(), Error> {
		self.init().close().await
	}

	/// Drain gracefully: stop listening, send GOAWAY to every session, and
	/// wait for them to leave. When `ctx` fires first, the stragglers are
	/// closed with [SessionErrorCode::GoAwayTimeout].
	pub async fn shutdown(&self, ctx: CancellationToken) -> Result<(), Error> {
		self.init().shutdown(ctx).await
	}
}

pub(crate) struct State {
	config: Config,
	handler: Arc<dyn SetupHandler<Transport>>,
	pub(crate) webtransport: WebTransportServer,

	listeners: Mutex<HashMap<u64, quinn::Endpoint>>,
	listener_tracker: TaskTracker,
	next_listener_id: AtomicU64,

	sessions: Mutex<HashMap<u64, Session>>,
	next_session_id: AtomicU64,

	in_shutdown: AtomicBool,
	/// Cancels every accept loop.
	accept: CancellationToken,
	/// Fires once the active-session set drains after shutdown began.
	done: CancellationToken,
}

impl State {
	pub(crate) fn shutting_down(&self) -> bool {
		self.in_shutdown.load(Ordering::SeqCst)
	}

	pub(crate) fn next_session_id(&self) -> u64 {
		self.next_session_id.fetch_add(1, Ordering::Relaxed)
	}

	pub(crate) fn setup_timeout(&self) -> Duration {
		self.config.setup_timeout
	}

	pub(crate) fn session_count(&self) -> usize {
		self.sessions.lock().unwrap().len()
	}

	fn add_listener(&self, endpoint: quinn::Endpoint) -> u64 {
		let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
		self.listeners.lock().unwrap().insert(id, endpoint);
		id
	}

	fn remove_listener(&self, id: u64) {
		self.listeners.lock().unwrap().remove(&id);
	}

	pub(crate) fn insert_session(&self, session: Session) {
		self.sessions.lock().unwrap().insert(session.id(), session);
	}

	/// Remove a session; fires the done latch when the last one leaves
	/// during shutdown. Removing twice is a no-op.
	pub(crate) fn remove_session(&self, id: u64) {
		let mut sessions = self.sessions.lock().unwrap();
		if sessions.remove(&id).is_none() {
			return;
		}
		let empty = sessions.is_empty();
		drop(sessions);

		if empty && self.shutting_down() {
			self.done.cancel();
		}
	}

	/// Remove the session once its transport terminates, however that happens.
	pub(crate) fn watch_session(self: &Arc<Self>, session: &Session) {
		let state = self.clone();
		let session = session.clone();

		tokio::spawn(async move {
			session.transport_closed().await;
			state.remove_session(session.id());
			session.mark_closed();
			tracing::debug!(id = session.id(), "session closed");
		});
	}

	pub(crate) async fn serve_conn(self: &Arc<Self>, conn: quinn::Connection) -> Result<(), Error> {
		if self.shutting_down() {
			return Err(Error::Closed);
		}

		let alpn = negotiated_alpn(&conn);
		tracing::debug!(addr = %conn.remote_address(), ?alpn, "serving connection");

		match alpn.as_deref() {
			Some(ALPN_H3) => {
				let (session, path) = self.webtransport.upgrade(conn).await?;
				self.serve_transport(Transport::WebTransport(session), Some(path)).await
			}
			Some(ALPN_MOQ) => self.serve_transport(Transport::Quic(conn), None).await,
			_ => Err(Error::UnsupportedProtocol(alpn)),
		}
	}

	/// Run the setup exchange under the configured timeout, then hand the
	/// session to the handler.
	async fn serve_transport(self: &Arc<Self>, transport: Transport, path: Option<String>) -> Result<(), Error> {
		if self.shutting_down() {
			return Err(Error::Closed);
		}

		let accepting = accept_session_stream(&transport);
		let mut stream = tokio::time::timeout(self.config.setup_timeout, accepting)
			.await
			.map_err(|_| Error::SetupTimeout)?
			.map_err(Error::Moq)?;

		// For WebTransport, the HTTP request path is authoritative.
		if let Some(path) = path {
			stream.set_path(&path);
		}

		let request = stream.request.clone();
		let responder = SetupResponder::new(self.clone(), transport, stream);
		self.handler.serve_moq(responder, request).await;

		Ok(())
	}

	pub(crate) async fn close(self: &Arc<Self>) -> Result<(), Error> {
		if self.in_shutdown.swap(true, Ordering::SeqCst) {
			return Err(Error::Closed);
		}

		// Stop accepting new work before touching sessions.
		self.accept.cancel();

		let sessions: Vec<Session> = self.sessions.lock().unwrap().values().cloned().collect();
		for session in sessions {
			session.close_with_error(SessionErrorCode::NoError, "server closed");
		}

		self.maybe_done();
		self.done.cancelled().await;

		self.teardown_listeners();

		let state = self.clone();
		close_guarded(async move { state.webtransport.close() }).await;

		self.listener_tracker.close();
		self.listener_tracker.wait().await;

		Ok(())
	}

	pub(crate) async fn shutdown(self: &Arc<Self>, ctx: CancellationToken) -> Result<(), Error> {
		if self.in_shutdown.swap(true, Ordering::SeqCst) {
			return Err(Error::Closed);
		}

		self.accept.cancel();

		// Best effort: a session that cannot take the GOAWAY right now will
		// be force-closed at the deadline anyway.
		let sessions: Vec<Session> = self.sessions.lock().unwrap().values().cloned().collect();
		for session in &sessions {
			session.go_away("");
		}

		self.maybe_done();

		tokio::select! {
			_ = self.done.cancelled() => {}
			_ = ctx.cancelled() => {
				tracing::warn!("shutdown deadline exceeded, closing remaining sessions");

				let sessions: Vec<Session> = self.sessions.lock().unwrap().values().cloned().collect();
				for session in sessions {
					session.close_with_error(SessionErrorCode::GoAwayTimeout, "goaway timeout");
				}

				self.done.cancelled().await;
			}
		}

		self.teardown_listeners();

		let state = self.clone();
		let deadline = ctx.clone();
		close_guarded(async move { state.webtransport.shutdown(&deadline).await }).await;

		self.listener_tracker.close();
		self.listener_tracker.wait().await;

		Ok(())
	}

	// The done latch is a cancellation token, so firing it twice is
	// inherently a no-op: it closes exactly once.
	fn maybe_done(&self) {
		if self.sessions.lock().unwrap().is_empty() {
			self.done.cancel();
		}
	}

	fn teardown_listeners(&self) {
		let listeners: Vec<quinn::Endpoint> = self.listeners.lock().unwrap().drain().map(|(_, ep)| ep).collect();
		for endpoint in listeners {
			endpoint.close(quinn::VarInt::from_u32(0), b"server closed");
		}
	}
}

fn negotiated_alpn(conn: &quinn::Connection) -> Option<String> {
	let data = conn.handshake_data()?;
	let data = data.downcast_ref::<quinn::crypto::rustls::HandshakeData>()?;
	data.protocol.as_ref().map(|alpn| String::from_utf8_lossy(alpn).into_owned())
}

#[cfg(test)]
mod tests {
	use tokio::sync::mpsc;

	use moq_core::mock::MockSession;

	use crate::session::Command;

	use super::*;

	fn test_server() -> Server {
		Server::new("127.0.0.1:0".parse().unwrap())
	}

	fn fake_session(state: &Arc<State>) -> (Session, MockSession, mpsc::Receiver<Command>) {
		let transport = MockSession::new();
		let (control, commands) = mpsc::channel(8);
		let session = Session::new(
			state.next_session_id(),
			Arc::new(transport.clone()),
			control,
			moq_core::Context::new(),
		);

		state.insert_session(session.clone());
		state.watch_session(&session);

		(session, transport, commands)
	}

	fn deadline(after: Duration) -> CancellationToken {
		let ctx = CancellationToken::new();
		let timer = ctx.clone();
		tokio::spawn(async move {
			tokio::time::sleep(after).await;
			timer.cancel();
		});
		ctx
	}

	#[tokio::test]
	async fn test_close_with_no_sessions() {
		let server = test_server();
		server.close().await.unwrap();

		// Shutdown is terminal and idempotent.
		assert!(matches!(server.close().await, Err(Error::Closed)));
		assert!(matches!(server.shutdown(CancellationToken::new()).await, Err(Error::Closed)));
		assert!(server.shutting_down());
	}

	#[tokio::test]
	async fn test_shutdown_with_no_sessions() {
		let server = test_server();
		server.shutdown(deadline(Duration::from_secs(1))).await.unwrap();
		assert!(matches!(server.close().await, Err(Error::Closed)));
	}

	#[tokio::test]
	async fn test_close_terminates_sessions() {
		let server = test_server();
		let state = server.init();

		let (_session, transport, _commands) = fake_session(&state);
		let (_session2, transport2, _commands2) = fake_session(&state);
		assert_eq!(state.session_count(), 2);

		server.close().await.unwrap();

		assert_eq!(transport.close_code(), Some(SessionErrorCode::NoError.into()));
		assert_eq!(transport2.close_code(), Some(SessionErrorCode::NoError.into()));
		assert_eq!(state.session_count(), 0);
	}

	#[tokio::test]
	async fn test_graceful_shutdown_with_cooperative_session() {
		let server = test_server();
		let state = server.init();

		let (_session, transport, mut commands) = fake_session(&state);

		// A cooperative client: drain as soon as the GOAWAY arrives.
		let peer = transport.clone();
		tokio::spawn(async move {
			if let Some(Command::GoAway(url)) = commands.recv().await {
				assert_eq!(url, "");
				moq_core::transport::Session::close(&peer, SessionErrorCode::NoError.into(), "draining");
			}
		});

		server.shutdown(deadline(Duration::from_secs(1))).await.unwrap();

		assert_eq!(transport.close_code(), Some(SessionErrorCode::NoError.into()));
		assert_eq!(state.session_count(), 0);
		assert!(matches!(
			server.shutdown(CancellationToken::new()).await,
			Err(Error::Closed)
		));
	}

	#[tokio::test]
	async fn test_shutdown_deadline_forces_close() {
		let server = test_server();
		let state = server.init();

		// This session never reacts to GOAWAY.
		let (_session, transport, _commands) = fake_session(&state);

		server.shutdown(deadline(Duration::from_millis(50))).await.unwrap();

		assert_eq!(transport.close_code(), Some(SessionErrorCode::GoAwayTimeout.into()));
		assert_eq!(state.session_count(), 0);
	}

	#[tokio::test]
	async fn test_removal_before_shutdown_does_not_fire_done() {
		let server = test_server();
		let state = server.init();

		let (session, transport, _commands) = fake_session(&state);
		moq_core::transport::Session::close(&transport, SessionErrorCode::NoError.into(), "client left");
		session.closed().await;

		// The set drained while running; the done latch stays armed until
		// shutdown actually begins.
		assert_eq!(state.session_count(), 0);
		assert!(!state.done.is_cancelled());

		server.close().await.unwrap();
		assert!(state.done.is_cancelled());
	}

	#[tokio::test]
	async fn test_double_removal_is_noop() {
		let server = test_server();
		let state = server.init();

		let (session, _transport, _commands) = fake_session(&state);
		state.remove_session(session.id());
		state.remove_session(session.id());
		assert_eq!(state.session_count(), 0);

		server.close().await.unwrap();
	}

	#[tokio::test]
	async fn test_listen_requires_tls() {
		let server = test_server();
		assert!(matches!(server.listen_and_serve().await, Err(Error::MissingTls)));
	}
}
