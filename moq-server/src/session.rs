use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use moq_core::message::{Parameters, SessionServer, Version};
use moq_core::transport;
use moq_core::{Context, Error as MoqError, SessionErrorCode, SessionStream, SetupRequest};

use crate::Error;
use crate::server::State;

/// Dyn-compatible view of a transport session, so the lifecycle layer does
/// not care which QUIC flavor a session runs over (and tests can fake one).
pub(crate) trait SessionTransport: Send + Sync {
	fn close(&self, code: u32, reason: &str);
	fn closed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl<S: transport::Session> SessionTransport for S {
	fn close(&self, code: u32, reason: &str) {
		transport::Session::close(self, code, reason);
	}

	fn closed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
		Box::pin(transport::Session::closed(self))
	}
}

pub(crate) enum Command {
	GoAway(String),
}

/// A handle to an accepted session.
///
/// Registered with the server on accept and removed exactly once when the
/// underlying connection terminates; it is never re-added.
#[derive(Clone)]
pub struct Session {
	id: u64,
	transport: Arc<dyn SessionTransport>,
	control: mpsc::Sender<Command>,
	ctx: Context,
}

impl Session {
	pub(crate) fn new(id: u64, transport: Arc<dyn SessionTransport>, control: mpsc::Sender<Command>, ctx: Context) -> Self {
		Self {
			id,
			transport,
			control,
			ctx,
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	/// Close the underlying connection with an application error code.
	pub fn close_with_error(&self, code: SessionErrorCode, reason: &str) {
		self.ctx.cancel(MoqError::Session(code));
		self.transport.close(code.into(), reason);
	}

	/// Ask the client to drain and reconnect at `url`. Best effort: a full
	/// or closed control channel is ignored.
	pub fn go_away(&self, url: &str) {
		let _ = self.control.try_send(Command::GoAway(url.to_string()));
	}

	/// A scope that terminates when the session does.
	pub fn context(&self) -> &Context {
		&self.ctx
	}

	/// Wait until the session terminates.
	pub async fn closed(&self) {
		self.ctx.done().await
	}

	pub(crate) async fn transport_closed(&self) {
		self.transport.closed().await
	}

	pub(crate) fn mark_closed(&self) {
		self.ctx.cancel(MoqError::Cancel);
	}
}

/// Accepts or rejects a session after the setup offer was decoded.
///
/// Dropping the responder without answering closes the session with
/// [SessionErrorCode::NoError]; a handler that neither answers nor returns
/// before the setup timeout has its session aborted by a watchdog.
pub struct SetupResponder<S: transport::Session = crate::Transport> {
	inner: Option<Responder<S>>,
	answered: Arc<AtomicBool>,
}

struct Responder<S: transport::Session> {
	state: Arc<State>,
	transport: S,
	stream: SessionStream<S>,
}

impl<S: transport::Session> SetupResponder<S> {
	pub(crate) fn new(state: Arc<State>, transport: S, stream: SessionStream<S>) -> Self {
		let answered = Arc::new(AtomicBool::new(false));

		{
			let answered = answered.clone();
			let transport = transport.clone();
			let timeout = state.setup_timeout();

			tokio::spawn(async move {
				tokio::time::sleep(timeout).await;
				if !answered.load(Ordering::SeqCst) {
					tracing::warn!("setup not answered in time, aborting session");
					transport::Session::close(
						&transport,
						SessionErrorCode::InternalError.into(),
						"setup timed out",
					);
				}
			});
		}

		Self {
			inner: Some(Responder {
				state,
				transport,
				stream,
			}),
			answered,
		}
	}

	/// The decoded setup offer.
	pub fn request(&self) -> &SetupRequest {
		&self.inner.as_ref().unwrap().stream.request
	}

	/// Answer the setup, register the session with the server, and start
	/// serving control traffic.
	pub async fn accept(mut self, version: Version, parameters: Parameters) -> Result<Session, Error> {
		self.answered.store(true, Ordering::SeqCst);

		let Responder {
			state,
			transport,
			mut stream,
		} = self.inner.take().unwrap();

		stream
			.respond(&SessionServer { version, parameters })
			.await
			.map_err(Error::Moq)?;

		let ctx = stream.context().clone();
		let (control, commands) = mpsc::channel(8);
		let session = Session::new(state.next_session_id(), Arc::new(transport), control, ctx.clone());

		state.insert_session(session.clone());
		state.watch_session(&session);

		tokio::spawn(run_control(stream, commands, ctx));

		tracing::debug!(id = session.id(), ?version, "session accepted");
		Ok(session)
	}

	/// Refuse the session, aborting the session stream and the connection.
	pub fn reject(mut self, code: SessionErrorCode, reason: &str) {
		self.answered.store(true, Ordering::SeqCst);

		let Responder {
			transport, mut stream, ..
		} = self.inner.take().unwrap();

		tracing::debug!(?code, reason, "session rejected");
		stream.abort(&MoqError::Session(code));
		transport::Session::close(&transport, code.into(), reason);
	}
}

impl<S: transport::Session> Drop for SetupResponder<S> {
	fn drop(&mut self) {
		// The handler returned without answering.
		if let Some(responder) = self.inner.take() {
			self.answered.store(true, Ordering::SeqCst);
			transport::Session::close(&responder.transport, SessionErrorCode::NoError.into(), "unhandled setup");
		}
	}
}

// Serves GOAWAY commands on the session stream until the session ends.
async fn run_control<S: transport::Session>(
	mut stream: SessionStream<S>,
	mut commands: mpsc::Receiver<Command>,
	ctx: Context,
) {
	loop {
		tokio::select! {
			command = commands.recv() => match command {
				Some(Command::GoAway(url)) => {
					if let Err(err) = stream.send_goaway(&url).await {
						tracing::debug!(%err, "failed to send goaway");
						return;
					}
				}
				None => return,
			},
			_ = ctx.done() => return,
		}
	}
}
