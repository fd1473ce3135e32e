use crate::coding::{Encode, Stream};
use crate::message::{
	ControlMessageType, GoAway, ParameterType, Parameters, SessionClient, SessionServer, StreamType, Versions,
};
use crate::transport::Session;
use crate::{Context, Error, SessionErrorCode};

/// The ALPN for MOQ over raw QUIC.
pub const ALPN_MOQ: &str = "moq-00";

/// The ALPN for HTTP/3, used by WebTransport sessions.
pub const ALPN_H3: &str = "h3";

/// Everything learned about a client during the setup exchange.
///
/// Immutable once handed to the setup handler.
#[derive(Clone, Debug)]
pub struct SetupRequest {
	/// The requested path. For WebTransport this is the HTTP request path;
	/// for native QUIC it is whatever the client put in the PATH parameter
	/// (empty when absent).
	pub path: String,

	/// The versions the client offered, in its preference order.
	pub versions: Versions,

	/// The raw client extensions, including PATH.
	pub extensions: Parameters,

	context: Context,
}

impl SetupRequest {
	/// A scope bound to the session stream's lifetime.
	pub fn context(&self) -> &Context {
		&self.context
	}
}

/// A control message with its wire tag.
struct Tagged<'a, T>(ControlMessageType, &'a T);

impl<T: Encode> Encode for Tagged<'_, T> {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w);
		self.1.encode(w);
	}
}

/// The session stream with a decoded setup offer.
pub struct SessionStream<S: Session> {
	stream: Stream<S>,
	pub request: SetupRequest,
}

impl<S: Session> SessionStream<S> {
	/// Override the request path; the HTTP URL is authoritative for WebTransport.
	pub fn set_path(&mut self, path: &str) {
		self.request.path = path.to_string();
	}

	pub fn context(&self) -> &Context {
		&self.request.context
	}

	/// Send the setup answer, accepting the session.
	pub async fn respond(&mut self, response: &SessionServer) -> Result<(), Error> {
		self.stream.writer.encode(response).await
	}

	/// Send a GOAWAY, asking the client to drain and reconnect at `url`.
	pub async fn send_goaway(&mut self, url: &str) -> Result<(), Error> {
		let msg = GoAway { url: url.to_string() };
		self.stream.writer.encode(&Tagged(ControlMessageType::GoAway, &msg)).await
	}

	/// Abort the session stream with the error's code.
	pub fn abort(&mut self, err: &Error) {
		if !self.request.context.cancel(err.clone()) {
			return;
		}
		self.stream.writer.reset(err.to_code());
		self.stream.reader.stop(err.to_code());
	}
}

/// Accept the first bidirectional stream of a connection and decode the setup offer.
///
/// The caller bounds this with the configured setup timeout.
pub async fn accept_session_stream<S: Session>(session: &S) -> Result<SessionStream<S>, Error> {
	let mut stream = Stream::accept(session).await?;

	let stream_type: StreamType = stream.reader.decode().await.map_err(setup_error)?;
	if stream_type != StreamType::Session {
		return Err(Error::UnsupportedStream);
	}

	let client: SessionClient = stream.reader.decode().await.map_err(setup_error)?;
	let path = client.parameters.get_string(ParameterType::Path).unwrap_or_default();

	tracing::debug!(%path, versions = ?client.versions, "received session offer");

	let request = SetupRequest {
		path,
		versions: client.versions,
		extensions: client.parameters,
		context: Context::new(),
	};

	Ok(SessionStream { stream, request })
}

// A peer reset with an application code during setup is a session error,
// distinguishable from a malformed offer.
fn setup_error(err: Error) -> Error {
	if let Error::Transport(e) = &err {
		if let Some(code) = e.reset_code() {
			return Error::Session(SessionErrorCode::from(code));
		}
	}

	err
}
