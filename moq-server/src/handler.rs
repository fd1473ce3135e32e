use std::future::Future;
use std::pin::Pin;

use moq_core::message::{Parameters, VERSIONS};
use moq_core::transport;
use moq_core::{SessionErrorCode, SetupRequest};

use crate::session::SetupResponder;

/// Serves the setup exchange: inspect the request, then accept or reject.
///
/// The routing of paths to applications lives above this crate; a handler
/// is the seam where it plugs in. If the handler returns without
/// answering, the session is closed with [SessionErrorCode::NoError].
pub trait SetupHandler<S: transport::Session>: Send + Sync {
	fn serve_moq(
		&self,
		responder: SetupResponder<S>,
		request: SetupRequest,
	) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Wraps a closure as a [SetupHandler].
pub struct SetupHandlerFn<F>(pub F);

impl<S, F, Fut> SetupHandler<S> for SetupHandlerFn<F>
where
	S: transport::Session,
	F: Fn(SetupResponder<S>, SetupRequest) -> Fut + Send + Sync,
	Fut: Future<Output = ()> + Send + 'static,
{
	fn serve_moq(
		&self,
		responder: SetupResponder<S>,
		request: SetupRequest,
	) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
		Box::pin((self.0)(responder, request))
	}
}

/// The default handler: accept every session with the best mutual version.
pub struct DefaultSetupHandler;

impl<S: transport::Session> SetupHandler<S> for DefaultSetupHandler {
	fn serve_moq(
		&self,
		responder: SetupResponder<S>,
		request: SetupRequest,
	) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
		Box::pin(async move {
			match request.versions.select(&VERSIONS) {
				Some(version) => {
					if let Err(err) = responder.accept(version, Parameters::default()).await {
						tracing::debug!(%err, "failed to accept session");
					}
				}
				None => responder.reject(SessionErrorCode::ProtocolViolation, "no supported version"),
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use bytes::BytesMut;

	use moq_core::accept_session_stream;
	use moq_core::coding::{Encode, Reader};
	use moq_core::message::{SessionClient, SessionServer, StreamType, Version, Versions};
	use moq_core::mock::MockSession;
	use moq_core::transport::SendStream as _;

	use super::*;
	use crate::Server;

	async fn drive(versions: Versions) -> (MockSession, moq_core::mock::MockRecv) {
		let mock = MockSession::new();
		let (mut peer_send, peer_recv) = mock.connect_bi();

		let client = SessionClient {
			versions,
			parameters: Parameters::default(),
		};
		let mut buf = BytesMut::new();
		StreamType::Session.encode(&mut buf);
		client.encode(&mut buf);
		peer_send.write(&buf).await.unwrap();

		let state = Server::new("127.0.0.1:0".parse().unwrap()).init();
		let stream = accept_session_stream(&mock).await.unwrap();
		let request = stream.request.clone();
		let responder = SetupResponder::new(state, mock.clone(), stream);

		DefaultSetupHandler.serve_moq(responder, request).await;
		(mock, peer_recv)
	}

	#[tokio::test]
	async fn test_default_handler_accepts() {
		let (mock, peer_recv) = drive(VERSIONS.into()).await;

		let answer: SessionServer = Reader::new(peer_recv).decode().await.unwrap();
		assert_eq!(answer.version, Version::DRAFT_02);
		assert_eq!(mock.close_code(), None);
	}

	#[tokio::test]
	async fn test_default_handler_rejects_unknown_versions() {
		let (mock, _peer_recv) = drive(vec![Version(0xdead)].into()).await;
		assert_eq!(mock.close_code(), Some(SessionErrorCode::ProtocolViolation.into()));
	}
}
