use std::sync::Arc;

use crate::Error;
use crate::transport::Session;

use super::{Reader, Writer};

/// A [Writer] and [Reader] pair for a single bidirectional stream.
pub struct Stream<S: Session> {
	pub writer: Writer<S::SendStream>,
	pub reader: Reader<S::RecvStream>,
}

impl<S: Session> Stream<S> {
	/// Open a new bidirectional stream.
	pub async fn open(session: &S) -> Result<Self, Error> {
		let (send, recv) = session.open_bi().await.map_err(|e| Error::Transport(Arc::new(e)))?;

		Ok(Self {
			writer: Writer::new(send),
			reader: Reader::new(recv),
		})
	}

	/// Accept the next bidirectional stream.
	pub async fn accept(session: &S) -> Result<Self, Error> {
		let (send, recv) = session.accept_bi().await.map_err(|e| Error::Transport(Arc::new(e)))?;

		Ok(Self {
			writer: Writer::new(send),
			reader: Reader::new(recv),
		})
	}
}
