use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::Error;
use crate::transport::SendStream;

use super::Encode;

/// A buffered writer that encodes messages to a stream.
///
/// The stream is reset on drop, so a writer abandoned mid-group does not
/// leave the peer waiting for a FIN.
pub struct Writer<S: SendStream> {
	stream: Option<S>,
	buffer: BytesMut,
}

impl<S: SendStream> Writer<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream: Some(stream),
			buffer: Default::default(),
		}
	}

	/// Encode the given message to the stream.
	pub async fn encode<T: Encode>(&mut self, msg: &T) -> Result<(), Error> {
		self.buffer.clear();
		msg.encode(&mut self.buffer);
		self.flush().await
	}

	/// Write the entire slice to the stream.
	pub async fn write_all(&mut self, mut data: &[u8]) -> Result<(), Error> {
		while !data.is_empty() {
			let n = self
				.stream
				.as_mut()
				.unwrap()
				.write(data)
				.await
				.map_err(|e| Error::Transport(Arc::new(e)))?;
			data = &data[n..];
		}

		Ok(())
	}

	/// A scratch buffer the caller can fill before [Self::flush].
	pub(crate) fn scratch(&mut self) -> &mut BytesMut {
		self.buffer.clear();
		&mut self.buffer
	}

	/// Drain the internal buffer to the stream.
	pub(crate) async fn flush(&mut self) -> Result<(), Error> {
		while !self.buffer.is_empty() {
			let n = self
				.stream
				.as_mut()
				.unwrap()
				.write(self.buffer.chunk())
				.await
				.map_err(|e| Error::Transport(Arc::new(e)))?;
			self.buffer.advance(n);
		}

		Ok(())
	}

	/// Mark the stream as finished (graceful FIN).
	pub fn finish(&mut self) {
		self.stream.as_mut().unwrap().finish();
	}

	/// Reset the stream with the given code.
	pub fn reset(&mut self, code: u32) {
		self.stream.as_mut().unwrap().reset(code);
	}

	/// Wait until the peer acknowledged the FIN or the stream died.
	pub async fn closed(&mut self) {
		self.stream.as_mut().unwrap().closed().await
	}
}

impl<S: SendStream> Drop for Writer<S> {
	fn drop(&mut self) {
		// We need the Option so a finished stream isn't reset twice by accident;
		// the adapters additionally treat reset-after-terminal as a no-op.
		if let Some(mut stream) = self.stream.take() {
			stream.reset(Error::Cancel.to_code());
		}
	}
}
