use std::{cmp, io, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};

use crate::Error;
use crate::transport::RecvStream;

use super::{Decode, DecodeError};

/// How much to request from the transport per read.
const READ_CHUNK: usize = 4096;

/// A buffered reader that decodes messages from a stream.
pub struct Reader<S: RecvStream> {
	stream: S,
	buffer: BytesMut,
}

impl<S: RecvStream> Reader<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	/// Decode the next message from the stream.
	pub async fn decode<T: Decode>(&mut self) -> Result<T, Error> {
		loop {
			let mut cursor = io::Cursor::new(&self.buffer);
			match T::decode(&mut cursor) {
				Ok(msg) => {
					let size = cursor.position() as usize;
					self.buffer.advance(size);
					return Ok(msg);
				}
				Err(DecodeError::Short) => {
					// Try to read more data.
					if !self.fill().await? {
						// Stream closed while we still need more data.
						return Err(Error::Decode(DecodeError::Short));
					}
				}
				Err(e) => return Err(Error::Decode(e)),
			}
		}
	}

	/// Decode the next message, or return None if the stream ended cleanly first.
	pub async fn decode_maybe<T: Decode>(&mut self) -> Result<Option<T>, Error> {
		match self.closed().await {
			Ok(()) => Ok(None),
			Err(Error::Decode(DecodeError::ExpectedEnd)) => Ok(Some(self.decode().await?)),
			Err(e) => Err(e),
		}
	}

	/// Read exactly `size` bytes from the stream.
	///
	/// An early FIN surfaces as [DecodeError::Short]; the partial bytes stay buffered.
	pub async fn read_exact(&mut self, size: usize) -> Result<Bytes, Error> {
		while self.buffer.len() < size {
			if !self.fill().await? {
				return Err(Error::Decode(DecodeError::Short));
			}
		}

		Ok(self.buffer.split_to(size).freeze())
	}

	/// Return a chunk of data, or None once the stream ends.
	pub async fn read(&mut self, max: usize) -> Result<Option<Bytes>, Error> {
		if self.buffer.is_empty() && !self.fill().await? {
			return Ok(None);
		}

		let size = cmp::min(max, self.buffer.len());
		Ok(Some(self.buffer.split_to(size).freeze()))
	}

	/// Wait until the stream ends, erroring if any additional bytes arrive.
	pub async fn closed(&mut self) -> Result<(), Error> {
		if self.buffer.is_empty() && !self.fill().await? {
			return Ok(());
		}

		Err(DecodeError::ExpectedEnd.into())
	}

	/// Ask the peer to stop sending, with the given code.
	pub fn stop(&mut self, code: u32) {
		self.stream.stop(code);
	}

	async fn fill(&mut self) -> Result<bool, Error> {
		let start = self.buffer.len();
		self.buffer.resize(start + READ_CHUNK, 0);

		let result = self.stream.read(&mut self.buffer[start..]).await;
		match result {
			Ok(Some(n)) => {
				self.buffer.truncate(start + n);
				Ok(true)
			}
			Ok(None) => {
				self.buffer.truncate(start);
				Ok(false)
			}
			Err(e) => {
				self.buffer.truncate(start);
				Err(Error::Transport(Arc::new(e)))
			}
		}
	}
}
