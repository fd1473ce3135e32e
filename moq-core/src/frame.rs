use bytes::Bytes;

use crate::Error;

/// A source of frame bytes: a length plus a copy into a caller buffer.
pub trait FrameSource {
	/// The current payload length in bytes (not capacity).
	fn byte_len(&self) -> usize;

	/// Copy the payload into the front of `dst`.
	///
	/// Fails with [Error::BufferTooSmall] when `dst` is shorter than [Self::byte_len].
	fn copy_to(&self, dst: &mut [u8]) -> Result<(), Error>;
}

/// A sink for frame bytes.
pub trait FrameSink {
	/// Replace the sink's contents with `src`.
	fn write(&mut self, src: &[u8]);
}

/// A reusable frame payload buffer; the default [FrameSource] + [FrameSink].
///
/// [FrameSink::write] REPLACES the contents rather than appending, so one
/// buffer can be recycled across frames. The backing allocation is resized
/// to exactly the incoming length whenever it is too small or would waste
/// more than about half its capacity, so a large frame does not pin its
/// allocation for the rest of the group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBuffer {
	data: Vec<u8>,
}

impl FrameBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			data: Vec::with_capacity(capacity),
		}
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.data
	}

	pub fn capacity(&self) -> usize {
		self.data.capacity()
	}
}

impl FrameSource for FrameBuffer {
	fn byte_len(&self) -> usize {
		self.data.len()
	}

	fn copy_to(&self, dst: &mut [u8]) -> Result<(), Error> {
		self.data.as_slice().copy_to(dst)
	}
}

impl FrameSink for FrameBuffer {
	fn write(&mut self, src: &[u8]) {
		if self.data.capacity() < src.len() || self.data.capacity() > 2 * src.len() {
			self.data = Vec::with_capacity(src.len());
		}

		self.data.clear();
		self.data.extend_from_slice(src);
	}
}

impl FrameSource for [u8] {
	fn byte_len(&self) -> usize {
		self.len()
	}

	fn copy_to(&self, dst: &mut [u8]) -> Result<(), Error> {
		if dst.len() < self.len() {
			return Err(Error::BufferTooSmall);
		}

		dst[..self.len()].copy_from_slice(self);
		Ok(())
	}
}

impl FrameSource for Vec<u8> {
	fn byte_len(&self) -> usize {
		self.len()
	}

	fn copy_to(&self, dst: &mut [u8]) -> Result<(), Error> {
		self.as_slice().copy_to(dst)
	}
}

impl FrameSource for Bytes {
	fn byte_len(&self) -> usize {
		self.len()
	}

	fn copy_to(&self, dst: &mut [u8]) -> Result<(), Error> {
		self.as_ref().copy_to(dst)
	}
}

impl FrameSink for Vec<u8> {
	fn write(&mut self, src: &[u8]) {
		self.clear();
		self.extend_from_slice(src);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_replaces() {
		let mut buffer = FrameBuffer::new();
		buffer.write(&[1, 2, 3]);
		buffer.write(&[4, 5]);
		assert_eq!(buffer.as_slice(), &[4, 5]);
		assert_eq!(buffer.byte_len(), 2);
	}

	#[test]
	fn test_write_empty() {
		let mut buffer = FrameBuffer::new();
		buffer.write(&[1, 2, 3]);
		buffer.write(&[]);
		assert_eq!(buffer.byte_len(), 0);
	}

	#[test]
	fn test_copy_to_too_small() {
		let mut buffer = FrameBuffer::new();
		buffer.write(&[1, 2, 3]);

		let mut dst = [0u8; 2];
		assert!(matches!(buffer.copy_to(&mut dst), Err(Error::BufferTooSmall)));

		let mut dst = [0u8; 4];
		buffer.copy_to(&mut dst).unwrap();
		assert_eq!(&dst[..3], &[1, 2, 3]);
	}

	#[test]
	fn test_shrinks_wasteful_allocation() {
		let mut buffer = FrameBuffer::with_capacity(4096);
		buffer.write(&[7; 8]);

		// 4096 capacity for an 8 byte frame is more than 2x waste.
		assert!(buffer.capacity() < 4096);
		assert_eq!(buffer.as_slice(), &[7; 8]);
	}

	#[test]
	fn test_reuses_snug_allocation() {
		let mut buffer = FrameBuffer::with_capacity(16);
		buffer.write(&[1; 10]);
		assert_eq!(buffer.capacity(), 16);

		buffer.write(&[2; 12]);
		assert_eq!(buffer.capacity(), 16);
		assert_eq!(buffer.as_slice(), &[2; 12]);
	}
}
