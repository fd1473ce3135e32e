use bytes::{Bytes, BytesMut};

use super::VarInt;

/// Encode a value into a buffer.
pub trait Encode: Sized {
	/// Encode the value to the given writer.
	///
	/// This will panic if the [bytes::BufMut] does not have enough capacity.
	fn encode<W: bytes::BufMut>(&self, w: &mut W);

	/// Encode the value into a [Bytes] buffer.
	///
	/// NOTE: This will allocate.
	fn encode_bytes(&self) -> Bytes {
		let mut buf = BytesMut::new();
		self.encode(&mut buf);
		buf.freeze()
	}
}

impl Encode for bool {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		w.put_u8(*self as u8);
	}
}

impl Encode for u8 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		w.put_u8(*self);
	}
}

impl Encode for u16 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		w.put_u16(*self);
	}
}

impl Encode for u64 {
	/// Encode a varint; panics when the value needs more than 62 bits.
	///
	/// Use [VarInt::try_from] where the value is not known to be in range.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		VarInt::try_from(*self).expect("varint overflow").encode(w)
	}
}

impl Encode for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		VarInt::try_from(*self).expect("varint overflow").encode(w)
	}
}

impl Encode for String {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.as_str().encode(w)
	}
}

impl Encode for &str {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.len().encode(w);
		w.put(self.as_bytes());
	}
}

impl Encode for Vec<u8> {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.len().encode(w);
		w.put_slice(self);
	}
}

impl Encode for Bytes {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.len().encode(w);
		w.put_slice(self);
	}
}
