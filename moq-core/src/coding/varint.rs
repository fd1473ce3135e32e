use std::fmt;

use thiserror::Error;

use super::{Decode, DecodeError, Encode};

/// The largest value representable as a QUIC variable-length integer.
pub const MAX_VARINT: u64 = (1 << 62) - 1;

/// The value is too large to encode as a varint.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("value out of varint range")]
pub struct BoundsExceeded;

/// An unsigned integer bounded to 62 bits (RFC 9000 §16).
///
/// The top two bits of the first byte select a 1, 2, 4, or 8 byte encoding.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
	pub const MAX: Self = Self(MAX_VARINT);
	pub const ZERO: Self = Self(0);

	pub const fn from_u32(v: u32) -> Self {
		Self(v as u64)
	}

	pub const fn into_inner(self) -> u64 {
		self.0
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(v: u64) -> Result<Self, BoundsExceeded> {
		match v <= MAX_VARINT {
			true => Ok(Self(v)),
			false => Err(BoundsExceeded),
		}
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(v: usize) -> Result<Self, BoundsExceeded> {
		Self::try_from(v as u64)
	}
}

impl From<VarInt> for u64 {
	fn from(v: VarInt) -> Self {
		v.0
	}
}

impl From<u32> for VarInt {
	fn from(v: u32) -> Self {
		Self(v as u64)
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		if !buf.has_remaining() {
			return Err(DecodeError::Short);
		}

		let size = 1usize << (buf.chunk()[0] >> 6);
		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		let mut bytes = [0u8; 8];
		buf.copy_to_slice(&mut bytes[..size]);
		bytes[0] &= 0x3f;

		let mut v = 0u64;
		for b in &bytes[..size] {
			v = (v << 8) | *b as u64;
		}

		Ok(Self(v))
	}
}

impl Encode for VarInt {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		let v = self.0;
		if v <= 0x3f {
			w.put_u8(v as u8);
		} else if v <= 0x3fff {
			w.put_u16(0x4000 | v as u16);
		} else if v <= 0x3fff_ffff {
			w.put_u32(0x8000_0000 | v as u32);
		} else {
			w.put_u64(0xc000_0000_0000_0000 | v);
		}
	}
}
