use std::string::FromUtf8Error;

use thiserror::Error;

use super::{BoundsExceeded, VarInt};

/// Decode a value from a contiguous buffer.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
pub trait Decode: Sized {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("invalid message: {0:?}")]
	InvalidMessage(u64),

	#[error("invalid value")]
	InvalidValue,

	#[error("too many")]
	TooMany,

	#[error("bounds exceeded")]
	BoundsExceeded(#[from] BoundsExceeded),

	#[error("expected end")]
	ExpectedEnd,

	#[error("duplicate")]
	Duplicate,
}

impl Decode for bool {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		match u8::decode(buf)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Decode for u8 {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		match buf.has_remaining() {
			true => Ok(buf.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u16 {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		match buf.remaining() >= 2 {
			true => Ok(buf.get_u16()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u64 {
	/// Decode a varint.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(VarInt::decode(buf)?.into_inner())
	}
}

impl Decode for usize {
	/// Decode a varint, bounded to the platform's pointer width.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let v = u64::decode(buf)?;
		v.try_into().map_err(|_| DecodeError::BoundsExceeded(BoundsExceeded))
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let v = Vec::<u8>::decode(buf)?;
		let str = String::from_utf8(v)?;

		Ok(str)
	}
}

impl Decode for Vec<u8> {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let size = usize::decode(buf)?;

		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		let bytes = buf.copy_to_bytes(size);
		Ok(bytes.to_vec())
	}
}

impl Decode for bytes::Bytes {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let size = usize::decode(buf)?;

		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		Ok(buf.copy_to_bytes(size))
	}
}
