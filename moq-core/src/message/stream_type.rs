use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode};

/// The first varint on every bidirectional stream, identifying its purpose.
///
/// The session stream tag is distinct from all control and data tags; a
/// connection whose first stream carries anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u64)]
pub enum StreamType {
	Session = 0x0,
	Announce = 0x1,
	Subscribe = 0x2,
	Group = 0x3,
}

impl Decode for StreamType {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let v = u64::decode(buf)?;
		v.try_into().map_err(|_| DecodeError::InvalidMessage(v))
	}
}

impl Encode for StreamType {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u64::from(*self).encode(w)
	}
}
