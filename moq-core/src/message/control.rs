use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode};

/// Tags for control messages exchanged on the session stream after setup.
///
/// The full announce/subscribe vocabulary lives in the control layer; only
/// the lifecycle messages are decoded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u64)]
pub enum ControlMessageType {
	GoAway = 0x10,
}

impl Decode for ControlMessageType {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let v = u64::decode(buf)?;
		v.try_into().map_err(|_| DecodeError::InvalidMessage(v))
	}
}

impl Encode for ControlMessageType {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u64::from(*self).encode(w)
	}
}

/// Asks the peer to drain the session and reconnect elsewhere.
///
/// An empty URL means "reconnect to wherever you connected before".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoAway {
	pub url: String,
}

impl Decode for GoAway {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let url = String::decode(buf)?;
		Ok(Self { url })
	}
}

impl Encode for GoAway {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.url.encode(w)
	}
}
