use crate::coding::{Decode, DecodeError, Encode};

/// Identifies one group within a subscription.
///
/// Sent on the control layer when a group stream is opened; the stream
/// itself carries only frames. Immutable after construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupMessage {
	/// The subscription this group belongs to.
	pub subscribe_id: u64,

	/// Monotonic within a track; gaps are allowed.
	pub sequence: u64,
}

impl Decode for GroupMessage {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let subscribe_id = u64::decode(buf)?;
		let sequence = u64::decode(buf)?;

		Ok(Self { subscribe_id, sequence })
	}
}

impl Encode for GroupMessage {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.subscribe_id.encode(w);
		self.sequence.encode(w);
	}
}
