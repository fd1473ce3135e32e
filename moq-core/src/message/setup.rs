use crate::coding::{Decode, DecodeError, Encode};

use super::{Parameters, Version, Versions};

/// The setup offer, sent by the client as the first message on the session stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionClient {
	/// Supported versions in preference order.
	pub versions: Versions,

	/// Client extensions, including the request path for native QUIC.
	pub parameters: Parameters,
}

impl Decode for SessionClient {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let versions = Versions::decode(buf)?;
		let parameters = Parameters::decode(buf)?;

		Ok(Self { versions, parameters })
	}
}

impl Encode for SessionClient {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.versions.encode(w);
		self.parameters.encode(w);
	}
}

/// The setup answer, selecting one of the offered versions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionServer {
	pub version: Version,
	pub parameters: Parameters,
}

impl Decode for SessionServer {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let version = Version::decode(buf)?;
		let parameters = Parameters::decode(buf)?;

		Ok(Self { version, parameters })
	}
}

impl Encode for SessionServer {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.version.encode(w);
		self.parameters.encode(w);
	}
}
