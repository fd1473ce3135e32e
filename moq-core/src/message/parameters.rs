use std::collections::{HashMap, hash_map};

use num_enum::{FromPrimitive, IntoPrimitive};

use crate::coding::{Decode, DecodeError, Encode, VarInt};

/// Refuse to decode an absurd number of parameters.
const MAX_PARAMS: u64 = 64;

/// Parameter tags recognized by the setup exchange.
///
/// Unknown tags are carried through verbatim so extensions survive a relay.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[repr(u64)]
pub enum ParameterType {
	/// The request path, UTF-8. Authoritative for native QUIC; WebTransport
	/// uses the HTTP request path instead.
	Path = 1,
	AuthorizationToken = 3,
	#[num_enum(catch_all)]
	Unknown(u64),
}

/// A tagged extension map: `(tag, length, bytes)` triples on the wire.
///
/// This is the typed view handed to the setup handler as client extensions.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
	params: HashMap<ParameterType, Vec<u8>>,
}

impl Decode for Parameters {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let count = u64::decode(buf)?;
		if count > MAX_PARAMS {
			return Err(DecodeError::TooMany);
		}

		let mut params = HashMap::new();
		for _ in 0..count {
			let kind = ParameterType::from(u64::decode(buf)?);
			match params.entry(kind) {
				hash_map::Entry::Occupied(_) => return Err(DecodeError::Duplicate),
				hash_map::Entry::Vacant(entry) => entry.insert(Vec::<u8>::decode(buf)?),
			};
		}

		Ok(Self { params })
	}
}

impl Encode for Parameters {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.params.len().encode(w);

		for (kind, value) in self.params.iter() {
			u64::from(*kind).encode(w);
			value.encode(w);
		}
	}
}

impl Parameters {
	pub fn get(&self, kind: ParameterType) -> Option<&[u8]> {
		self.params.get(&kind).map(|v| v.as_slice())
	}

	pub fn set(&mut self, kind: ParameterType, value: Vec<u8>) {
		self.params.insert(kind, value);
	}

	/// The parameter as a UTF-8 string; None when absent or not valid UTF-8.
	pub fn get_string(&self, kind: ParameterType) -> Option<String> {
		let value = self.params.get(&kind)?;
		String::from_utf8(value.clone()).ok()
	}

	pub fn set_string(&mut self, kind: ParameterType, value: &str) {
		self.set(kind, value.as_bytes().to_vec());
	}

	/// The parameter as a varint; None when absent or malformed.
	pub fn get_varint(&self, kind: ParameterType) -> Option<u64> {
		let mut value = self.params.get(&kind)?.as_slice();
		let v = VarInt::decode(&mut value).ok()?;
		value.is_empty().then_some(v.into_inner())
	}

	pub fn set_varint(&mut self, kind: ParameterType, value: u64) {
		let mut buf = Vec::new();
		value.encode(&mut buf);
		self.params.insert(kind, buf);
	}

	pub fn is_empty(&self) -> bool {
		self.params.is_empty()
	}

	pub fn len(&self) -> usize {
		self.params.len()
	}
}

#[cfg(test)]
mod tests {
	use bytes::BytesMut;

	use super::*;

	#[test]
	fn test_roundtrip() {
		let mut params = Parameters::default();
		params.set_string(ParameterType::Path, "room/7");
		params.set_varint(ParameterType::Unknown(42), 12345);

		let mut buf = BytesMut::new();
		params.encode(&mut buf);

		let decoded = Parameters::decode(&mut buf.freeze()).unwrap();
		assert_eq!(decoded, params);
		assert_eq!(decoded.get_string(ParameterType::Path).as_deref(), Some("room/7"));
		assert_eq!(decoded.get_varint(ParameterType::Unknown(42)), Some(12345));
	}

	#[test]
	fn test_missing_is_none() {
		let params = Parameters::default();
		assert_eq!(params.get_string(ParameterType::Path), None);
		assert_eq!(params.get(ParameterType::AuthorizationToken), None);
	}

	#[test]
	fn test_duplicate_rejected() {
		let mut buf = BytesMut::new();
		2u64.encode(&mut buf);
		for _ in 0..2 {
			1u64.encode(&mut buf);
			vec![0u8].encode(&mut buf);
		}

		assert!(matches!(
			Parameters::decode(&mut buf.freeze()),
			Err(DecodeError::Duplicate)
		));
	}

	#[test]
	fn test_too_many_rejected() {
		let mut buf = BytesMut::new();
		(MAX_PARAMS + 1).encode(&mut buf);

		assert!(matches!(Parameters::decode(&mut buf.freeze()), Err(DecodeError::TooMany)));
	}

	#[test]
	fn test_invalid_utf8_path() {
		let mut params = Parameters::default();
		params.set(ParameterType::Path, vec![0xff, 0xfe]);
		assert_eq!(params.get_string(ParameterType::Path), None);
	}
}
