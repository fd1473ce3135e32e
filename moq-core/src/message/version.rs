use std::{fmt, ops::Deref};

use crate::coding::{Decode, DecodeError, Encode};

/// A protocol version offered or selected during setup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

impl Version {
	/// Draft versions of the moq-lite transport.
	pub const DRAFT_01: Self = Self(0xff0bad01);
	pub const DRAFT_02: Self = Self(0xff0bad02);
}

/// The versions this implementation speaks, in preference order.
pub const VERSIONS: [Version; 2] = [Version::DRAFT_02, Version::DRAFT_01];

impl From<u64> for Version {
	fn from(v: u64) -> Self {
		Self(v)
	}
}

impl From<Version> for u64 {
	fn from(v: Version) -> Self {
		v.0
	}
}

impl Decode for Version {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self(u64::decode(buf)?))
	}
}

impl Encode for Version {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w);
	}
}

impl fmt::Debug for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}

/// An ordered list of versions, most preferred first.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Versions(Vec<Version>);

impl Versions {
	/// Pick the first offered version that we also support.
	///
	/// The offering side's preference takes priority.
	pub fn select(&self, supported: &[Version]) -> Option<Version> {
		self.0.iter().find(|v| supported.contains(v)).copied()
	}
}

impl Decode for Versions {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let count = u64::decode(buf)?;
		let mut vs = Vec::with_capacity(count.min(64) as usize);

		for _ in 0..count {
			vs.push(Version::decode(buf)?);
		}

		Ok(Self(vs))
	}
}

impl Encode for Versions {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.len().encode(w);

		for v in &self.0 {
			v.encode(w);
		}
	}
}

impl Deref for Versions {
	type Target = Vec<Version>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<Vec<Version>> for Versions {
	fn from(vs: Vec<Version>) -> Self {
		Self(vs)
	}
}

impl<const N: usize> From<[Version; N]> for Versions {
	fn from(vs: [Version; N]) -> Self {
		Self(vs.to_vec())
	}
}

impl fmt::Debug for Versions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.0.iter()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_select_prefers_client_order() {
		let offered = Versions::from([Version(0x1), Version::DRAFT_01, Version::DRAFT_02]);
		assert_eq!(offered.select(&VERSIONS), Some(Version::DRAFT_01));
	}

	#[test]
	fn test_select_none_supported() {
		let offered = Versions::from([Version(0x1), Version(0x2)]);
		assert_eq!(offered.select(&VERSIONS), None);
	}
}
