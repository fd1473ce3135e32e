use std::sync::Arc;

use num_enum::{FromPrimitive, IntoPrimitive};

use crate::coding::DecodeError;
use crate::message::Versions;
use crate::transport::StreamError;

/// An application error code carried by a group stream reset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum GroupErrorCode {
	InternalError = 0x0,
	/// The subscriber no longer wants this group; the writer aborts.
	SubscribeCanceled = 0x2,
	/// The publisher stopped producing this group; the reader aborts.
	PublishAborted = 0x3,
	/// The owning session went away.
	ClosedSession = 0x4,
	/// The group outlived its delivery window.
	Expired = 0x5,
	#[num_enum(catch_all)]
	Unknown(u32),
}

/// An application error code carried by a session (connection) close.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum SessionErrorCode {
	NoError = 0x0,
	InternalError = 0x1,
	Unauthorized = 0x2,
	ProtocolViolation = 0x3,
	/// The peer did not drain within the GOAWAY deadline.
	GoAwayTimeout = 0x10,
	#[num_enum(catch_all)]
	Unknown(u32),
}

/// Any fatal error produced by the session or group layer.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	/// The underlying transport failed; inspect [StreamError::reset_code] for peer resets.
	#[error("transport error: {0}")]
	Transport(Arc<dyn StreamError>),

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	/// The first varint of a bidirectional stream was not a known stream type.
	#[error("unsupported stream type")]
	UnsupportedStream,

	/// The client offered no version we implement.
	#[error("unsupported versions: {0:?}")]
	Version(Versions),

	/// The peer terminated the session stream with an application error during setup.
	#[error("session error: {0:?}")]
	Session(SessionErrorCode),

	/// A group stream was cancelled with the given code.
	#[error("group error: {0:?}")]
	Group(GroupErrorCode),

	/// The frame payload cannot be length-prefixed with a varint.
	#[error("frame too large")]
	FrameTooLarge,

	/// The destination buffer is smaller than the frame payload.
	#[error("destination buffer too small")]
	BufferTooSmall,

	/// Generic local cancellation, used when no more specific cause exists.
	#[error("cancelled")]
	Cancel,
}

impl Error {
	/// The application error code used when closing a stream or session because of this error.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Group(code) => (*code).into(),
			Self::Session(code) => (*code).into(),
			Self::Decode(_) => SessionErrorCode::ProtocolViolation.into(),
			Self::UnsupportedStream => SessionErrorCode::ProtocolViolation.into(),
			Self::Version(_) => SessionErrorCode::ProtocolViolation.into(),
			Self::Transport(_) => SessionErrorCode::InternalError.into(),
			Self::FrameTooLarge | Self::BufferTooSmall => SessionErrorCode::InternalError.into(),
			Self::Cancel => GroupErrorCode::InternalError.into(),
		}
	}
}
