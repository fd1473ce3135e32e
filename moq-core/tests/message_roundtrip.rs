//! Round-trips for every message that crosses the session stream.

use bytes::BytesMut;

use moq_core::coding::{Decode, DecodeError, Encode};
use moq_core::message::{
	ControlMessageType, GoAway, GroupMessage, ParameterType, Parameters, SessionClient, SessionServer, StreamType,
	VERSIONS, Version, Versions,
};

fn roundtrip<T: Decode + Encode + PartialEq + std::fmt::Debug>(msg: &T) {
	let mut buf = BytesMut::new();
	msg.encode(&mut buf);

	let mut buf = buf.freeze();
	let decoded = T::decode(&mut buf).expect("decode failed");
	assert_eq!(&decoded, msg);
	assert!(!bytes::Buf::has_remaining(&buf), "trailing bytes after decode");
}

#[test]
fn session_client_roundtrip() {
	let mut parameters = Parameters::default();
	parameters.set_string(ParameterType::Path, "meeting/alice");
	parameters.set(ParameterType::AuthorizationToken, b"secret".to_vec());

	roundtrip(&SessionClient {
		versions: VERSIONS.into(),
		parameters,
	});
}

#[test]
fn session_client_empty() {
	roundtrip(&SessionClient {
		versions: Versions::default(),
		parameters: Parameters::default(),
	});
}

#[test]
fn session_server_roundtrip() {
	roundtrip(&SessionServer {
		version: Version::DRAFT_02,
		parameters: Parameters::default(),
	});
}

#[test]
fn group_message_roundtrip() {
	roundtrip(&GroupMessage {
		subscribe_id: 77,
		sequence: 1 << 40,
	});
}

#[test]
fn goaway_roundtrip() {
	roundtrip(&GoAway {
		url: "https://relay.example/moq".to_string(),
	});
	roundtrip(&GoAway::default());
}

#[test]
fn stream_type_tags() {
	let mut buf = BytesMut::new();
	StreamType::Session.encode(&mut buf);
	assert_eq!(buf.as_ref(), &[0x00]);

	let mut buf = BytesMut::new();
	ControlMessageType::GoAway.encode(&mut buf);
	assert_eq!(buf.as_ref(), &[0x10]);
}

#[test]
fn unknown_stream_type_rejected() {
	let mut buf = BytesMut::new();
	0x3fu64.encode(&mut buf);

	assert!(matches!(
		StreamType::decode(&mut buf.freeze()),
		Err(DecodeError::InvalidMessage(0x3f))
	));
}

#[test]
fn session_client_wire_layout() {
	// versionCount, versions, paramCount, (tag, len, bytes)
	let mut parameters = Parameters::default();
	parameters.set_string(ParameterType::Path, "a");

	let client = SessionClient {
		versions: vec![Version(1)].into(),
		parameters,
	};

	let mut buf = BytesMut::new();
	client.encode(&mut buf);
	assert_eq!(buf.as_ref(), &[0x01, 0x01, 0x01, 0x01, 0x01, b'a']);
}
