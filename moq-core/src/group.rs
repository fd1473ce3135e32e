use std::sync::Arc;

use bytes::Bytes;

use crate::coding::{Encode, MAX_VARINT, Reader, Writer};
use crate::message::GroupMessage;
use crate::transport::{RecvStream, SendStream, Session};
use crate::{Context, Error, FrameSink, FrameSource, GroupErrorCode, NoopStats, Stats};

// When the track terminates, every live group follows with a role-specific
// code. The watcher exits as soon as either scope is done, so a group that
// closed first does not pin the task until the whole track ends.
fn propagate(track: &Context, group: &Context, cause: Error) {
	let track = track.clone();
	let group = group.clone();

	tokio::spawn(async move {
		tokio::select! {
			_ = track.done() => {
				group.cancel(cause);
			}
			_ = group.done() => {}
		}
	});
}

/// Writes length-delimited frames for one group onto a unidirectional stream.
///
/// The group's cancellation scope is a child of the track's: cancelling the
/// track cancels every live group with [GroupErrorCode::SubscribeCanceled].
pub struct GroupWriter<S: SendStream> {
	sequence: u64,
	stream: Writer<S>,
	ctx: Context,
	stats: Arc<dyn Stats>,
}

impl<S: SendStream> GroupWriter<S> {
	pub fn new(track: &Context, stream: S, group: &GroupMessage) -> Self {
		Self::with_stats(track, stream, group, Arc::new(NoopStats))
	}

	pub fn with_stats(track: &Context, stream: S, group: &GroupMessage, stats: Arc<dyn Stats>) -> Self {
		let ctx = Context::new();
		propagate(track, &ctx, Error::Group(GroupErrorCode::SubscribeCanceled));

		Self {
			sequence: group.sequence,
			stream: Writer::new(stream),
			ctx,
			stats,
		}
	}

	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	pub fn context(&self) -> &Context {
		&self.ctx
	}

	/// Write one frame: a varint length followed by the payload bytes.
	///
	/// The length and payload are coalesced into a single transport write;
	/// the wire bytes are identical either way.
	pub async fn write_frame<F: FrameSource + ?Sized>(&mut self, frame: &F) -> Result<(), Error> {
		if let Some(err) = self.ctx.err() {
			return Err(err);
		}
		if self.ctx.is_done() {
			return Err(Error::Cancel);
		}

		let size = frame.byte_len();
		if size as u64 > MAX_VARINT {
			return Err(Error::FrameTooLarge);
		}

		let buffer = self.stream.scratch();
		size.encode(buffer);
		let prefix = buffer.len();
		buffer.resize(prefix + size, 0);
		frame.copy_to(&mut buffer[prefix..])?;

		// The first transport error becomes the group's cause; later calls
		// return it without touching the stream again.
		if let Err(err) = self.stream.flush().await {
			self.ctx.cancel(err.clone());
			return Err(err);
		}

		self.stats.add_tx_bytes(size as u64);
		Ok(())
	}

	/// Finish the group gracefully (FIN). No-op once terminal.
	pub fn close(&mut self) {
		if !self.ctx.finish() {
			return;
		}
		self.stream.finish();
	}

	/// Abort the group with an error code. No-op once terminal.
	pub fn cancel(&mut self, code: GroupErrorCode) {
		if !self.ctx.cancel(Error::Group(code)) {
			return;
		}
		self.stream.reset(code.into());
	}

	/// Wait until the peer acknowledged the FIN or stopped the stream.
	pub async fn closed(&mut self) {
		self.stream.closed().await
	}
}

impl<S: SendStream> Drop for GroupWriter<S> {
	fn drop(&mut self) {
		// A live group aborts rather than leaking an open stream. When the
		// track watcher already cancelled us, propagate that code instead of
		// the generic one the inner writer would use.
		if !self.ctx.is_done() {
			self.ctx.cancel(Error::Cancel);
		}
		if let Some(err) = self.ctx.err() {
			self.stream.reset(err.to_code());
		}
	}
}

/// Reads length-delimited frames for one group from a unidirectional stream.
///
/// Cancelling the track cancels every live reader with
/// [GroupErrorCode::PublishAborted].
pub struct GroupReader<S: RecvStream> {
	sequence: u64,
	stream: Reader<S>,
	ctx: Context,
	stats: Arc<dyn Stats>,
}

impl<S: RecvStream> GroupReader<S> {
	pub fn new(track: &Context, stream: S, group: &GroupMessage) -> Self {
		Self::with_stats(track, stream, group, Arc::new(NoopStats))
	}

	pub fn with_stats(track: &Context, stream: S, group: &GroupMessage, stats: Arc<dyn Stats>) -> Self {
		let ctx = Context::new();
		propagate(track, &ctx, Error::Group(GroupErrorCode::PublishAborted));

		Self {
			sequence: group.sequence,
			stream: Reader::new(stream),
			ctx,
			stats,
		}
	}

	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	pub fn context(&self) -> &Context {
		&self.ctx
	}

	/// Read the next frame, or None once the writer finished the group.
	///
	/// A frame is delivered complete or not at all: a stream that ends in
	/// the middle of a payload is an error, never a partial frame.
	pub async fn read_frame(&mut self) -> Result<Option<Bytes>, Error> {
		if let Some(err) = self.ctx.err() {
			return Err(err);
		}

		let size: usize = match self.stream.decode_maybe().await {
			Ok(Some(size)) => size,
			Ok(None) => return Ok(None),
			Err(err) => {
				self.ctx.cancel(err.clone());
				return Err(err);
			}
		};

		match self.stream.read_exact(size).await {
			Ok(payload) => {
				self.stats.add_rx_bytes(size as u64);
				Ok(Some(payload))
			}
			Err(err) => {
				self.ctx.cancel(err.clone());
				Err(err)
			}
		}
	}

	/// Read the next frame into the sink; false once the group is finished.
	pub async fn read_frame_into<K: FrameSink>(&mut self, sink: &mut K) -> Result<bool, Error> {
		match self.read_frame().await? {
			Some(payload) => {
				sink.write(&payload);
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// Abort the group with an error code. No-op once terminal.
	pub fn cancel(&mut self, code: GroupErrorCode) {
		if !self.ctx.cancel(Error::Group(code)) {
			return;
		}
		self.stream.stop(code.into());
	}
}

impl<S: RecvStream> Drop for GroupReader<S> {
	fn drop(&mut self) {
		// Unblock the track watcher; the transport stops the stream itself.
		self.ctx.cancel(Error::Cancel);
	}
}

/// Open a unidirectional stream for a new group.
///
/// The [GroupMessage] travels on the control layer; the returned writer
/// carries only frames.
pub async fn open_group<S: Session>(
	session: &S,
	track: &Context,
	group: &GroupMessage,
) -> Result<GroupWriter<S::SendStream>, Error> {
	let stream = session.open_uni().await.map_err(|e| Error::Transport(Arc::new(e)))?;
	Ok(GroupWriter::new(track, stream, group))
}

/// Accept the unidirectional stream for a group announced on the control layer.
pub async fn accept_group<S: Session>(
	session: &S,
	track: &Context,
	group: &GroupMessage,
) -> Result<GroupReader<S::RecvStream>, Error> {
	let stream = session.accept_uni().await.map_err(|e| Error::Transport(Arc::new(e)))?;
	Ok(GroupReader::new(track, stream, group))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FrameBuffer;
	use crate::coding::DecodeError;
	use crate::mock;
	use crate::transport::SendStream as _;

	fn group(sequence: u64) -> GroupMessage {
		GroupMessage {
			subscribe_id: 1,
			sequence,
		}
	}

	#[tokio::test]
	async fn test_frame_echo() {
		let track = Context::new();
		let (send, recv) = mock::pipe();
		let state = send.state();

		let mut writer = GroupWriter::new(&track, send, &group(0));
		let frames: Vec<Vec<u8>> = vec![vec![0x01], vec![0x02, 0x03], vec![], vec![0x04, 0x05, 0x06]];
		for frame in &frames {
			writer.write_frame(frame.as_slice()).await.unwrap();
		}
		writer.close();

		// One varint length prefix per frame, nothing else on the wire.
		assert_eq!(state.wire(), vec![0x01, 0x01, 0x02, 0x02, 0x03, 0x00, 0x03, 0x04, 0x05, 0x06]);

		let mut reader = GroupReader::new(&track, recv, &group(0));
		for frame in &frames {
			let payload = reader.read_frame().await.unwrap().unwrap();
			assert_eq!(payload.as_ref(), frame.as_slice());
		}
		assert!(reader.read_frame().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_frame_into_sink() {
		let track = Context::new();
		let (send, recv) = mock::pipe();

		let mut writer = GroupWriter::new(&track, send, &group(0));
		writer.write_frame([0xaa, 0xbb].as_slice()).await.unwrap();
		writer.write_frame([0xcc].as_slice()).await.unwrap();
		writer.close();

		let mut reader = GroupReader::new(&track, recv, &group(0));
		let mut sink = FrameBuffer::new();

		assert!(reader.read_frame_into(&mut sink).await.unwrap());
		assert_eq!(sink.as_slice(), &[0xaa, 0xbb]);

		// The sink is replaced, not appended to.
		assert!(reader.read_frame_into(&mut sink).await.unwrap());
		assert_eq!(sink.as_slice(), &[0xcc]);

		assert!(!reader.read_frame_into(&mut sink).await.unwrap());
	}

	#[tokio::test]
	async fn test_writer_cancel_idempotent() {
		let track = Context::new();
		let (send, _recv) = mock::pipe();
		let state = send.state();

		let mut writer = GroupWriter::new(&track, send, &group(1));
		writer.cancel(GroupErrorCode::Expired);
		writer.cancel(GroupErrorCode::SubscribeCanceled);
		writer.close();

		// The transport saw exactly one reset, with the first code.
		assert_eq!(state.resets(), 1);
		assert_eq!(state.reset_code(), Some(GroupErrorCode::Expired.into()));
		assert_eq!(state.finishes(), 0);

		assert!(matches!(
			writer.context().err(),
			Some(Error::Group(GroupErrorCode::Expired))
		));
		assert!(matches!(
			writer.write_frame([0x01].as_slice()).await,
			Err(Error::Group(GroupErrorCode::Expired))
		));
	}

	#[tokio::test]
	async fn test_reader_cancel_idempotent() {
		let track = Context::new();
		let (_send, recv) = mock::pipe();
		let state = recv.state();

		let mut reader = GroupReader::new(&track, recv, &group(1));
		reader.cancel(GroupErrorCode::PublishAborted);
		reader.cancel(GroupErrorCode::Expired);

		assert_eq!(state.stops(), 1);
		assert_eq!(state.stop_code(), Some(GroupErrorCode::PublishAborted.into()));
		assert!(matches!(
			reader.read_frame().await,
			Err(Error::Group(GroupErrorCode::PublishAborted))
		));
	}

	#[tokio::test]
	async fn test_close_then_cancel_is_noop() {
		let track = Context::new();
		let (send, _recv) = mock::pipe();
		let state = send.state();

		let mut writer = GroupWriter::new(&track, send, &group(2));
		writer.close();
		writer.cancel(GroupErrorCode::Expired);
		writer.close();

		assert_eq!(state.finishes(), 1);
		assert_eq!(state.resets(), 0);
		assert!(writer.context().is_done());
		assert!(writer.context().err().is_none());
	}

	#[tokio::test]
	async fn test_parent_cancel_propagates() {
		let track = Context::new();
		let (send, _w_recv) = mock::pipe();
		let (_r_send, recv) = mock::pipe();

		let mut writer = GroupWriter::new(&track, send, &group(3));
		let mut reader = GroupReader::new(&track, recv, &group(3));

		track.cancel(Error::Cancel);

		// The watchers run asynchronously; wait for both children.
		writer.context().done().await;
		reader.context().done().await;

		assert!(matches!(
			writer.context().err(),
			Some(Error::Group(GroupErrorCode::SubscribeCanceled))
		));
		assert!(matches!(
			reader.context().err(),
			Some(Error::Group(GroupErrorCode::PublishAborted))
		));

		assert!(matches!(
			writer.write_frame([0x00].as_slice()).await,
			Err(Error::Group(GroupErrorCode::SubscribeCanceled))
		));
		assert!(matches!(
			reader.read_frame().await,
			Err(Error::Group(GroupErrorCode::PublishAborted))
		));
	}

	#[tokio::test]
	async fn test_parent_cancel_after_close_is_noop() {
		let track = Context::new();
		let (send, _recv) = mock::pipe();
		let state = send.state();

		let mut writer = GroupWriter::new(&track, send, &group(4));
		writer.close();
		track.cancel(Error::Cancel);
		track.done().await;

		// The group terminated first; the watcher's side effect is a no-op.
		assert!(writer.context().err().is_none());
		assert_eq!(state.resets(), 0);
	}

	#[tokio::test]
	async fn test_reader_cancel_mid_stream() {
		let track = Context::new();
		let (send, recv) = mock::pipe();
		let state = send.state();

		let mut writer = GroupWriter::new(&track, send, &group(5));
		let mut reader = GroupReader::new(&track, recv, &group(5));

		writer.write_frame([0x01, 0x02, 0x03].as_slice()).await.unwrap();
		reader.cancel(GroupErrorCode::Unknown(5));

		assert_eq!(state.stops(), 1);
		assert_eq!(state.stop_code(), Some(5));

		// The writer observes the stop on its next write and records the cause.
		let err = writer.write_frame([0x04].as_slice()).await.unwrap_err();
		assert!(matches!(err, Error::Transport(_)));
		assert!(writer.context().err().is_some());

		assert!(matches!(
			reader.read_frame().await,
			Err(Error::Group(GroupErrorCode::Unknown(5)))
		));
	}

	#[tokio::test]
	async fn test_partial_frame_is_error() {
		let track = Context::new();
		let (mut send, recv) = mock::pipe();

		// A frame that promises 10 bytes but delivers 3 before FIN.
		send.write(&[0x0a, 0x01, 0x02, 0x03]).await.unwrap();
		send.finish();

		let mut reader = GroupReader::new(&track, recv, &group(6));
		assert!(matches!(
			reader.read_frame().await,
			Err(Error::Decode(DecodeError::Short))
		));
	}

	#[tokio::test]
	async fn test_oversized_frame_rejected() {
		struct Huge;

		impl FrameSource for Huge {
			fn byte_len(&self) -> usize {
				usize::MAX
			}

			fn copy_to(&self, _dst: &mut [u8]) -> Result<(), Error> {
				unreachable!("rejected before any copy")
			}
		}

		let track = Context::new();
		let (send, _recv) = mock::pipe();
		let state = send.state();

		let mut writer = GroupWriter::new(&track, send, &group(7));
		assert!(matches!(writer.write_frame(&Huge).await, Err(Error::FrameTooLarge)));
		assert!(state.wire().is_empty());
	}

	#[tokio::test]
	async fn test_group_over_session() {
		let session = mock::MockSession::new();
		let track = Context::new();

		let mut writer = open_group(&session, &track, &group(9)).await.unwrap();
		let peer = session.peer_uni().unwrap();
		let mut reader = GroupReader::new(&track, peer, &group(9));

		writer.write_frame([0x09].as_slice()).await.unwrap();
		writer.close();

		assert_eq!(reader.read_frame().await.unwrap().unwrap().as_ref(), &[0x09]);
		assert!(reader.read_frame().await.unwrap().is_none());

		let mut peer_send = session.connect_uni();
		let mut reader = accept_group(&session, &track, &group(10)).await.unwrap();
		peer_send.write(&[0x01, 0xaa]).await.unwrap();
		peer_send.finish();

		assert_eq!(reader.read_frame().await.unwrap().unwrap().as_ref(), &[0xaa]);
		assert!(reader.read_frame().await.unwrap().is_none());
		assert_eq!(reader.sequence(), 10);
	}
}
