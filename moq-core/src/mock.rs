//! In-memory streams implementing the transport traits.
//!
//! Test-only: this module exists so the group, setup, and lifecycle layers
//! can be exercised without a network. Enabled for the workspace test
//! suites via the `mock` feature.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::transport::{RecvStream, SendStream, Session, StreamError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
	#[error("stream reset by peer: code={0}")]
	Reset(u32),

	#[error("stream stopped by peer: code={0}")]
	Stopped(u32),

	#[error("closed")]
	Closed,
}

impl StreamError for MockError {
	fn reset_code(&self) -> Option<u32> {
		match self {
			Self::Reset(code) | Self::Stopped(code) => Some(*code),
			Self::Closed => None,
		}
	}
}

#[derive(Default)]
struct Shared {
	buf: VecDeque<u8>,
	/// Every byte ever written, for wire assertions.
	wire: Vec<u8>,
	fin: bool,
	reset: Option<u32>,
	stopped: Option<u32>,
	resets: usize,
	stops: usize,
	finishes: usize,
}

/// Inspection handle for one mock stream, shared by both halves.
#[derive(Clone, Default)]
pub struct StreamState {
	shared: Arc<Mutex<Shared>>,
	notify: Arc<Notify>,
}

impl StreamState {
	pub fn wire(&self) -> Vec<u8> {
		self.shared.lock().unwrap().wire.clone()
	}

	pub fn resets(&self) -> usize {
		self.shared.lock().unwrap().resets
	}

	pub fn stops(&self) -> usize {
		self.shared.lock().unwrap().stops
	}

	pub fn finishes(&self) -> usize {
		self.shared.lock().unwrap().finishes
	}

	pub fn reset_code(&self) -> Option<u32> {
		self.shared.lock().unwrap().reset
	}

	pub fn stop_code(&self) -> Option<u32> {
		self.shared.lock().unwrap().stopped
	}

	pub fn is_fin(&self) -> bool {
		self.shared.lock().unwrap().fin
	}
}

/// An in-memory unidirectional stream.
pub fn pipe() -> (MockSend, MockRecv) {
	let state = StreamState::default();
	(MockSend { state: state.clone() }, MockRecv { state })
}

pub struct MockSend {
	state: StreamState,
}

impl MockSend {
	pub fn state(&self) -> StreamState {
		self.state.clone()
	}
}

impl SendStream for MockSend {
	type Error = MockError;

	async fn write(&mut self, buf: &[u8]) -> Result<usize, MockError> {
		let mut s = self.state.shared.lock().unwrap();
		if let Some(code) = s.stopped {
			return Err(MockError::Stopped(code));
		}
		if s.fin || s.reset.is_some() {
			return Err(MockError::Closed);
		}

		s.buf.extend(buf);
		s.wire.extend_from_slice(buf);
		drop(s);

		self.state.notify.notify_waiters();
		Ok(buf.len())
	}

	fn finish(&mut self) {
		let mut s = self.state.shared.lock().unwrap();
		if s.fin || s.reset.is_some() {
			return;
		}
		s.fin = true;
		s.finishes += 1;
		drop(s);

		self.state.notify.notify_waiters();
	}

	fn reset(&mut self, code: u32) {
		let mut s = self.state.shared.lock().unwrap();
		if s.fin || s.reset.is_some() {
			return;
		}
		s.reset = Some(code);
		s.resets += 1;
		drop(s);

		self.state.notify.notify_waiters();
	}

	async fn closed(&mut self) {
		loop {
			let notified = self.state.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			{
				let s = self.state.shared.lock().unwrap();
				if s.stopped.is_some() || s.reset.is_some() || (s.fin && s.buf.is_empty()) {
					return;
				}
			}

			notified.await;
		}
	}
}

pub struct MockRecv {
	state: StreamState,
}

impl MockRecv {
	pub fn state(&self) -> StreamState {
		self.state.clone()
	}
}

impl RecvStream for MockRecv {
	type Error = MockError;

	async fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, MockError> {
		loop {
			let notified = self.state.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			{
				let mut s = self.state.shared.lock().unwrap();
				if let Some(code) = s.reset {
					return Err(MockError::Reset(code));
				}
				if s.stopped.is_some() {
					return Err(MockError::Closed);
				}
				if !s.buf.is_empty() {
					let n = buf.len().min(s.buf.len());
					for (i, b) in s.buf.drain(..n).enumerate() {
						buf[i] = b;
					}
					drop(s);
					self.state.notify.notify_waiters();
					return Ok(Some(n));
				}
				if s.fin {
					return Ok(None);
				}
			}

			notified.await;
		}
	}

	fn stop(&mut self, code: u32) {
		let mut s = self.state.shared.lock().unwrap();
		if s.stopped.is_some() || s.reset.is_some() {
			return;
		}
		s.stopped = Some(code);
		s.stops += 1;
		drop(s);

		self.state.notify.notify_waiters();
	}
}

#[derive(Default)]
struct SessionShared {
	accept_bi: VecDeque<(MockSend, MockRecv)>,
	accept_uni: VecDeque<MockRecv>,
	opened_bi: VecDeque<(MockSend, MockRecv)>,
	opened_uni: VecDeque<MockRecv>,
	closed: Option<(u32, String)>,
}

/// An in-memory connection.
///
/// The test drives the peer side: [MockSession::connect_bi] queues a stream
/// for the next `accept_bi` and returns the peer's halves.
#[derive(Clone, Default)]
pub struct MockSession {
	shared: Arc<Mutex<SessionShared>>,
	notify: Arc<Notify>,
}

impl MockSession {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue a bidirectional stream; returns the peer's send and receive halves.
	pub fn connect_bi(&self) -> (MockSend, MockRecv) {
		let (peer_send, our_recv) = pipe();
		let (our_send, peer_recv) = pipe();

		self.shared.lock().unwrap().accept_bi.push_back((our_send, our_recv));
		self.notify.notify_waiters();

		(peer_send, peer_recv)
	}

	/// Queue a unidirectional stream; returns the peer's send half.
	pub fn connect_uni(&self) -> MockSend {
		let (peer_send, our_recv) = pipe();

		self.shared.lock().unwrap().accept_uni.push_back(our_recv);
		self.notify.notify_waiters();

		peer_send
	}

	/// The peer's receive half of a stream we opened with `open_uni`.
	pub fn peer_uni(&self) -> Option<MockRecv> {
		self.shared.lock().unwrap().opened_uni.pop_front()
	}

	/// The peer's halves of a stream we opened with `open_bi`.
	pub fn peer_bi(&self) -> Option<(MockSend, MockRecv)> {
		self.shared.lock().unwrap().opened_bi.pop_front()
	}

	/// The application code this session was closed with, if any.
	pub fn close_code(&self) -> Option<u32> {
		self.shared.lock().unwrap().closed.as_ref().map(|(code, _)| *code)
	}
}

impl Session for MockSession {
	type SendStream = MockSend;
	type RecvStream = MockRecv;
	type Error = MockError;

	async fn accept_bi(&self) -> Result<(MockSend, MockRecv), MockError> {
		loop {
			let notified = self.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			{
				let mut s = self.shared.lock().unwrap();
				if let Some(pair) = s.accept_bi.pop_front() {
					return Ok(pair);
				}
				if s.closed.is_some() {
					return Err(MockError::Closed);
				}
			}

			notified.await;
		}
	}

	async fn open_bi(&self) -> Result<(MockSend, MockRecv), MockError> {
		let (our_send, peer_recv) = pipe();
		let (peer_send, our_recv) = pipe();

		let mut s = self.shared.lock().unwrap();
		if s.closed.is_some() {
			return Err(MockError::Closed);
		}
		s.opened_bi.push_back((peer_send, peer_recv));

		Ok((our_send, our_recv))
	}

	async fn accept_uni(&self) -> Result<MockRecv, MockError> {
		loop {
			let notified = self.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			{
				let mut s = self.shared.lock().unwrap();
				if let Some(recv) = s.accept_uni.pop_front() {
					return Ok(recv);
				}
				if s.closed.is_some() {
					return Err(MockError::Closed);
				}
			}

			notified.await;
		}
	}

	async fn open_uni(&self) -> Result<MockSend, MockError> {
		let (our_send, peer_recv) = pipe();

		let mut s = self.shared.lock().unwrap();
		if s.closed.is_some() {
			return Err(MockError::Closed);
		}
		s.opened_uni.push_back(peer_recv);

		Ok(our_send)
	}

	fn close(&self, code: u32, reason: &str) {
		let mut s = self.shared.lock().unwrap();
		if s.closed.is_some() {
			return;
		}
		s.closed = Some((code, reason.to_string()));
		drop(s);

		self.notify.notify_waiters();
	}

	async fn closed(&self) {
		loop {
			let notified = self.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();

			if self.shared.lock().unwrap().closed.is_some() {
				return;
			}

			notified.await;
		}
	}
}
