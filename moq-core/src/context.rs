use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::Error;

/// A cancellation scope that remembers why it terminated.
///
/// The first terminal call wins: later `cancel`/`finish` calls are no-ops,
/// which is what makes group teardown idempotent across explicit close,
/// explicit cancel, parent cancellation and drop. Cloning shares the scope.
#[derive(Clone, Debug, Default)]
pub struct Context {
	token: CancellationToken,
	cause: Arc<OnceLock<Option<Error>>>,
}

impl Context {
	pub fn new() -> Self {
		Self::default()
	}

	/// Terminate with a cause. Returns whether this call performed the transition.
	pub fn cancel(&self, cause: Error) -> bool {
		let armed = self.cause.set(Some(cause)).is_ok();
		if armed {
			self.token.cancel();
		}
		armed
	}

	/// Terminate gracefully, with no cause. Returns whether this call performed the transition.
	pub fn finish(&self) -> bool {
		let armed = self.cause.set(None).is_ok();
		if armed {
			self.token.cancel();
		}
		armed
	}

	/// The cause of termination: `None` while live and after a graceful [Self::finish].
	pub fn err(&self) -> Option<Error> {
		self.cause.get().and_then(|cause| cause.clone())
	}

	/// Whether the scope reached a terminal state, gracefully or not.
	pub fn is_done(&self) -> bool {
		self.cause.get().is_some()
	}

	/// Wait until the scope terminates.
	pub async fn done(&self) {
		self.token.cancelled().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::GroupErrorCode;

	#[test]
	fn test_first_cause_wins() {
		let ctx = Context::new();
		assert!(!ctx.is_done());
		assert!(ctx.cancel(Error::Group(GroupErrorCode::SubscribeCanceled)));
		assert!(!ctx.cancel(Error::Cancel));
		assert!(!ctx.finish());
		assert!(matches!(ctx.err(), Some(Error::Group(GroupErrorCode::SubscribeCanceled))));
	}

	#[test]
	fn test_finish_has_no_cause() {
		let ctx = Context::new();
		assert!(ctx.finish());
		assert!(ctx.is_done());
		assert!(ctx.err().is_none());
		assert!(!ctx.cancel(Error::Cancel));
		assert!(ctx.err().is_none());
	}

	#[tokio::test]
	async fn test_done_wakes() {
		let ctx = Context::new();
		let waiter = ctx.clone();
		let task = tokio::spawn(async move { waiter.done().await });
		ctx.cancel(Error::Cancel);
		task.await.unwrap();
	}
}
