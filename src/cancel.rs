//! Cooperative cancellation for in-flight fetches.
//!
//! Every [`CancellableFetch`] owns a [`CancelHandle`] whose [`FetchState`] is claimed exactly once,
//! either by the completing request or by [`CancelHandle::cancel`]. A cancelled fetch rejects
//! with [`Error::Cancelled`] and its in-flight request future is dropped from a separate task
//! after one scheduler yield, so the abort never runs inside the completion path of the
//! transport.

// std
use std::task::{Context, Poll};
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, normalize::FetchBody};

/// Boxed request future driven by a [`CancellableFetch`].
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<FetchBody>> + Send>>;

/// Settlement state of one fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchState {
	/// Not yet settled.
	Pending,
	/// Completed with a decoded body.
	Resolved,
	/// Completed with an error.
	Rejected,
	/// Claimed by a cancellation request.
	Cancelled,
}
impl FetchState {
	/// Returns true once the fetch can no longer change state.
	pub fn is_settled(self) -> bool {
		!matches!(self, Self::Pending)
	}
}

/// Cloneable handle that cancels one outstanding fetch.
#[derive(Clone, Debug)]
pub struct CancelHandle {
	state: Arc<Mutex<FetchState>>,
	token: CancellationToken,
}
impl CancelHandle {
	fn new() -> Self {
		Self { state: Arc::new(Mutex::new(FetchState::Pending)), token: CancellationToken::new() }
	}

	/// Requests cancellation.
	///
	/// Returns `true` if this call claimed the fetch; cancelling a settled fetch is a no-op that
	/// returns `false`.
	pub fn cancel(&self) -> bool {
		{
			let mut state = self.state.lock();

			if state.is_settled() {
				return false;
			}

			*state = FetchState::Cancelled;
		}

		self.token.cancel();

		true
	}

	/// Current settlement state.
	pub fn state(&self) -> FetchState {
		*self.state.lock()
	}

	/// Returns true if cancellation claimed the fetch.
	pub fn is_cancelled(&self) -> bool {
		self.state() == FetchState::Cancelled
	}

	fn settle(&self, result: Result<FetchBody>) -> Result<FetchBody> {
		let mut state = self.state.lock();

		match *state {
			FetchState::Cancelled => Err(Error::Cancelled),
			_ => {
				*state = if result.is_ok() { FetchState::Resolved } else { FetchState::Rejected };

				result
			},
		}
	}
}

/// Future returned by [`crate::fetcher::Fetcher::fetch`] that can be cancelled while pending.
///
/// Await it like any other future; call [`cancel`](Self::cancel) or hand a
/// [`CancelHandle`] to another task to abort it.
pub struct CancellableFetch {
	handle: CancelHandle,
	inner: FetchFuture,
}
impl CancellableFetch {
	/// Wraps `future` so it settles once and can be cancelled from outside.
	///
	/// The wrapped future is dropped (aborting any request it owns) when cancellation wins.
	pub fn new<F>(future: F) -> Self
	where
		F: 'static + Send + Future<Output = Result<FetchBody>>,
	{
		let handle = CancelHandle::new();
		let inner = Box::pin(drive(handle.clone(), Box::pin(future)));

		Self { handle, inner }
	}

	/// Requests cancellation; see [`CancelHandle::cancel`].
	pub fn cancel(&self) -> bool {
		self.handle.cancel()
	}

	/// Returns a handle that can cancel this fetch from another task.
	pub fn cancel_handle(&self) -> CancelHandle {
		self.handle.clone()
	}

	/// Current settlement state.
	pub fn state(&self) -> FetchState {
		self.handle.state()
	}

	/// Runs `observer` on the final result, after cancellation has been taken into account.
	///
	/// `observer` is dropped without being called if the fetch is dropped before it settles.
	pub fn on_settled<O>(self, observer: O) -> Self
	where
		O: 'static + Send + FnOnce(&Result<FetchBody>),
	{
		let Self { handle, inner } = self;
		let inner = Box::pin(async move {
			let result = inner.await;

			observer(&result);

			result
		});

		Self { handle, inner }
	}
}
impl Future for CancellableFetch {
	type Output = Result<FetchBody>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.inner.as_mut().poll(cx)
	}
}
impl Debug for CancellableFetch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CancellableFetch").field("state", &self.state()).finish()
	}
}

async fn drive(handle: CancelHandle, mut inflight: FetchFuture) -> Result<FetchBody> {
	tokio::select! {
		biased;
		_ = handle.token.cancelled() => {
			defer_abort(inflight);

			Err(Error::Cancelled)
		},
		result = &mut inflight => handle.settle(result),
	}
}

fn defer_abort(inflight: FetchFuture) {
	match tokio::runtime::Handle::try_current() {
		Ok(runtime) => {
			runtime.spawn(async move {
				tokio::task::yield_now().await;

				drop(inflight);
			});
		},
		Err(_) => drop(inflight),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicBool, Ordering},
		time::Duration as StdDuration,
	};
	// self
	use super::*;

	struct DropFlag(Arc<AtomicBool>);
	impl Drop for DropFlag {
		fn drop(&mut self) {
			self.0.store(true, Ordering::SeqCst);
		}
	}

	#[tokio::test]
	async fn cancel_rejects_pending_fetch() {
		let fetch = CancellableFetch::new(async {
			tokio::time::sleep(StdDuration::from_secs(30)).await;

			Ok(FetchBody::Text("late".into()))
		});
		let handle = fetch.cancel_handle();
		let canceller = tokio::spawn(async move {
			tokio::time::sleep(StdDuration::from_millis(10)).await;

			handle.cancel()
		});
		let err = fetch.await.expect_err("Cancelled fetch must reject.");

		assert_eq!(err.to_string(), "upload canceled");
		assert!(canceller.await.expect("Canceller task should not panic."));
	}

	#[tokio::test]
	async fn cancellation_wins_over_ready_result() {
		let fetch = CancellableFetch::new(async { Ok(FetchBody::Text("ready".into())) });

		assert!(fetch.cancel());
		assert!(!fetch.cancel(), "Second cancel must be a no-op.");
		assert_eq!(fetch.state(), FetchState::Cancelled);
		assert!(matches!(fetch.await, Err(Error::Cancelled)));
	}

	#[tokio::test]
	async fn settled_observer_sees_cancellation_over_ready_result() {
		let seen = Arc::new(Mutex::new(None));
		let slot = seen.clone();
		let fetch = CancellableFetch::new(async { Ok(FetchBody::Text("ready".into())) })
			.on_settled(move |result| {
				*slot.lock() = Some(result.as_ref().err().map(Error::is_cancelled));
			});

		assert!(fetch.cancel());
		assert!(matches!(fetch.await, Err(Error::Cancelled)));
		assert_eq!(*seen.lock(), Some(Some(true)), "Observer must see the cancellation.");

		let seen = Arc::new(Mutex::new(None));
		let slot = seen.clone();
		let fetch = CancellableFetch::new(async { Ok(FetchBody::Empty) })
			.on_settled(move |result| *slot.lock() = Some(result.is_ok()));

		assert!(fetch.await.is_ok());
		assert_eq!(*seen.lock(), Some(true));
	}

	#[tokio::test]
	async fn cancelling_a_settled_fetch_is_a_noop() {
		let fetch = CancellableFetch::new(async { Ok(FetchBody::Empty) });
		let handle = fetch.cancel_handle();

		assert_eq!(fetch.await.expect("Fetch should resolve."), FetchBody::Empty);
		assert!(!handle.cancel());
		assert_eq!(handle.state(), FetchState::Resolved);

		let fetch = CancellableFetch::new(async { Err(Error::Timeout { timeout_ms: 1 }) });
		let handle = fetch.cancel_handle();

		assert!(fetch.await.is_err());
		assert!(!handle.cancel());
		assert_eq!(handle.state(), FetchState::Rejected);
	}

	#[tokio::test]
	async fn abort_is_deferred_past_rejection() {
		let dropped = Arc::new(AtomicBool::new(false));
		let flag = DropFlag(dropped.clone());
		let fetch = CancellableFetch::new(async move {
			let _flag = flag;

			std::future::pending::<()>().await;

			Ok(FetchBody::Empty)
		});

		fetch.cancel();

		assert!(matches!(fetch.await, Err(Error::Cancelled)));
		assert!(!dropped.load(Ordering::SeqCst), "Abort must not run inline.");

		tokio::time::sleep(StdDuration::from_millis(10)).await;

		assert!(dropped.load(Ordering::SeqCst), "Abort must run on a later tick.");
	}

	#[test]
	fn abort_without_runtime_drops_inline() {
		let dropped = Arc::new(AtomicBool::new(false));
		let flag = DropFlag(dropped.clone());

		defer_abort(Box::pin(async move {
			let _flag = flag;

			Ok(FetchBody::Empty)
		}));

		assert!(dropped.load(Ordering::SeqCst));
	}
}
