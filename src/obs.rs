//! Optional observability helpers for fetches.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `vcp_client.fetch` with the `method` and
//!   `host` fields, plus debug events when a request is dispatched and settled.
//! - Enable `metrics` to increment the `vcp_client_fetch_total` counter for every
//!   attempt/success/failure/cancellation, labeled by `method` + `outcome`.
//!
//! Neither layer ever records tokens, bodies, or full URLs.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
	/// A fetch was dispatched.
	Attempt,
	/// The fetch resolved with a body.
	Success,
	/// The fetch rejected with an error other than cancellation.
	Failure,
	/// The caller cancelled the fetch.
	Cancelled,
}
impl FetchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchOutcome::Attempt => "attempt",
			FetchOutcome::Success => "success",
			FetchOutcome::Failure => "failure",
			FetchOutcome::Cancelled => "cancelled",
		}
	}

	/// Classifies a settled fetch result.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => FetchOutcome::Success,
			Err(Error::Cancelled) => FetchOutcome::Cancelled,
			Err(_) => FetchOutcome::Failure,
		}
	}
}
impl Display for FetchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
