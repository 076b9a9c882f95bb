// self
use crate::{_prelude::*, http::Method, obs::FetchOutcome};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFetch<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFetch<F> = F;

/// A span wrapping one fetch from dispatch to settlement.
#[derive(Clone, Debug)]
pub struct FetchSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FetchSpan {
	/// Creates a new span tagged with the method and target host.
	pub fn new(method: Method, url: &Url) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!(
				"vcp_client.fetch",
				method = method.as_str(),
				host = url.host_str().unwrap_or_default()
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, url);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFetch<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Emits a debug event inside the span when the request leaves for the transport.
	pub fn dispatched(&self, timeout_ms: u64) {
		#[cfg(feature = "tracing")]
		{
			let _guard = self.span.enter();

			tracing::debug!(timeout_ms, "dispatching request");
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = timeout_ms;
		}
	}

	/// Emits a debug event inside the span once the fetch settled.
	pub fn settled(&self, outcome: FetchOutcome, elapsed: std::time::Duration) {
		#[cfg(feature = "tracing")]
		{
			let _guard = self.span.enter();

			tracing::debug!(
				outcome = outcome.as_str(),
				elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
				"request settled"
			);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (outcome, elapsed);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url() -> Url {
		Url::parse("https://api.example.com/roster").expect("Test URL should parse.")
	}

	#[test]
	fn fetch_span_noop_without_tracing() {
		let span = FetchSpan::new(Method::Get, &url());

		span.dispatched(10_000);
		span.settled(FetchOutcome::Success, std::time::Duration::from_millis(3));
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FetchSpan::new(Method::Delete, &url());
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
