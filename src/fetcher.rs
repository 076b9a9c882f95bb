//! The fetcher: one entry point for every HTTP call the client makes.
//!
//! [`Fetcher::fetch`] validates the target synchronously, encodes the request, and returns a
//! [`CancellableFetch`] that drives the transport call, normalizes the response, and can be
//! cancelled at any point before it settles.

// std
use std::time::{Duration as StdDuration, Instant};
// self
use crate::{
	_prelude::*,
	cancel::CancellableFetch,
	error::ConfigError,
	http::{
		ContentType, DEFAULT_TIMEOUT, FetchTransport, MIN_TIMEOUT, Method, ProxyConfig,
		RequestBody, TransportErrorMapper, TransportRequest, timeout_millis,
	},
	normalize,
	obs::{self, FetchOutcome, FetchSpan},
	secret::Secret,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestTransport, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Fetcher specialized for the crate's default reqwest transport stack.
pub type ReqwestFetcher = Fetcher<ReqwestTransport, ReqwestTransportErrorMapper>;

/// Per-call options recognized by [`Fetcher::fetch`].
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
	/// HTTP method; defaults to `GET`.
	pub method: Method,
	/// Transport timeout; defaults to the fetcher's default timeout.
	pub timeout: Option<StdDuration>,
	/// Bearer token sent in the `Authorization` header.
	pub access_token: Option<Secret>,
	/// Body encoding.
	pub content_type: Option<ContentType>,
	/// Request payload.
	pub body: Option<RequestBody>,
	/// Proxy override for this call.
	pub proxy: Option<ProxyConfig>,
}
impl FetchOptions {
	/// Creates `GET` options with every other field unset.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the HTTP method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;

		self
	}

	/// Overrides the timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Sets the bearer token.
	pub fn access_token(mut self, token: impl Into<Secret>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Sets the body encoding.
	pub fn content_type(mut self, content_type: ContentType) -> Self {
		self.content_type = Some(content_type);

		self
	}

	/// Sets the payload.
	pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Sets a form-encoded payload.
	pub fn form(self, body: impl Into<RequestBody>) -> Self {
		self.content_type(ContentType::Form).body(body)
	}

	/// Sets a JSON payload.
	pub fn json(self, body: impl Into<RequestBody>) -> Self {
		self.content_type(ContentType::Json).body(body)
	}

	/// Routes this call through `proxy`.
	pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
		self.proxy = Some(proxy);

		self
	}
}

/// Issues requests through a [`FetchTransport`] and normalizes the responses.
///
/// Cloning is cheap: the transport and mapper are shared behind `Arc`s, and no state is shared
/// between individual fetches.
pub struct Fetcher<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	/// Transport used for every outbound request.
	pub transport: Arc<T>,
	/// Mapper applied to transport failures before surfacing them to callers.
	pub error_mapper: Arc<M>,
	default_timeout: StdDuration,
}
impl<T, M> Fetcher<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	/// Creates a fetcher over the caller-provided transport + mapper pair.
	pub fn with_transport(transport: impl Into<Arc<T>>, mapper: impl Into<Arc<M>>) -> Self {
		Self {
			transport: transport.into(),
			error_mapper: mapper.into(),
			default_timeout: DEFAULT_TIMEOUT,
		}
	}

	/// Replaces the timeout applied when a call does not set one.
	///
	/// Timeouts under one millisecond are rejected.
	pub fn with_default_timeout(mut self, timeout: StdDuration) -> Result<Self> {
		if timeout < MIN_TIMEOUT {
			return Err(ConfigError::ZeroTimeout.into());
		}

		self.default_timeout = timeout;

		Ok(self)
	}

	/// Timeout applied when a call does not set one.
	pub fn default_timeout(&self) -> StdDuration {
		self.default_timeout
	}

	/// Starts a fetch of `url`.
	///
	/// Fails immediately for an empty or unparsable URL, a zero timeout, or a body that cannot
	/// be encoded. Otherwise the returned future resolves with the decoded body or rejects
	/// with the mapped error, and can be cancelled until it settles.
	pub fn fetch(&self, url: &str, options: FetchOptions) -> Result<CancellableFetch> {
		let request = self.prepare(url, options)?;
		let transport = Arc::clone(&self.transport);
		let mapper = Arc::clone(&self.error_mapper);
		let span = FetchSpan::new(request.method, &request.url);
		let target = request.url.clone();
		let timeout = request.timeout;
		let mut inflight = InflightGuard::start(span.clone(), request.method, timeout);
		let future = async move {
			match transport.send(request).await {
				Ok(response) => normalize::normalize(&response),
				Err(err) => Err(mapper.map_transport_error(&target, timeout, err)),
			}
		};

		Ok(CancellableFetch::new(span.instrument(future))
			.on_settled(move |result| inflight.settle(result)))
	}

	fn prepare(&self, url: &str, options: FetchOptions) -> Result<TransportRequest> {
		if url.is_empty() {
			return Err(ConfigError::EmptyUrl.into());
		}

		let target = Url::parse(url)
			.map_err(|source| ConfigError::InvalidUrl { url: url.to_owned(), source })?;
		let timeout = options.timeout.unwrap_or(self.default_timeout);

		if timeout < MIN_TIMEOUT {
			return Err(ConfigError::ZeroTimeout.into());
		}

		let mut request =
			TransportRequest::new(options.method, target, timeout).with_proxy(options.proxy);

		if let Some(token) = &options.access_token {
			request = request.bearer(token.expose())?;
		}
		if let Some(body) = options.body {
			request = request.encode(options.content_type, body)?;
		}

		Ok(request)
	}
}
#[cfg(feature = "reqwest")]
impl Fetcher<ReqwestTransport, ReqwestTransportErrorMapper> {
	/// Creates a reqwest-backed fetcher that connects directly.
	pub fn new() -> Result<Self> {
		Ok(Self::with_transport(ReqwestTransport::direct()?, ReqwestTransportErrorMapper))
	}

	/// Creates a reqwest-backed fetcher that routes every request through `proxy`.
	pub fn with_proxy(proxy: &ProxyConfig) -> Result<Self> {
		Ok(Self::with_transport(ReqwestTransport::with_proxy(proxy)?, ReqwestTransportErrorMapper))
	}
}
impl<T, M> Clone for Fetcher<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			transport: Arc::clone(&self.transport),
			error_mapper: Arc::clone(&self.error_mapper),
			default_timeout: self.default_timeout,
		}
	}
}
impl<T, M> Debug for Fetcher<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Fetcher").field("default_timeout", &self.default_timeout).finish()
	}
}

// Records the outcome once; a guard dropped unsettled means the request was aborted.
struct InflightGuard {
	span: FetchSpan,
	method: Method,
	started: Instant,
	settled: bool,
}
impl InflightGuard {
	fn start(span: FetchSpan, method: Method, timeout: StdDuration) -> Self {
		obs::record_fetch_outcome(method, FetchOutcome::Attempt);
		span.dispatched(timeout_millis(timeout));

		Self { span, method, started: Instant::now(), settled: false }
	}

	fn settle<B>(&mut self, result: &Result<B>) {
		self.finish(FetchOutcome::of(result));
	}

	fn finish(&mut self, outcome: FetchOutcome) {
		if self.settled {
			return;
		}

		self.settled = true;

		obs::record_fetch_outcome(self.method, outcome);
		self.span.settled(outcome, self.started.elapsed());
	}
}
impl Drop for InflightGuard {
	fn drop(&mut self) {
		self.finish(FetchOutcome::Cancelled);
	}
}
