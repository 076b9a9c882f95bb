//! Transport primitives for fetcher requests.
//!
//! The module exposes [`FetchTransport`] alongside [`TransportRequest`] and [`RawResponse`] so
//! downstream crates can plug in custom HTTP clients. A transport only has to issue one request
//! per [`FetchTransport::send`] call and hand back the status, headers, and raw body bytes; all
//! interpretation of the response happens in [`crate::normalize`]. Aborting an in-flight
//! request means dropping the returned future, so transports must release their connection
//! state on drop.

// std
use std::{borrow::Cow, env, time::Duration as StdDuration};
// crates.io
use http::{
	HeaderMap, HeaderValue,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
use serde_json::{Map, Value};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Timeout applied when neither the fetcher nor the request overrides it.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_millis(10_000);
/// Shortest accepted timeout; timeouts are whole milliseconds.
pub const MIN_TIMEOUT: StdDuration = StdDuration::from_millis(1);

const FORM_MIME: &str = "application/x-www-form-urlencoded";
const JSON_MIME: &str = "application/json";

/// Boxed future returned by [`FetchTransport::send`].
pub type TransportFuture<E> = Pin<Box<dyn Future<Output = Result<RawResponse, E>> + Send>>;

/// Abstraction over HTTP clients capable of issuing a single fetcher request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// fetch issued through a [`crate::fetcher::Fetcher`], and the futures they return must own
/// whatever state the request needs so the fetcher can move them into a background task when
/// a request is cancelled.
pub trait FetchTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Issues `request` and resolves with the raw response.
	///
	/// The transport enforces [`TransportRequest::timeout`] itself and must not retry.
	fn send(&self, request: TransportRequest) -> TransportFuture<Self::TransportError>;
}

/// Maps transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an error emitted by the transport for `url` into a client error.
	///
	/// `timeout` is the limit the request was sent with, so timeout failures can report it.
	fn map_transport_error(&self, url: &Url, timeout: StdDuration, error: E) -> Error;
}

/// HTTP methods supported by the fetcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// `GET`
	#[default]
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical upper-case method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<Method> for http::Method {
	fn from(value: Method) -> Self {
		match value {
			Method::Get => http::Method::GET,
			Method::Post => http::Method::POST,
			Method::Put => http::Method::PUT,
			Method::Delete => http::Method::DELETE,
		}
	}
}

/// Request body encodings understood by the fetcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
	/// `application/x-www-form-urlencoded`
	Form,
	/// `application/json`
	Json,
}
impl ContentType {
	/// Returns the short label used in diagnostics.
	pub const fn as_str(self) -> &'static str {
		match self {
			ContentType::Form => "form",
			ContentType::Json => "json",
		}
	}

	/// Returns the MIME type sent in the `content-type` header.
	pub const fn mime(self) -> &'static str {
		match self {
			ContentType::Form => FORM_MIME,
			ContentType::Json => JSON_MIME,
		}
	}
}

/// Request payload prior to encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
	/// Raw text sent verbatim unless a JSON encoding is requested for structured data.
	Text(String),
	/// Key/value mapping, form-encoded or serialized as a JSON object.
	Map(Map<String, Value>),
	/// Arbitrary JSON value.
	Json(Value),
	/// Raw bytes sent verbatim.
	Bytes(Vec<u8>),
}
impl RequestBody {
	/// Builds a [`RequestBody::Map`] from string pairs.
	pub fn form<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self::Map(pairs.into_iter().map(|(k, v)| (k.into(), Value::String(v.into()))).collect())
	}
}
impl From<String> for RequestBody {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl From<&str> for RequestBody {
	fn from(value: &str) -> Self {
		Self::Text(value.to_owned())
	}
}
impl From<Vec<u8>> for RequestBody {
	fn from(value: Vec<u8>) -> Self {
		Self::Bytes(value)
	}
}
impl From<Map<String, Value>> for RequestBody {
	fn from(value: Map<String, Value>) -> Self {
		Self::Map(value)
	}
}
impl From<Value> for RequestBody {
	fn from(value: Value) -> Self {
		Self::Json(value)
	}
}

/// Outbound proxy routing. An empty configuration means a direct connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
	/// Proxy used for `http://` targets.
	#[serde(default)]
	pub http: Option<Url>,
	/// Proxy used for `https://` targets.
	#[serde(default)]
	pub https: Option<Url>,
	/// Proxy used for every target; takes precedence over the scheme-specific entries.
	#[serde(default)]
	pub all: Option<Url>,
}
impl ProxyConfig {
	/// Routes every request through `url`.
	pub fn all(url: Url) -> Self {
		Self { all: Some(url), ..Default::default() }
	}

	/// Sets the proxy for `http://` targets.
	pub fn with_http(mut self, url: Url) -> Self {
		self.http = Some(url);

		self
	}

	/// Sets the proxy for `https://` targets.
	pub fn with_https(mut self, url: Url) -> Self {
		self.https = Some(url);

		self
	}

	/// Reads `HTTP_PROXY`/`HTTPS_PROXY` (either case) from the environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Ok(Self {
			http: env_proxy(["HTTP_PROXY", "http_proxy"])?,
			https: env_proxy(["HTTPS_PROXY", "https_proxy"])?,
			all: None,
		})
	}

	/// Returns true if no proxy is configured.
	pub fn is_empty(&self) -> bool {
		self.http.is_none() && self.https.is_none() && self.all.is_none()
	}
}

/// Fully encoded request handed to a [`FetchTransport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Outgoing headers (authorization, content type).
	pub headers: HeaderMap,
	/// Encoded body; empty means no body.
	pub body: Vec<u8>,
	/// Limit the transport must enforce.
	pub timeout: StdDuration,
	/// Per-request proxy override.
	pub proxy: Option<ProxyConfig>,
}
impl TransportRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, url: Url, timeout: StdDuration) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new(), timeout, proxy: None }
	}

	/// Adds `Authorization: Bearer <token>`.
	pub fn bearer(mut self, token: &str) -> Result<Self, ConfigError> {
		let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
			.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(self)
	}

	/// Encodes `body` according to `content_type` and sets the matching header.
	pub fn encode(
		mut self,
		content_type: Option<ContentType>,
		body: RequestBody,
	) -> Result<Self, ConfigError> {
		let (mime, bytes) = encode_body(content_type, body)?;

		if let Some(mime) = mime {
			self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime));
		}

		self.body = bytes;

		Ok(self)
	}

	/// Routes this request through `proxy`.
	pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
		self.proxy = proxy.filter(|p| !p.is_empty());

		self
	}
}

/// Raw transport response prior to normalization.
#[derive(Clone, Debug, Default)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers; lookups are case-insensitive.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Creates an empty response with the provided status.
	pub fn new(status: u16) -> Self {
		Self { status, ..Default::default() }
	}

	/// Appends a header; invalid names or values are ignored.
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) =
			(HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
		{
			self.headers.insert(name, value);
		}

		self
	}

	/// Sets the body and a matching `content-length` header.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		let len = self.body.len().to_string();

		self.with_header("content-length", &len)
	}

	/// Returns a header value as text, if present and visible ASCII.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Returns the body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Clients built through [`ReqwestTransport::direct`] ignore the system proxy settings; use
/// [`ReqwestTransport::with_proxy`] or a per-request [`ProxyConfig`] to route traffic.
///
/// A request carrying its own [`ProxyConfig`] is sent through a fresh client built with
/// default settings plus that proxy. It shares neither the connection pool nor any custom
/// configuration (TLS, headers) of the wrapped client; prefer a proxied transport when every
/// call uses the same proxy.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport that connects directly.
	pub fn direct() -> Result<Self, ConfigError> {
		Ok(Self(build_reqwest_client(None)?))
	}

	/// Builds a transport that routes every request through `proxy`.
	pub fn with_proxy(proxy: &ProxyConfig) -> Result<Self, ConfigError> {
		Ok(Self(build_reqwest_client(Some(proxy))?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestTransport(..)")
	}
}
#[cfg(feature = "reqwest")]
impl FetchTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn send(&self, request: TransportRequest) -> TransportFuture<Self::TransportError> {
		let shared = self.0.clone();

		Box::pin(async move {
			let client = match &request.proxy {
				Some(proxy) => build_reqwest_client(Some(proxy))?,
				None => shared,
			};
			let mut builder = client
				.request(request.method.into(), request.url)
				.headers(request.headers)
				.timeout(request.timeout);

			if !request.body.is_empty() {
				builder = builder.body(request.body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(RawResponse { status, headers, body })
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, url: &Url, timeout: StdDuration, err: ReqwestError) -> Error {
		if err.is_builder() {
			return ConfigError::from(err).into();
		}
		if err.is_timeout() {
			return Error::Timeout { timeout_ms: timeout_millis(timeout) };
		}

		TransportError::network(url, err).into()
	}
}

/// Converts a timeout into whole milliseconds, saturating on overflow.
pub fn timeout_millis(timeout: StdDuration) -> u64 {
	u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(feature = "reqwest")]
fn build_reqwest_client(proxy: Option<&ProxyConfig>) -> Result<ReqwestClient, ReqwestError> {
	let mut builder = ReqwestClient::builder();

	match proxy.filter(|p| !p.is_empty()) {
		Some(proxy) => {
			if let Some(url) = &proxy.all {
				builder = builder.proxy(reqwest::Proxy::all(url.as_str())?);
			}
			if let Some(url) = &proxy.http {
				builder = builder.proxy(reqwest::Proxy::http(url.as_str())?);
			}
			if let Some(url) = &proxy.https {
				builder = builder.proxy(reqwest::Proxy::https(url.as_str())?);
			}
		},
		None => builder = builder.no_proxy(),
	}

	builder.build()
}

fn env_proxy<const N: usize>(names: [&str; N]) -> Result<Option<Url>, ConfigError> {
	let Some(raw) = names.iter().find_map(|name| env::var(name).ok().filter(|v| !v.is_empty()))
	else {
		return Ok(None);
	};

	Url::parse(&raw).map(Some).map_err(|_| ConfigError::InvalidProxy { url: raw })
}

fn encode_body(
	content_type: Option<ContentType>,
	body: RequestBody,
) -> Result<(Option<&'static str>, Vec<u8>), ConfigError> {
	let encoded = match (content_type, body) {
		(Some(ContentType::Form), RequestBody::Map(map)) => (Some(FORM_MIME), encode_form(&map)),
		(Some(ContentType::Form), RequestBody::Json(Value::Object(map))) =>
			(Some(FORM_MIME), encode_form(&map)),
		(Some(ContentType::Form), RequestBody::Json(_)) =>
			return Err(ConfigError::UnencodableBody { content_type: ContentType::Form.as_str() }),
		(Some(ContentType::Form), RequestBody::Text(text)) => (Some(FORM_MIME), text.into_bytes()),
		(Some(ContentType::Form), RequestBody::Bytes(bytes)) => (Some(FORM_MIME), bytes),
		(Some(ContentType::Json), RequestBody::Text(text)) => (Some(JSON_MIME), text.into_bytes()),
		(Some(ContentType::Json), RequestBody::Bytes(bytes)) => (Some(JSON_MIME), bytes),
		(Some(ContentType::Json) | None, RequestBody::Map(map)) =>
			(Some(JSON_MIME), serde_json::to_vec(&map).map_err(ConfigError::BodySerialize)?),
		(Some(ContentType::Json) | None, RequestBody::Json(value)) =>
			(Some(JSON_MIME), serde_json::to_vec(&value).map_err(ConfigError::BodySerialize)?),
		(None, RequestBody::Text(text)) => (None, text.into_bytes()),
		(None, RequestBody::Bytes(bytes)) => (None, bytes),
	};

	Ok(encoded)
}

fn encode_form(map: &Map<String, Value>) -> Vec<u8> {
	let mut serializer = form_urlencoded::Serializer::new(String::new());

	for (key, value) in map {
		serializer.append_pair(key, &form_value(value));
	}

	serializer.finish().into_bytes()
}

fn form_value(value: &Value) -> Cow<'_, str> {
	match value {
		Value::String(s) => Cow::Borrowed(s),
		Value::Null => Cow::Borrowed(""),
		other => Cow::Owned(other.to_string()),
	}
}
