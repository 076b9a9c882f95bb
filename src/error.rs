//! Client-level error types shared across the fetcher, discovery, and resource calls.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// The set is closed so callers can match on the variant instead of probing types.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem detected before any request was sent.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) with no HTTP response.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response decoding failed.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Parameters failed validation.
	#[error(transparent)]
	Validation(#[from] crate::validate::ValidationError),
	/// Server reported a single application error.
	#[error(transparent)]
	Application(#[from] FetchError),
	/// Server reported several application errors in one response.
	#[error(transparent)]
	Applications(#[from] FetchErrors),

	/// The transport gave up after the configured timeout.
	#[error("timeout of {timeout_ms}ms exceeded")]
	Timeout {
		/// Configured timeout in milliseconds.
		timeout_ms: u64,
	},
	/// The caller cancelled the fetch before it settled.
	#[error("upload canceled")]
	Cancelled,
	/// Error status without either of the documented error body shapes.
	#[error("Server returned status {status} without a recognized error body: {body}.")]
	ProtocolViolation {
		/// HTTP status code.
		status: u16,
		/// Preview of the response body.
		body: String,
	},
	/// Discovery response lacks entries for requested scopes.
	#[error("Discovery result does not include: {}.", .missing.join(", "))]
	Discovery {
		/// Requested scopes missing from the response, in request order.
		missing: Vec<String>,
	},
}
impl Error {
	/// Returns `true` if the error came from a caller-initiated cancellation.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	/// Returns `true` if the transport timed out.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

/// Configuration failures raised before a request is dispatched.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Fetch was called with an empty URL.
	#[error("Request URL is required.")]
	EmptyUrl,
	/// Request URL cannot be parsed as an absolute URL.
	#[error("Request URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL string.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Proxy URL cannot be parsed.
	#[error("Proxy URL `{url}` is invalid.")]
	InvalidProxy {
		/// Offending proxy URL string.
		url: String,
	},
	/// Header value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// Timeout shorter than one millisecond was requested.
	#[error("Timeout must be at least 1ms.")]
	ZeroTimeout,
	/// Request body cannot be encoded with the requested content type.
	#[error("Request body cannot be encoded as {content_type}.")]
	UnencodableBody {
		/// Requested content type label.
		content_type: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[source] serde_json::Error),
	/// Discovery or a resource call was attempted before `auth`.
	#[error("Client is not authenticated; call auth first.")]
	NotAuthenticated,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL of the failed request.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

/// Response body decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Body advertised as JSON is malformed.
	#[error("Response with status {status} declared JSON but the body is malformed.")]
	Json {
		/// HTTP status code of the response.
		status: u16,
		/// Parser failure.
		#[source]
		source: serde_json::Error,
	},
	/// JSON body does not match the expected shape.
	#[error("Response body does not match the expected shape at `{}`.", .source.path())]
	Shape {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Body is not JSON where JSON was expected.
	#[error("Response body is not JSON.")]
	NotJson,
}

/// Single application error reported by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("{message}")]
pub struct FetchError {
	/// Human-readable description supplied by the server.
	pub message: String,
	/// Machine-readable error code supplied by the server.
	pub code: String,
}
impl FetchError {
	/// Creates a new error from a message + code pair.
	pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
		Self { message: message.into(), code: code.into() }
	}
}

/// Ordered group of application errors reported in one response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("{message}")]
pub struct FetchErrors {
	/// Summary message for the group.
	pub message: String,
	/// Individual errors in the order the server listed them.
	pub errors: Vec<FetchError>,
}
impl FetchErrors {
	/// Creates a new aggregate.
	pub fn new(message: impl Into<String>, errors: Vec<FetchError>) -> Self {
		Self { message: message.into(), errors }
	}

	/// Number of contained errors.
	pub fn len(&self) -> usize {
		self.errors.len()
	}

	/// Returns true if the aggregate holds no errors.
	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	/// Iterator over contained errors.
	pub fn iter(&self) -> impl Iterator<Item = &FetchError> {
		self.errors.iter()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn fixed_messages_stay_stable() {
		assert_eq!(Error::Cancelled.to_string(), "upload canceled");
		assert_eq!(Error::Timeout { timeout_ms: 1 }.to_string(), "timeout of 1ms exceeded");
		assert!(Error::Cancelled.is_cancelled());
		assert!(Error::Timeout { timeout_ms: 5 }.is_timeout());
	}

	#[test]
	fn application_errors_display_server_message() {
		let single: Error = FetchError::new("bad id", "invalid_client").into();

		assert_eq!(single.to_string(), "bad id");

		let multiple = FetchErrors::new(
			"Server reported 2 error(s).",
			vec![FetchError::new("m1", "c1"), FetchError::new("m2", "c2")],
		);

		assert_eq!(multiple.len(), 2);
		assert_eq!(multiple.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(), ["c1", "c2"]);
	}

	#[test]
	fn discovery_error_lists_missing_scopes() {
		let err = Error::Discovery { missing: vec!["a".into(), "b".into()] };

		assert_eq!(err.to_string(), "Discovery result does not include: a, b.");
	}
}
