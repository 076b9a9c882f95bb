//! Async client for the VCP web service family: password-grant auth, scope discovery, roster and
//! log upload calls, all driven by one cancellable fetcher with a closed error taxonomy.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cancel;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod normalize;
pub mod obs;
pub mod scope;
pub mod secret;
pub mod validate;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::{ClientParams, ReqwestVcpClient, VcpClient},
		fetcher::{Fetcher, ReqwestFetcher},
		http::{ReqwestTransport, ReqwestTransportErrorMapper},
		scope,
	};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests and never consults the system proxy.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.no_proxy()
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`Fetcher`] over the test transport.
	pub fn build_reqwest_test_fetcher() -> ReqwestFetcher {
		Fetcher::with_transport(test_reqwest_transport(), ReqwestTransportErrorMapper)
	}

	/// Password-grant parameters requesting the auth, discovery, roster, and log upload scopes.
	pub fn test_client_params() -> ClientParams {
		ClientParams::new("client-id", "client-secret", "cid-user", "password").with_scope([
			scope::AUTH_API,
			scope::DISCOVERY_API,
			scope::ROSTER_SERVICE_HTTP_API,
			scope::LOG_UPLOAD_API,
		])
	}

	/// Constructs a [`VcpClient`] that talks to `endpoint` through the test transport.
	pub fn build_reqwest_test_client(endpoint: &str) -> ReqwestVcpClient {
		VcpClient::with_fetcher(endpoint, test_client_params(), build_reqwest_test_fetcher())
			.expect("Test client parameters should be valid.")
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
