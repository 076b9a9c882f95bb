//! Discovery/Auth client for the VCP web service family.
//!
//! [`VcpClient::auth`] obtains a token with the password grant, [`VcpClient::discovery`]
//! resolves scopes to concrete endpoints, and the resource methods chain discovery with one
//! call against the resolved endpoint.

mod model;

pub use model::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	cancel::CancellableFetch,
	error::ConfigError,
	fetcher::{FetchOptions, Fetcher},
	http::{FetchTransport, Method, RequestBody, TransportErrorMapper},
	normalize::FetchBody,
	scope,
	secret::Secret,
	validate,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestTransport, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestVcpClient = VcpClient<ReqwestTransport, ReqwestTransportErrorMapper>;

/// Placeholder in the log upload endpoint replaced by the uploaded file name.
pub const FILENAME_PLACEHOLDER: &str = "{filename_suffix}";

/// Client bound to one auth endpoint and one set of credentials.
///
/// The auth token obtained by [`auth`](Self::auth) is kept inside the client; every other call
/// requires it.
pub struct VcpClient<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	fetcher: Fetcher<T, M>,
	endpoint: String,
	params: ClientParams,
	auth_info: RwLock<Option<AuthInfo>>,
}
impl<T, M> VcpClient<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	/// Creates a client that issues every request through `fetcher`.
	pub fn with_fetcher(
		endpoint: impl Into<String>,
		params: ClientParams,
		fetcher: Fetcher<T, M>,
	) -> Result<Self> {
		let endpoint = endpoint.into();

		params.validate(&endpoint)?;

		Ok(Self {
			fetcher,
			endpoint: endpoint.trim_end_matches('/').to_owned(),
			params,
			auth_info: RwLock::new(None),
		})
	}

	/// Auth API base URL without a trailing slash.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Parameters the client was built with.
	pub fn params(&self) -> &ClientParams {
		&self.params
	}

	/// Fetcher shared by every call.
	pub fn fetcher(&self) -> &Fetcher<T, M> {
		&self.fetcher
	}

	/// Token response stored by the last successful [`auth`](Self::auth).
	pub fn auth_info(&self) -> Option<AuthInfo> {
		self.auth_info.read().clone()
	}

	/// Calls the auth API and stores the issued token.
	pub async fn auth(&self) -> Result<AuthInfo> {
		let url = format!("{}/auth/token", self.endpoint);
		let params = &self.params;
		let scope = scope::join(&params.scope);
		let body = RequestBody::form([
			("client_id", params.client_id.as_str()),
			("client_secret", params.client_secret.expose()),
			("username", params.username.as_str()),
			("password", params.password.expose()),
			("scope", scope.as_str()),
			("grant_type", params.grant_type.as_str()),
		]);
		let info = self
			.fetcher
			.fetch(&url, FetchOptions::new().method(Method::Post).form(body))?
			.await?
			.deserialize::<AuthInfo>()?;

		*self.auth_info.write() = Some(info.clone());

		Ok(info)
	}

	/// Resolves `scopes` through the discovery API.
	///
	/// Rejects with [`Error::Discovery`] naming every requested scope the response lacks.
	pub async fn discovery(&self, scopes: &[&str]) -> Result<DiscoveryResult> {
		let token = self.access_token()?;

		discover(&self.fetcher, &self.endpoint, &token, scopes).await
	}

	/// Account info, via the account info query scope.
	pub async fn account_info(&self) -> Result<DiscoveryResult> {
		self.discovery(&[scope::GD_ACCOUNT_INFO_QUERY]).await
	}

	/// User info, via the user info query scope.
	pub async fn user_info(&self) -> Result<DiscoveryResult> {
		self.discovery(&[scope::USERINFO_QUERY]).await
	}

	/// Service information, via the information scope.
	pub async fn information(&self) -> Result<DiscoveryResult> {
		self.discovery(&[scope::INFORMATION_URI]).await
	}

	/// Reads one roster entry, or the whole roster when `cid` is `None`.
	pub async fn get_roster(&self, cid: Option<&str>) -> Result<FetchBody> {
		self.roster(cid, FetchOptions::new()).await
	}

	/// Adds `cid` to the roster.
	pub async fn add_roster(&self, cid: &str, contact: &RosterContact) -> Result<FetchBody> {
		contact.validate()?;

		let body = contact.to_json(Some(cid))?;

		self.roster(None, FetchOptions::new().method(Method::Post).json(body)).await
	}

	/// Updates the roster entry of `cid`.
	pub async fn update_roster(&self, cid: &str, contact: &RosterContact) -> Result<FetchBody> {
		contact.validate()?;

		let body = contact.to_json(None)?;

		self.roster(Some(cid), FetchOptions::new().method(Method::Put).json(body)).await
	}

	/// Removes `cid` from the roster.
	pub async fn delete_roster(&self, cid: &str) -> Result<FetchBody> {
		self.roster(Some(cid), FetchOptions::new().method(Method::Delete)).await
	}

	/// Uploads `log` under `filename`.
	///
	/// Parameters are validated before anything is sent. The returned fetch runs discovery for
	/// the log upload scope and then posts the log; cancelling it at either stage rejects with
	/// [`Error::Cancelled`] and aborts the outstanding request. `timeout` defaults to the
	/// fetcher's default timeout and applies to the upload request.
	pub fn log_upload(
		&self,
		log: impl Into<Vec<u8>>,
		filename: &str,
		timeout: Option<StdDuration>,
	) -> Result<CancellableFetch> {
		let log = log.into();

		validate::log_upload(&log, filename, timeout)?;

		let token = self.access_token()?;
		let fetcher = self.fetcher.clone();
		let endpoint = self.endpoint.clone();
		let filename = filename.to_owned();
		let timeout = timeout.unwrap_or(fetcher.default_timeout());

		Ok(CancellableFetch::new(async move {
			let target =
				discover(&fetcher, &endpoint, &token, &[scope::LOG_UPLOAD_API]).await?.target()?;
			let url = target.endpoint.replace(FILENAME_PLACEHOLDER, &filename);
			let options = FetchOptions::new()
				.method(Method::Post)
				.access_token(target.access_token)
				.body(log)
				.timeout(timeout);

			fetcher.fetch(&url, options)?.await
		}))
	}

	async fn roster(&self, cid: Option<&str>, options: FetchOptions) -> Result<FetchBody> {
		let target = self.discovery(&[scope::ROSTER_SERVICE_HTTP_API]).await?.target()?;
		let mut url = format!("{}/{}", target.endpoint, self.params.username);

		if let Some(cid) = cid {
			url.push('/');
			url.push_str(cid);
		}

		self.fetcher.fetch(&url, options.access_token(target.access_token))?.await
	}

	fn access_token(&self) -> Result<Secret> {
		self.auth_info
			.read()
			.as_ref()
			.map(|info| info.access_token.clone())
			.ok_or_else(|| ConfigError::NotAuthenticated.into())
	}
}
#[cfg(feature = "reqwest")]
impl VcpClient<ReqwestTransport, ReqwestTransportErrorMapper> {
	/// Creates a reqwest-backed client, honoring `params.proxy`.
	pub fn new(endpoint: impl Into<String>, params: ClientParams) -> Result<Self> {
		let endpoint = endpoint.into();

		params.validate(&endpoint)?;

		let fetcher = match params.proxy.as_ref().filter(|p| !p.is_empty()) {
			Some(proxy) => Fetcher::with_proxy(proxy)?,
			None => Fetcher::new()?,
		};

		Self::with_fetcher(endpoint, params, fetcher)
	}
}
impl<T, M> Debug for VcpClient<T, M>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VcpClient")
			.field("endpoint", &self.endpoint)
			.field("username", &self.params.username)
			.field("authenticated", &self.auth_info.read().is_some())
			.finish()
	}
}

async fn discover<T, M>(
	fetcher: &Fetcher<T, M>,
	endpoint: &str,
	token: &Secret,
	scopes: &[&str],
) -> Result<DiscoveryResult>
where
	T: ?Sized + FetchTransport,
	M: ?Sized + TransportErrorMapper<T::TransportError>,
{
	let url = format!("{endpoint}/auth/discovery");
	let options = FetchOptions::new()
		.method(Method::Post)
		.access_token(token.clone())
		.form(RequestBody::form([("scope", scope::join(scopes))]));
	let result = match fetcher.fetch(&url, options)?.await?.into_json()? {
		Value::Object(fields) => DiscoveryResult::new(fields),
		_ => DiscoveryResult::default(),
	};
	let missing = result.missing(scopes);

	if !missing.is_empty() {
		return Err(Error::Discovery { missing: missing.into_iter().map(str::to_owned).collect() });
	}

	Ok(result)
}

#[cfg(test)]
mod tests {
	// std
	use std::{collections::HashMap, io};
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::{RawResponse, TransportFuture, TransportRequest},
	};

	#[derive(Clone, Default)]
	struct RoutedTransport {
		routes: Arc<Mutex<HashMap<(Method, String), RawResponse>>>,
		seen: Arc<Mutex<Vec<TransportRequest>>>,
	}
	impl RoutedTransport {
		fn route(&self, method: Method, path: &str, body: Value) -> &Self {
			let response = RawResponse::new(200)
				.with_header("content-type", "application/json")
				.with_body(body.to_string());

			self.routes.lock().insert((method, path.to_owned()), response);

			self
		}
	}
	impl FetchTransport for RoutedTransport {
		type TransportError = io::Error;

		fn send(&self, request: TransportRequest) -> TransportFuture<Self::TransportError> {
			let response = self.routes.lock().get(&(request.method, request.url.path().to_owned())).cloned();

			self.seen.lock().push(request);

			Box::pin(async move { response.ok_or_else(|| io::Error::from(io::ErrorKind::NotFound)) })
		}
	}

	struct IoMapper;
	impl TransportErrorMapper<io::Error> for IoMapper {
		fn map_transport_error(&self, _: &Url, _: StdDuration, error: io::Error) -> Error {
			TransportError::Io(error).into()
		}
	}

	fn params() -> ClientParams {
		ClientParams::new("app", "secret", "cid-1", "pw")
			.with_scope([scope::AUTH_API, scope::DISCOVERY_API, scope::ROSTER_SERVICE_HTTP_API])
	}

	fn client(transport: &RoutedTransport) -> VcpClient<RoutedTransport, IoMapper> {
		VcpClient::with_fetcher(
			"http://auth.test/",
			params(),
			Fetcher::with_transport(transport.clone(), IoMapper),
		)
		.expect("Client should build.")
	}

	fn roster_discovery() -> Value {
		json!({
			"endpoint": "http://roster.test/v1",
			"access_token": "roster-token",
			(scope::ROSTER_SERVICE_HTTP_API): {},
		})
	}

	#[test]
	fn construction_validates_params() {
		let transport = RoutedTransport::default();
		let err = VcpClient::<RoutedTransport, IoMapper>::with_fetcher(
			"",
			ClientParams::new("", "s", "u", ""),
			Fetcher::with_transport(transport, IoMapper),
		)
		.expect_err("Invalid params must be rejected.");

		match err {
			Error::Validation(e) => assert_eq!(
				e.messages,
				[
					"endpoint is required",
					"params.client_id is required",
					"params.password is required",
					"params.scope is required",
				]
			),
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[tokio::test]
	async fn auth_posts_password_grant_and_stores_token() {
		let transport = RoutedTransport::default();

		transport.route(Method::Post, "/auth/token", json!({ "access_token": "at-1", "expires_in": 60 }));

		let client = client(&transport);

		assert!(client.auth_info().is_none());

		let info = client.auth().await.expect("Auth should succeed.");

		assert_eq!(info.access_token.expose(), "at-1");
		assert_eq!(client.auth_info().map(|i| i.expires_in), Some(Some(60)));

		let seen = transport.seen.lock();
		let body = String::from_utf8_lossy(&seen[0].body).into_owned();

		assert_eq!(seen[0].url.as_str(), "http://auth.test/auth/token");
		assert!(body.contains("grant_type=password"));
		assert!(body.contains("username=cid-1"));
		assert!(body.contains(&format!(
			"scope={}",
			url::form_urlencoded::byte_serialize(scope::join(&params().scope).as_bytes())
				.collect::<String>()
		)));
	}

	#[tokio::test]
	async fn discovery_requires_auth() {
		let transport = RoutedTransport::default();
		let client = client(&transport);

		assert!(matches!(
			client.discovery(&[scope::USERINFO_QUERY]).await,
			Err(Error::Config(ConfigError::NotAuthenticated))
		));
		assert!(matches!(
			client.log_upload("line", "a.log", None),
			Err(Error::Config(ConfigError::NotAuthenticated))
		));
		assert!(transport.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn discovery_reports_missing_scopes() {
		let transport = RoutedTransport::default();

		transport
			.route(Method::Post, "/auth/token", json!({ "access_token": "at-1" }))
			.route(Method::Post, "/auth/discovery", json!({ (scope::USERINFO_QUERY): {} }));

		let client = client(&transport);

		client.auth().await.expect("Auth should succeed.");

		let info = client.user_info().await.expect("User info should resolve.");

		assert!(info.contains(scope::USERINFO_QUERY));

		let err = client
			.discovery(&[scope::INFORMATION_URI, scope::USERINFO_QUERY, scope::GD_ACCOUNT_INFO_QUERY])
			.await
			.expect_err("Missing scopes must reject.");

		assert!(matches!(err, Error::Discovery { ref missing }
			if missing == &[scope::INFORMATION_URI, scope::GD_ACCOUNT_INFO_QUERY]));

		let seen = transport.seen.lock();

		assert_eq!(
			seen[1].headers.get("authorization").and_then(|v| v.to_str().ok()),
			Some("Bearer at-1")
		);
	}

	#[tokio::test]
	async fn roster_calls_target_discovered_endpoint() {
		let transport = RoutedTransport::default();

		transport
			.route(Method::Post, "/auth/token", json!({ "access_token": "at-1" }))
			.route(Method::Post, "/auth/discovery", roster_discovery())
			.route(Method::Get, "/v1/cid-1", json!({ "total_results": 0 }))
			.route(Method::Post, "/v1/cid-1", json!({}))
			.route(Method::Put, "/v1/cid-1/cid-2", json!({}))
			.route(Method::Delete, "/v1/cid-1/cid-2", json!({}));

		let client = client(&transport);
		let contact = RosterContact::default().with_name("Hanako");

		client.auth().await.expect("Auth should succeed.");

		assert_eq!(
			client.get_roster(None).await.expect("Roster list should resolve."),
			FetchBody::Json(json!({ "total_results": 0 }))
		);
		client.add_roster("cid-2", &contact).await.expect("Add should resolve.");
		client.update_roster("cid-2", &contact).await.expect("Update should resolve.");
		client.delete_roster("cid-2").await.expect("Delete should resolve.");

		let seen = transport.seen.lock();
		let calls = seen
			.iter()
			.filter(|r| r.url.host_str() == Some("roster.test"))
			.map(|r| (r.method, r.url.path().to_owned()))
			.collect::<Vec<_>>();

		assert_eq!(
			calls,
			[
				(Method::Get, "/v1/cid-1".to_owned()),
				(Method::Post, "/v1/cid-1".to_owned()),
				(Method::Put, "/v1/cid-1/cid-2".to_owned()),
				(Method::Delete, "/v1/cid-1/cid-2".to_owned()),
			]
		);

		let add = seen.iter().find(|r| r.method == Method::Post && r.url.path() == "/v1/cid-1");
		let add = add.expect("Add request should be recorded.");

		assert_eq!(
			serde_json::from_slice::<Value>(&add.body).expect("Add body should be JSON."),
			json!({ "name": "Hanako", "udc_id": "cid-2" })
		);
		assert_eq!(
			add.headers.get("authorization").and_then(|v| v.to_str().ok()),
			Some("Bearer roster-token")
		);
	}

	#[tokio::test]
	async fn invalid_contact_is_rejected_before_discovery() {
		let transport = RoutedTransport::default();

		transport.route(Method::Post, "/auth/token", json!({ "access_token": "at-1" }));

		let client = client(&transport);

		client.auth().await.expect("Auth should succeed.");

		let contact = RosterContact::default().with_name_kana("k".repeat(256));
		let err = client.add_roster("cid-2", &contact).await.expect_err("Long kana must fail.");

		assert!(matches!(err, Error::Validation(ref e)
			if e.messages == ["name_kana's length should between 0 and 255"]));
		assert_eq!(transport.seen.lock().len(), 1);
	}

	#[tokio::test]
	async fn log_upload_substitutes_filename() {
		let transport = RoutedTransport::default();

		transport
			.route(Method::Post, "/auth/token", json!({ "access_token": "at-1" }))
			.route(
				Method::Post,
				"/auth/discovery",
				json!({
					"endpoint": "http://logs.test/upload/{filename_suffix}",
					"access_token": "log-token",
					(scope::LOG_UPLOAD_API): {},
				}),
			)
			.route(Method::Post, "/upload/app.log", json!({ "stored": true }));

		let client = client(&transport);

		client.auth().await.expect("Auth should succeed.");

		let body = client
			.log_upload("line 1\n", "app.log", Some(StdDuration::from_millis(3_000)))
			.expect("Upload should start.")
			.await
			.expect("Upload should resolve.");

		assert_eq!(body, FetchBody::Json(json!({ "stored": true })));

		let seen = transport.seen.lock();
		let upload = seen.last().expect("Upload request should be recorded.");

		assert_eq!(upload.body, b"line 1\n");
		assert_eq!(upload.timeout, StdDuration::from_millis(3_000));
		assert!(upload.headers.get("content-type").is_none());
	}

	#[test]
	fn log_upload_validates_synchronously() {
		let transport = RoutedTransport::default();
		let client = client(&transport);
		let err = client.log_upload("", "bad/name", None).expect_err("Invalid upload must fail.");

		assert!(matches!(err, Error::Validation(ref e)
			if e.messages == [
				"log is required",
				"invalid log filename. (API limit alphanumeric and -, ., _)",
			]));
	}
}
