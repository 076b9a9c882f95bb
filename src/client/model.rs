//! Request parameters and response shapes used by [`super::VcpClient`].

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, DecodeError},
	http::ProxyConfig,
	secret::Secret,
	validate::{self, ValidationError},
};

const DEFAULT_GRANT_TYPE: &str = "password";

/// Credentials and scopes sent to the auth API.
///
/// Loadable from any serde source; `grant_type` defaults to `password` and `proxy` to a direct
/// connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientParams {
	/// Client identifier of the calling application.
	pub client_id: String,
	/// Client secret of the calling application.
	pub client_secret: Secret,
	/// CID of the user.
	pub username: String,
	/// Password of the user.
	pub password: Secret,
	/// Scopes requested at auth time.
	#[serde(default)]
	pub scope: Vec<String>,
	/// OAuth grant type.
	#[serde(default = "default_grant_type")]
	pub grant_type: String,
	/// Proxy used for every request the client makes.
	#[serde(default)]
	pub proxy: Option<ProxyConfig>,
}
impl ClientParams {
	/// Creates password-grant parameters with no scopes.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<Secret>,
		username: impl Into<String>,
		password: impl Into<Secret>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			username: username.into(),
			password: password.into(),
			scope: Vec::new(),
			grant_type: default_grant_type(),
			proxy: None,
		}
	}

	/// Replaces the requested scopes.
	pub fn with_scope<I, S>(mut self, scope: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scope = scope.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the grant type.
	pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
		self.grant_type = grant_type.into();

		self
	}

	/// Routes the client's requests through `proxy`.
	pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
		self.proxy = Some(proxy);

		self
	}

	/// Validates the parameters against `endpoint`.
	pub fn validate(&self, endpoint: &str) -> Result<(), ValidationError> {
		validate::client_params(
			endpoint,
			&[
				("client_id", &self.client_id),
				("client_secret", self.client_secret.expose()),
				("username", &self.username),
				("password", self.password.expose()),
				("grant_type", &self.grant_type),
			],
			&self.scope,
		)
	}
}

fn default_grant_type() -> String {
	DEFAULT_GRANT_TYPE.to_owned()
}

/// Token response returned by the auth API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
	/// Bearer token for the discovery API.
	pub access_token: Secret,
	/// Refresh token, when issued.
	#[serde(default)]
	pub refresh_token: Option<Secret>,
	/// Token type reported by the server.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Lifetime in seconds, when reported.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Space-delimited scopes granted by the server.
	#[serde(default)]
	pub scope: Option<String>,
	/// Local instant the response was received.
	#[serde(skip, default = "OffsetDateTime::now_utc")]
	pub issued_at: OffsetDateTime,
}
impl AuthInfo {
	/// Instant the access token stops being valid, if the server reported a lifetime.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_in.map(|secs| self.issued_at + Duration::seconds(secs))
	}

	/// Returns true if the token is known to be expired at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at().is_some_and(|at| now >= at)
	}

	/// Granted scopes split on whitespace.
	pub fn granted_scopes(&self) -> Vec<&str> {
		self.scope.as_deref().map(|s| s.split_whitespace().collect()).unwrap_or_default()
	}
}

/// Endpoint and token resolved by discovery for one API.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DiscoveryTarget {
	/// Base URL of the API.
	pub endpoint: String,
	/// Bearer token for the API.
	pub access_token: Secret,
}

/// Raw discovery response keyed by scope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryResult(Map<String, Value>);
impl DiscoveryResult {
	/// Wraps a decoded discovery response.
	pub fn new(fields: Map<String, Value>) -> Self {
		Self(fields)
	}

	/// Returns true if the response carries an entry for `scope`.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.contains_key(scope)
	}

	/// Returns the entry for `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Scopes from `requested` that the response does not mention, in request order.
	pub fn missing<'a>(&self, requested: &[&'a str]) -> Vec<&'a str> {
		requested.iter().copied().filter(|scope| !self.contains(scope)).collect()
	}

	/// Reads the top-level `endpoint` and `access_token` fields.
	pub fn target(&self) -> Result<DiscoveryTarget> {
		serde_path_to_error::deserialize(Value::Object(self.0.clone()))
			.map_err(|source| DecodeError::Shape { source }.into())
	}

	/// Returns the underlying JSON object.
	pub fn into_inner(self) -> Map<String, Value> {
		self.0
	}
}

/// Contact fields accepted by the roster API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterContact {
	/// Display name, up to 100 characters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Phonetic name, up to 255 characters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name_kana: Option<String>,
	/// Sender display name, up to 100 characters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sender_name: Option<String>,
	/// Sender phonetic name, up to 255 characters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sender_name_kana: Option<String>,
}
impl RosterContact {
	/// Sets the display name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());

		self
	}

	/// Sets the phonetic name.
	pub fn with_name_kana(mut self, kana: impl Into<String>) -> Self {
		self.name_kana = Some(kana.into());

		self
	}

	/// Sets the sender display name.
	pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
		self.sender_name = Some(name.into());

		self
	}

	/// Sets the sender phonetic name.
	pub fn with_sender_name_kana(mut self, kana: impl Into<String>) -> Self {
		self.sender_name_kana = Some(kana.into());

		self
	}

	/// Checks the field lengths.
	pub fn validate(&self) -> Result<(), ValidationError> {
		validate::roster_contact(&[
			("name", self.name.as_deref(), 100),
			("name_kana", self.name_kana.as_deref(), 255),
			("sender_name", self.sender_name.as_deref(), 100),
			("sender_name_kana", self.sender_name_kana.as_deref(), 255),
		])
	}

	pub(crate) fn to_json(&self, udc_id: Option<&str>) -> Result<Map<String, Value>, ConfigError> {
		let mut fields = match serde_json::to_value(self).map_err(ConfigError::BodySerialize)? {
			Value::Object(fields) => fields,
			_ => Map::new(),
		};

		if let Some(cid) = udc_id {
			fields.insert("udc_id".into(), Value::String(cid.to_owned()));
		}

		Ok(fields)
	}
}
