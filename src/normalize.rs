//! Response normalization.
//!
//! Turns a [`RawResponse`] into a [`FetchBody`] or one of the structured application errors.
//! Decoding rules:
//!
//! - a missing `content-length` header, or a value of `0`, decodes to [`FetchBody::Empty`];
//!   otherwise the body text is kept as [`FetchBody::Text`];
//! - a `content-type` containing `application/json` replaces that with the parsed JSON value,
//!   regardless of `content-length`; malformed JSON is an error, never `Empty`;
//! - any status above 399 is an error and must carry either an `error`/`error_description` pair
//!   or a non-empty `errors` array, anything else is reported as [`Error::ProtocolViolation`].

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{DecodeError, FetchError, FetchErrors},
	http::RawResponse,
};

/// Highest status code still treated as success.
pub const MAX_SUCCESS_STATUS: u16 = 399;

const BODY_PREVIEW_LIMIT: usize = 256;

/// Decoded response payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FetchBody {
	/// Response declared no content.
	#[default]
	Empty,
	/// Non-JSON body text.
	Text(String),
	/// Parsed JSON body.
	Json(Value),
}
impl FetchBody {
	/// Returns true for [`FetchBody::Empty`].
	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}

	/// Returns the body text for [`FetchBody::Text`].
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			_ => None,
		}
	}

	/// Returns the JSON value for [`FetchBody::Json`].
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Converts the body into a JSON value; `Empty` becomes `null`.
	pub fn into_json(self) -> Result<Value> {
		match self {
			Self::Empty => Ok(Value::Null),
			Self::Json(value) => Ok(value),
			Self::Text(_) => Err(DecodeError::NotJson.into()),
		}
	}

	/// Deserializes a JSON body into `T`, reporting the failing path on mismatch.
	pub fn deserialize<T>(self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let value = self.into_json()?;

		serde_path_to_error::deserialize(value)
			.map_err(|source| DecodeError::Shape { source }.into())
	}
}
impl Display for FetchBody {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Empty => f.write_str("null"),
			Self::Text(text) => f.write_str(text),
			Self::Json(value) => write!(f, "{value}"),
		}
	}
}

/// Normalizes a raw response into the decoded body or a structured error.
pub fn normalize(response: &RawResponse) -> Result<FetchBody> {
	let body = decode(response)?;

	if response.status > MAX_SUCCESS_STATUS {
		return Err(map_error_body(response.status, &body));
	}

	Ok(body)
}

/// Decodes the response body per the content headers, ignoring the status.
pub fn decode(response: &RawResponse) -> Result<FetchBody, DecodeError> {
	if is_json(response) {
		let text = response.text();

		if text.trim().is_empty() {
			return Ok(FetchBody::Empty);
		}

		return serde_json::from_str(&text)
			.map(FetchBody::Json)
			.map_err(|source| DecodeError::Json { status: response.status, source });
	}

	match response.header("content-length").map(str::trim) {
		None | Some("0") => Ok(FetchBody::Empty),
		Some(_) => Ok(FetchBody::Text(response.text().into_owned())),
	}
}

fn is_json(response: &RawResponse) -> bool {
	response
		.header("content-type")
		.map(|value| value.to_ascii_lowercase().contains("application/json"))
		.unwrap_or(false)
}

fn map_error_body(status: u16, body: &FetchBody) -> Error {
	if let FetchBody::Json(Value::Object(fields)) = body {
		if let Some(code) = fields.get("error") {
			return FetchError::new(field_text(fields.get("error_description")), field_text(Some(code)))
				.into();
		}
		if let Some(Value::Array(entries)) = fields.get("errors").filter(|v| is_non_empty_array(v)) {
			let errors = entries
				.iter()
				.map(|entry| {
					FetchError::new(field_text(entry.get("message")), field_text(entry.get("message_id")))
				})
				.collect::<Vec<_>>();

			return FetchErrors::new(format!("Server reported {} error(s).", errors.len()), errors)
				.into();
		}
	}

	Error::ProtocolViolation { status, body: preview(&body.to_string()) }
}

fn is_non_empty_array(value: &Value) -> bool {
	value.as_array().is_some_and(|entries| !entries.is_empty())
}

fn field_text(value: Option<&Value>) -> String {
	match value {
		None | Some(Value::Null) => String::new(),
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
	}
}

fn preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn json_response(status: u16, body: &str) -> RawResponse {
		RawResponse::new(status)
			.with_header("content-type", "application/json; charset=utf-8")
			.with_body(body)
	}

	#[test]
	fn missing_or_zero_content_length_decodes_to_empty() {
		let mut response = RawResponse::new(200);

		response.body = b"ignored".to_vec();

		assert_eq!(normalize(&response).expect("Body-less 200 should resolve."), FetchBody::Empty);

		let response = response.with_header("content-length", "0");

		assert_eq!(normalize(&response).expect("Zero-length 200 should resolve."), FetchBody::Empty);
	}

	#[test]
	fn text_bodies_pass_through() {
		let response = RawResponse::new(200).with_header("content-type", "text/plain").with_body("hello");

		assert_eq!(
			normalize(&response).expect("Text body should resolve."),
			FetchBody::Text("hello".into())
		);
	}

	#[test]
	fn json_bodies_are_parsed() {
		let body = normalize(&json_response(200, r#"{"ok":true}"#)).expect("JSON body should resolve.");

		assert_eq!(body, FetchBody::Json(json!({ "ok": true })));

		let mut chunked = RawResponse::new(200).with_header("Content-Type", "application/json");

		chunked.body = b"[1,2]".to_vec();

		assert_eq!(
			normalize(&chunked).expect("JSON without content-length should still parse."),
			FetchBody::Json(json!([1, 2]))
		);
	}

	#[test]
	fn malformed_json_is_an_error() {
		let err = normalize(&json_response(200, "{oops")).expect_err("Malformed JSON must not resolve.");

		assert!(matches!(err, Error::Decode(DecodeError::Json { status: 200, .. })));
	}

	#[test]
	fn status_399_is_success_and_400_is_error() {
		let ok = normalize(&json_response(399, r#"{"error":"x"}"#));

		assert!(ok.is_ok(), "399 must resolve.");

		let err = normalize(&json_response(400, r#"{"error":"x"}"#));

		assert!(matches!(err, Err(Error::Application(_))));
	}

	#[test]
	fn single_error_shape_maps_to_fetch_error() {
		let err = normalize(&json_response(
			400,
			r#"{"error":"invalid_client","error_description":"bad id"}"#,
		))
		.expect_err("400 must reject.");

		match err {
			Error::Application(e) => {
				assert_eq!(e.message, "bad id");
				assert_eq!(e.code, "invalid_client");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn missing_description_yields_empty_message() {
		let err = normalize(&json_response(401, r#"{"error":"invalid_token"}"#))
			.expect_err("401 must reject.");

		assert!(matches!(err, Error::Application(FetchError { ref message, ref code })
			if message.is_empty() && code == "invalid_token"));
	}

	#[test]
	fn multiple_error_shape_preserves_order() {
		let err = normalize(&json_response(
			422,
			r#"{"errors":[{"message":"m1","message_id":"c1"},{"message":"m2","message_id":"c2"}]}"#,
		))
		.expect_err("422 must reject.");

		match err {
			Error::Applications(errors) => assert_eq!(
				errors.errors,
				vec![FetchError::new("m1", "c1"), FetchError::new("m2", "c2")]
			),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn unrecognized_error_shapes_are_protocol_violations() {
		for response in [
			json_response(500, r#"{"detail":"boom"}"#),
			json_response(500, r#"{"errors":"not-a-list"}"#),
			json_response(422, r#"{"errors":[]}"#),
			RawResponse::new(503).with_header("content-type", "text/html").with_body("<h1>down</h1>"),
			RawResponse::new(404),
		] {
			let status = response.status;
			let err = normalize(&response).expect_err("Error statuses must reject.");

			assert!(
				matches!(err, Error::ProtocolViolation { status: s, .. } if s == status),
				"Unexpected error for status {status}: {err:?}."
			);
		}
	}

	#[test]
	fn protocol_violation_preview_is_truncated() {
		let long = "x".repeat(BODY_PREVIEW_LIMIT + 10);
		let response = RawResponse::new(500).with_header("content-type", "text/plain").with_body(long);

		match normalize(&response) {
			Err(Error::ProtocolViolation { body, .. }) =>
				assert_eq!(body.chars().count(), BODY_PREVIEW_LIMIT + 1),
			other => panic!("Unexpected result: {other:?}."),
		}
	}

	#[test]
	fn typed_deserialize_reports_path() {
		#[derive(Debug, Deserialize)]
		struct Roster {
			#[allow(dead_code)]
			total_results: u32,
		}

		let body = FetchBody::Json(json!({ "total_results": "many" }));
		let err = body.deserialize::<Roster>().expect_err("Shape mismatch should fail.");

		assert!(matches!(err, Error::Decode(DecodeError::Shape { .. })));
		assert!(err.to_string().contains("total_results"));
		assert!(FetchBody::Text("plain".into()).into_json().is_err());
		assert_eq!(FetchBody::Empty.into_json().expect("Empty should become null."), Value::Null);
	}
}
