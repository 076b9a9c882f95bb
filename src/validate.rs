//! Parameter-shape validation for client construction, roster contacts, and log uploads.
//!
//! Each validator collects every violated rule instead of stopping at the first, so callers can
//! report all problems at once.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, http::MIN_TIMEOUT};

/// Largest log accepted by the log upload API, exclusive.
pub const MAX_LOG_BYTES: usize = 128 * 1024 * 1024;
/// Longest log filename accepted by the log upload API.
pub const MAX_LOG_FILENAME_LEN: usize = 32;

/// Violations collected by a validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Invalid parameters: {}.", .messages.join("; "))]
pub struct ValidationError {
	/// Human-readable rule violations, in rule order.
	pub messages: Vec<String>,
}
impl ValidationError {
	/// Returns `Ok(())` when `messages` is empty, the aggregated error otherwise.
	pub fn check(messages: Vec<String>) -> Result<(), Self> {
		if messages.is_empty() { Ok(()) } else { Err(Self { messages }) }
	}
}

/// Checks that the endpoint and every credential field are present.
pub fn client_params(
	endpoint: &str,
	fields: &[(&str, &str)],
	scope: &[String],
) -> Result<(), ValidationError> {
	let mut messages = Vec::new();

	if endpoint.trim().is_empty() {
		messages.push("endpoint is required".to_owned());
	}

	for (name, value) in fields {
		if value.is_empty() {
			messages.push(format!("params.{name} is required"));
		}
	}

	if scope.is_empty() {
		messages.push("params.scope is required".to_owned());
	} else if scope.iter().any(|s| s.is_empty() || s.chars().any(char::is_whitespace)) {
		messages.push("params.scope should not contain empty or whitespace entries".to_owned());
	}

	ValidationError::check(messages)
}

/// Checks the optional text fields of a roster contact against their length limits.
pub fn roster_contact(fields: &[(&str, Option<&str>, usize)]) -> Result<(), ValidationError> {
	let messages = fields
		.iter()
		.filter_map(|&(name, value, max)| {
			let len = value?.chars().count();

			(len > max).then(|| format!("{name}'s length should between 0 and {max}"))
		})
		.collect();

	ValidationError::check(messages)
}

/// Checks a log upload against the API limits.
pub fn log_upload(
	log: &[u8],
	filename: &str,
	timeout: Option<StdDuration>,
) -> Result<(), ValidationError> {
	let mut messages = Vec::new();

	if log.is_empty() {
		messages.push("log is required".to_owned());
	} else if log.len() >= MAX_LOG_BYTES {
		messages.push("logfile too large. (API limit 128MB)".to_owned());
	}

	if filename.is_empty() {
		messages.push("filename is required".to_owned());
	} else {
		if filename.len() > MAX_LOG_FILENAME_LEN {
			messages.push("logfile name too large. (API limit less than 32byte)".to_owned());
		}
		if !filename.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
			messages.push("invalid log filename. (API limit alphanumeric and -, ., _)".to_owned());
		}
	}

	if timeout.is_some_and(|t| t < MIN_TIMEOUT) {
		messages.push("timeout should be positive".to_owned());
	}

	ValidationError::check(messages)
}
