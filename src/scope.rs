//! Scope identifiers understood by the auth and discovery APIs.

/// Auth API.
pub const AUTH_API: &str = "https://ucs.ricoh.com/scope/api/auth";
/// Discovery API.
pub const DISCOVERY_API: &str = "https://ucs.ricoh.com/scope/api/discovery";
/// UDC service API.
pub const UDC_SERVICE_API: &str = "https://ucs.ricoh.com/scope/api/udc";
/// Conference service API.
pub const CONFERENCE_SERVICE_API: &str = "https://ucs.ricoh.com/scope/api/conf";
/// Roster Web API.
pub const ROSTER_SERVICE_HTTP_API: &str = "https://ucs.ricoh.com/scope/api/roster.http";
/// Internal roster Web API.
pub const ROSTER_SERVICE_INTERNAL_HTTP_API: &str =
	"https://ucs.ricoh.com/scope/api/roster.http.internal";
/// Conference state API.
pub const CONFERENCE_STATE_HTTP_API: &str = "https://ucs.ricoh.com/scope/api/state";
/// Account info query API.
pub const GD_ACCOUNT_INFO_QUERY: &str = "https://ucs.ricoh.com/scope/api/gdinfo";
/// User info query API.
pub const USERINFO_QUERY: &str = "https://ucs.ricoh.com/scope/api/userinfo";
/// Log upload API.
pub const LOG_UPLOAD_API: &str = "https://ucs.ricoh.com/scope/api/logupload";
/// Information API.
pub const INFORMATION_URI: &str = "https://ucs.ricoh.com/scope/api/information";
/// Device client authentication.
pub const MD_CLIENT_AUTHENTICATION: &str = "https://ucs.ricoh.com/scope/api/client_auth";
/// Device UI.
pub const MD_UI_URI: &str = "https://ucs.ricoh.com/scope/api/ui";
/// Device update.
pub const MD_UPDATE_URI: &str = "https://ucs.ricoh.com/scope/api/update";
/// Legacy conference API.
pub const LEGACY_CONFERENCE_API: &str = "https://ucs.ricoh.com/scope/api/legacy";
/// Network diagnosis.
pub const NETWORK_DIAGNOSIS_URI: &str = "https://ucs.ricoh.com/scope/api/network_diag";
/// Account service API.
pub const ACCOUNT_SERVICE_API: &str = "https://ucs.ricoh.com/scope/api/account_";
/// Conference history API.
pub const CONFERENCE_HISTORY_SERVICE_API: &str =
	"https://ucs.ricoh.com/scope/api/conference_history";
/// Internal user service API.
pub const USER_SERVICE_INTERNAL_API: &str = "https://ucs.ricoh.com/scope/api/user.internal";
/// App list API.
pub const APP_LIST_API: &str = "https://ucs.ricoh.com/scope/api/app_list";

/// Every known scope, in declaration order.
pub const ALL: [&str; 20] = [
	AUTH_API,
	DISCOVERY_API,
	UDC_SERVICE_API,
	CONFERENCE_SERVICE_API,
	ROSTER_SERVICE_HTTP_API,
	ROSTER_SERVICE_INTERNAL_HTTP_API,
	CONFERENCE_STATE_HTTP_API,
	GD_ACCOUNT_INFO_QUERY,
	USERINFO_QUERY,
	LOG_UPLOAD_API,
	INFORMATION_URI,
	MD_CLIENT_AUTHENTICATION,
	MD_UI_URI,
	MD_UPDATE_URI,
	LEGACY_CONFERENCE_API,
	NETWORK_DIAGNOSIS_URI,
	ACCOUNT_SERVICE_API,
	CONFERENCE_HISTORY_SERVICE_API,
	USER_SERVICE_INTERNAL_API,
	APP_LIST_API,
];

/// Joins scopes into the space-delimited form the auth endpoints expect.
pub fn join<I, S>(scopes: I) -> String
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	scopes.into_iter().fold(String::new(), |mut acc, scope| {
		if !acc.is_empty() {
			acc.push(' ');
		}

		acc.push_str(scope.as_ref());

		acc
	})
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn scopes_are_unique_and_joinable() {
		assert_eq!(ALL.iter().collect::<HashSet<_>>().len(), ALL.len());
		assert_eq!(join([AUTH_API, DISCOVERY_API]), format!("{AUTH_API} {DISCOVERY_API}"));
		assert_eq!(join(Vec::<String>::new()), "");
	}
}
