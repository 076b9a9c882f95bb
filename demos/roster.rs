//! Demonstrates authenticating, resolving the roster API through discovery, and adding a contact
//! with the default reqwest transport against a local mock of the service.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use vcp_client::{
	client::{ClientParams, ReqwestVcpClient, RosterContact},
	scope,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let roster_endpoint = server.url("/roster");
	let auth_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}");
		})
		.await;
	let discovery_body = serde_json::json!({
		"endpoint": roster_endpoint,
		"access_token": "demo-roster",
		(scope::ROSTER_SERVICE_HTTP_API): {},
	})
	.to_string();
	let _discovery_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/discovery");
			then.status(200).header("content-type", "application/json").body(discovery_body);
		})
		.await;
	let roster_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/roster/demo-user");
			then.status(201).header("content-type", "application/json").body("{\"udc_id\":\"friend\"}");
		})
		.await;
	let params = ClientParams::new("demo-client", "demo-secret", "demo-user", "demo-password")
		.with_scope([scope::AUTH_API, scope::DISCOVERY_API, scope::ROSTER_SERVICE_HTTP_API]);
	let client = ReqwestVcpClient::new(server.base_url(), params)?;
	let info = client.auth().await?;

	println!("Authenticated; token expires at {:?}.", info.expires_at());

	let contact = RosterContact::default().with_name("Friend").with_sender_name("Demo");
	let created = client.add_roster("friend", &contact).await?;

	println!("Roster entry created: {created}.");

	auth_mock.assert_async().await;
	roster_mock.assert_async().await;

	Ok(())
}
