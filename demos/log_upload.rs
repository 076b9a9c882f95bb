//! Demonstrates a cancellable log upload: the first upload completes, the second is cancelled
//! while the server is still stalling.

// std
use std::time::Duration;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use vcp_client::{
	client::{ClientParams, ReqwestVcpClient},
	scope,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let upload_endpoint = server.url("/logs/{filename_suffix}");
	let _auth_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\"}");
		})
		.await;
	let discovery_body = serde_json::json!({
		"endpoint": upload_endpoint,
		"access_token": "demo-upload",
		(scope::LOG_UPLOAD_API): {},
	})
	.to_string();
	let _discovery_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/discovery");
			then.status(200).header("content-type", "application/json").body(discovery_body);
		})
		.await;
	let _fast_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/logs/boot.log");
			then.status(200);
		})
		.await;
	let _slow_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/logs/crash.log");
			then.status(200).delay(Duration::from_secs(5));
		})
		.await;
	let params = ClientParams::new("demo-client", "demo-secret", "demo-user", "demo-password")
		.with_scope([scope::AUTH_API, scope::DISCOVERY_API, scope::LOG_UPLOAD_API]);
	let client = ReqwestVcpClient::new(server.base_url(), params)?;

	client.auth().await?;
	client.log_upload("boot ok\n", "boot.log", None)?.await?;

	println!("Uploaded boot.log.");

	let upload = client.log_upload("stack trace\n", "crash.log", Some(Duration::from_secs(30)))?;
	let handle = upload.cancel_handle();

	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(250)).await;

		handle.cancel();
	});

	match upload.await {
		Err(e) if e.is_cancelled() => println!("Upload of crash.log stopped: {e}."),
		other => println!("Unexpected upload result: {other:?}."),
	}

	Ok(())
}
