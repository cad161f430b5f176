//! Builds an OpenID Connect authentication request with PKCE from static provider metadata, then
//! consumes the simulated redirect so the code is ready for the token exchange.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use serde_json::json;
// self
use oidc_rp::{
	client::Client,
	context::ServiceContext,
	message::Claims,
	service::ServiceKind,
	state::{MemoryStateStore, StateItem, StateStore},
};

fn main() -> Result<()> {
	color_eyre::install()?;

	let store = Arc::new(MemoryStateStore::default());
	let mut context = ServiceContext::builder()
		.issuer("https://provider.example.com")
		.client_id("demo-client")
		.client_secret("demo-secret")
		.redirect_uri("https://app.example.com/oidc/callback")
		.preference("code_challenge_method", "S256")
		.build()?;
	let metadata: Claims = serde_json::from_value(json!({
		"issuer": "https://provider.example.com",
		"authorization_endpoint": "https://provider.example.com/authorize",
		"token_endpoint": "https://provider.example.com/token",
		"jwks_uri": "https://provider.example.com/jwks",
	}))?;

	context.set_provider_info(metadata)?;

	let mut client = Client::new(context, store.clone());
	let request = client.build_request(ServiceKind::Authentication, None, None)?;
	let state = request
		.url
		.query_pairs()
		.find_map(|(name, value)| (name == "state").then(|| value.into_owned()))
		.unwrap_or_default();

	println!("Send your user to {}.", request.url);
	println!("PKCE verifier stored for state `{state}`: {}.", store.get_code_verifier(&state).is_ok());

	// Simulate the provider redirecting back with a code.
	let redirect = format!("https://app.example.com/oidc/callback?code=demo-code&state={state}");

	client.parse_response(ServiceKind::Authentication, &redirect, None)?;

	let response = store.get_item(&state, StateItem::AuthorizationResponse)?;

	println!(
		"Stored code `{}`; call ServiceKind::OidcAccessToken with this state to redeem it.",
		response.get_str("code").unwrap_or_default()
	);

	Ok(())
}
