#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oidc_rp::{
	_preludet::*,
	client::ReqwestRpClient,
	context::ServiceContext,
	message::{JwsCodec, UnsecuredJwsCodec},
	service::{ServiceKind, id_token::VERIFIED_ID_TOKEN},
	state::{MemoryStateStore, StateItem, StateStore},
};

const CLIENT_ID: &str = "client-flow";
const CLIENT_SECRET: &str = "secret-flow";
const NONCE: &str = "nonce-flow";

fn metadata(server: &MockServer) -> String {
	json!({
		"issuer": server.base_url(),
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
		"userinfo_endpoint": server.url("/userinfo"),
		"jwks_uri": server.url("/jwks"),
		"response_types_supported": ["code"],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["none"],
		"token_endpoint_auth_methods_supported": ["client_secret_post"],
	})
	.to_string()
}

fn id_token(server: &MockServer) -> String {
	let now = OffsetDateTime::now_utc().unix_timestamp();
	let claims = json!({
		"iss": server.base_url(),
		"sub": "alice",
		"aud": CLIENT_ID,
		"iat": now,
		"exp": now + 600,
		"nonce": NONCE,
	});

	UnsecuredJwsCodec
		.sign(claims.as_object().expect("Fixture claims should be an object."), "none")
		.expect("Fixture ID token should sign.")
}

fn build_client(server: &MockServer) -> (ReqwestRpClient, Arc<MemoryStateStore>) {
	let context = ServiceContext::builder()
		.issuer(server.base_url())
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.keys(Arc::new(UnsecuredJwsCodec))
		.redirect_uri("https://rp.example.com/cb")
		.preference("token_endpoint_auth_method", json!(["client_secret_basic", "client_secret_post"]))
		.build()
		.expect("Client context should build successfully.");

	build_reqwest_test_client(context)
}

#[tokio::test]
async fn code_flow_round_trip() {
	let server = MockServer::start_async().await;
	let (mut client, store) = build_client(&server);
	let discovery = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(metadata(&server));
		})
		.await;

	client
		.request(ServiceKind::ProviderInfoDiscovery, None, None)
		.await
		.expect("Discovery should succeed.");
	discovery.assert_async().await;

	assert_eq!(client.context.behavior_str("token_endpoint_auth_method"), Some("client_secret_post"));

	let authorize = client
		.build_request(ServiceKind::Authentication, Some(claims([("nonce", NONCE)])), None)
		.expect("Authentication request should build.");
	let query: BTreeMap<String, String> = authorize.url.query_pairs().into_owned().collect();
	let state = query.get("state").cloned().expect("The request should carry a state key.");

	assert_eq!(authorize.url.path(), "/authorize");
	assert_eq!(query.get("client_id").map(String::as_str), Some(CLIENT_ID));
	assert_eq!(query.get("scope").map(String::as_str), Some("openid"));
	assert_eq!(query.get("redirect_uri").map(String::as_str), Some("https://rp.example.com/cb"));
	assert_eq!(store.get_state_key_by_nonce(NONCE).as_deref(), Ok(state.as_str()));

	let redirect = format!("https://rp.example.com/cb?code=code-flow&state={state}");

	client
		.parse_response(ServiceKind::Authentication, &redirect, None)
		.expect("Authorization response should be accepted.");

	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				json!({
					"access_token": "at-flow",
					"token_type": "Bearer",
					"expires_in": 3600,
					"refresh_token": "rt-flow",
					"id_token": id_token(&server),
				})
				.to_string(),
			);
		})
		.await;
	let tokens = client
		.request(ServiceKind::OidcAccessToken, None, Some(&state))
		.await
		.expect("Token exchange should succeed.");

	token.assert_async().await;

	assert_eq!(tokens.get_str("access_token"), Some("at-flow"));
	assert!(tokens.get_i64("expires_at").is_some());
	assert!(tokens.get(VERIFIED_ID_TOKEN).is_some());
	assert_eq!(
		store
			.get_item(&state, StateItem::VerifiedIdToken)
			.expect("Verified ID token should be stored.")
			.get_str("sub"),
		Some("alice")
	);

	let userinfo = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo").header("authorization", "Bearer at-flow");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"sub":"alice","email":"alice@example.com"}"#);
		})
		.await;
	let info = client
		.request(ServiceKind::UserInfo, None, Some(&state))
		.await
		.expect("User-info request should succeed.");

	userinfo.assert_async().await;

	assert_eq!(info.get_str("email"), Some("alice@example.com"));
	assert!(store.get_item(&state, StateItem::UserInfo).is_ok());
}

#[tokio::test]
async fn refresh_rotates_into_its_own_slot() {
	let server = MockServer::start_async().await;
	let (mut client, store) = build_client(&server);

	client.context.endpoints.insert(
		"token_endpoint".into(),
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
	);

	let state = store
		.create_state_record(&server.base_url(), None)
		.expect("Record should be created.");
	let seeded = oidc_rp::message::Message::new(
		oidc_rp::message::MessageKind::AccessTokenResponse,
		claims([("access_token", "at-old"), ("token_type", "Bearer"), ("refresh_token", "rt-old")]),
	);

	store.store_item(&seeded, &state, StateItem::TokenResponse).expect("Token response should be seeded.");

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header_exists("authorization");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"at-new","token_type":"Bearer","refresh_token":"rt-new"}"#);
		})
		.await;
	let refreshed = client
		.request(ServiceKind::RefreshAccessToken, None, Some(&state))
		.await
		.expect("Refresh should succeed.");

	refresh.assert_async().await;

	assert_eq!(refreshed.get_str("access_token"), Some("at-new"));
	assert_eq!(
		store
			.get_item(&state, StateItem::RefreshTokenResponse)
			.expect("Refresh response should be stored.")
			.get_str("refresh_token"),
		Some("rt-new")
	);
	assert_eq!(
		store
			.get_item(&state, StateItem::TokenResponse)
			.expect("Original token response should be kept.")
			.get_str("access_token"),
		Some("at-old")
	);
}

#[tokio::test]
async fn provider_errors_surface_with_status() {
	let server = MockServer::start_async().await;
	let (mut client, _) = build_client(&server);

	client.context.endpoints.insert(
		"userinfo_endpoint".into(),
		Url::parse(&server.url("/userinfo")).expect("Mock user-info endpoint should parse successfully."),
	);

	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo");
			then.status(401).header("content-type", "application/json").body(r#"{"error":"invalid_token"}"#);
		})
		.await;
	let err = client
		.request(ServiceKind::UserInfo, Some(claims([("access_token", "at-stale")])), Some("unknown"))
		.await
		.expect_err("Invalid tokens should surface to the caller.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::ErrorResponse(ref e) if e.error == "invalid_token" && e.status == Some(401)
	));
}
