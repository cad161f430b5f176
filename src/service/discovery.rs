//! Provider metadata discovery (OpenID Connect Discovery 1.0 and RFC 8414).

// self
use crate::{
	_prelude::*,
	context::{ServiceContext, negotiate_behavior},
	http::HttpMethod,
	message::{Claims, Message, MessageKind, SerializationType, Value},
	service::{ClientAuthMethod, HookEnv, ServiceDescriptor, ServiceHooks},
};

/// Well-known path of the OpenID provider configuration.
pub const OIDC_CONFIGURATION_PATH: &str = "/.well-known/openid-configuration";
/// Well-known path of RFC 8414 authorization server metadata.
pub const OAUTH_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

/// OpenID provider configuration discovery.
pub const PROVIDER_INFO: ServiceDescriptor = ServiceDescriptor {
	name: "provider_info",
	endpoint_name: None,
	request_kind: None,
	response_kind: MessageKind::ProviderConfigurationResponse,
	http_method: HttpMethod::Get,
	auth_method: ClientAuthMethod::None,
	negotiate_auth_method: false,
	serialization: SerializationType::UrlEncoded,
	deserialization: SerializationType::Json,
	state_item: None,
	default_args: &[],
	pre_constructors: &[],
	post_constructors: &[],
	hooks: ServiceHooks {
		endpoint: Some(oidc_configuration_endpoint),
		update_context: Some(update_provider_info),
		..ServiceHooks::DEFAULT
	},
};

/// RFC 8414 authorization server metadata discovery.
pub const SERVER_METADATA: ServiceDescriptor = ServiceDescriptor {
	name: "server_metadata",
	response_kind: MessageKind::AuthorizationServerMetadata,
	hooks: ServiceHooks {
		endpoint: Some(oauth_metadata_endpoint),
		update_context: Some(update_provider_info),
		..ServiceHooks::DEFAULT
	},
	..PROVIDER_INFO
};

/// Joins `issuer` and a well-known `path`.
///
/// A trailing slash on the issuer is dropped; an issuer that already names a `.well-known`
/// document is used unchanged.
pub fn well_known_url(issuer: &str, path: &str) -> Result<Url> {
	let issuer = issuer.trim();

	if issuer.contains("/.well-known/") {
		return Error::parse_url(issuer);
	}

	Error::parse_url(&format!("{}{path}", issuer.trim_end_matches('/')))
}

fn oidc_configuration_endpoint(ctx: &ServiceContext, args: &mut Claims) -> Result<Url> {
	well_known_url(&discovery_issuer(ctx, args)?, OIDC_CONFIGURATION_PATH)
}

fn oauth_metadata_endpoint(ctx: &ServiceContext, args: &mut Claims) -> Result<Url> {
	well_known_url(&discovery_issuer(ctx, args)?, OAUTH_METADATA_PATH)
}

fn discovery_issuer(ctx: &ServiceContext, args: &mut Claims) -> Result<String> {
	match args.remove("issuer") {
		Some(Value::String(issuer)) if !issuer.is_empty() => Ok(issuer),
		_ => ctx.require_issuer().map(str::to_owned),
	}
}

/// Applies discovered metadata: issuer check, endpoint index, behavior negotiation.
///
/// Nothing is written to the context unless every step succeeds.
fn update_provider_info(message: &mut Message, ctx: &mut ServiceContext, _: &HookEnv<'_>) -> Result<()> {
	let found = message.get_str("issuer").unwrap_or_default().to_owned();

	ctx.check_discovered_issuer(&found)?;

	let behavior = negotiate_behavior(&ctx.client_preferences, message.claims())?;

	ctx.set_provider_info(message.claims().clone())?;
	ctx.set_behavior(behavior);

	if ctx.issuer.is_none() {
		ctx.set_issuer(found);
	}

	#[cfg(feature = "tracing")]
	tracing::debug!(issuer = ?ctx.issuer, endpoints = ctx.endpoints.len(), "provider metadata applied");

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn well_known_paths_join_cleanly() {
		let url = well_known_url("https://op.example.com/tenant/", OIDC_CONFIGURATION_PATH)
			.expect("Issuer should join.");

		assert_eq!(url.as_str(), "https://op.example.com/tenant/.well-known/openid-configuration");

		let url = well_known_url("https://op.example.com/.well-known/openid-configuration", OAUTH_METADATA_PATH)
			.expect("Well-known issuers are used as is.");

		assert_eq!(url.as_str(), "https://op.example.com/.well-known/openid-configuration");
	}

	#[test]
	fn issuer_argument_overrides_the_context() {
		let ctx = ServiceContext { issuer: Some("https://a.example.com".into()), ..Default::default() };
		let mut args = Claims::new();

		args.insert("issuer".into(), "https://b.example.com".into());

		let url = oauth_metadata_endpoint(&ctx, &mut args).expect("Endpoint should resolve.");

		assert_eq!(url.as_str(), "https://b.example.com/.well-known/oauth-authorization-server");
		assert!(args.is_empty());
	}

	#[test]
	fn discovery_needs_an_issuer() {
		let err = oidc_configuration_endpoint(&ServiceContext::default(), &mut Claims::new())
			.expect_err("No issuer is known.");

		assert!(matches!(err, Error::MissingRequiredAttribute { attribute: "issuer" }));
	}
}
