//! Front-channel authorization (OAuth 2.0) and authentication (OpenID Connect) requests.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	http::HttpMethod,
	message::{Message, MessageKind, SerializationType},
	processor::ProcessorId,
	service::{ClientAuthMethod, HookEnv, ServiceDescriptor, ServiceHooks, id_token, token},
	state::StateItem,
};

/// OAuth 2.0 authorization request; the response is the redirect carrying `code`.
pub const AUTHORIZATION: ServiceDescriptor = ServiceDescriptor {
	name: "authorization",
	endpoint_name: Some("authorization_endpoint"),
	request_kind: Some(MessageKind::AuthorizationRequest),
	response_kind: MessageKind::AuthorizationResponse,
	http_method: HttpMethod::Get,
	auth_method: ClientAuthMethod::None,
	negotiate_auth_method: false,
	serialization: SerializationType::UrlEncoded,
	deserialization: SerializationType::UrlEncoded,
	state_item: Some(StateItem::AuthorizationResponse),
	default_args: &[],
	pre_constructors: &[
		ProcessorId::AddResponseType,
		ProcessorId::PickRedirectUri,
		ProcessorId::AddClientId,
		ProcessorId::AddState,
		ProcessorId::AddCodeChallenge,
	],
	post_constructors: &[ProcessorId::StoreAuthenticationRequest],
	hooks: ServiceHooks { post_parse: Some(check_response_issuer), ..ServiceHooks::DEFAULT },
};

/// OpenID Connect authentication request; ID tokens in the response are validated.
pub const AUTHENTICATION: ServiceDescriptor = ServiceDescriptor {
	name: "authentication",
	request_kind: Some(MessageKind::AuthenticationRequest),
	response_kind: MessageKind::AuthenticationResponse,
	pre_constructors: &[
		ProcessorId::AddResponseType,
		ProcessorId::PickRedirectUri,
		ProcessorId::AddClientId,
		ProcessorId::AddScope,
		ProcessorId::AddState,
		ProcessorId::AddNonce,
		ProcessorId::AddCodeChallenge,
	],
	post_constructors: &[ProcessorId::StoreAuthenticationRequest, ProcessorId::StoreNonce],
	hooks: ServiceHooks {
		post_parse: Some(parse_authentication_response),
		update_context: Some(update_authentication_context),
		..ServiceHooks::DEFAULT
	},
	..AUTHORIZATION
};

/// Rejects an RFC 9207 `iss` response parameter naming a different issuer.
fn check_response_issuer(message: &mut Message, ctx: &ServiceContext, _: &HookEnv<'_>) -> Result<()> {
	match message.get_str("iss") {
		Some(iss) => ctx.check_token_issuer(iss),
		None => Ok(()),
	}
}

fn parse_authentication_response(message: &mut Message, ctx: &ServiceContext, env: &HookEnv<'_>) -> Result<()> {
	check_response_issuer(message, ctx, env)?;
	id_token::attach_verified_id_token(message, ctx, env)
}

fn update_authentication_context(message: &mut Message, _: &mut ServiceContext, env: &HookEnv<'_>) -> Result<()> {
	token::add_expires_at(message);
	id_token::store_verified_id_token(message, env)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::state::MemoryStateStore;

	#[test]
	fn response_issuer_must_match() {
		let ctx = ServiceContext { issuer: Some("https://op.example.com".into()), ..Default::default() };
		let store = MemoryStateStore::default();
		let env = HookEnv { service: "authorization", store: &store, state: Some("s") };
		let mut message = Message::empty(MessageKind::AuthorizationResponse);

		message.insert("iss", "https://op.example.com/");

		check_response_issuer(&mut message, &ctx, &env).expect("A trailing slash is tolerated.");

		message.insert("iss", "https://evil.example.com");

		let err = check_response_issuer(&mut message, &ctx, &env).expect_err("Foreign issuers are rejected.");

		assert!(matches!(err, Error::ContextMismatch { attribute: "issuer", .. }));
	}

	#[test]
	fn response_issuer_is_strict_even_when_discovery_is_lenient() {
		let mut ctx = ServiceContext { issuer: Some("https://op.example.com".into()), ..Default::default() };
		let store = MemoryStateStore::default();
		let env = HookEnv { service: "authorization", store: &store, state: Some("s") };
		let mut message = Message::empty(MessageKind::AuthorizationResponse);

		ctx.allow.issuer_mismatch = true;
		message.insert("iss", "https://evil.example.com");

		assert!(check_response_issuer(&mut message, &ctx, &env).is_err());

		ctx.issuer = None;

		let err = check_response_issuer(&mut message, &ctx, &env).expect_err("An issuer must be configured.");

		assert!(matches!(err, Error::MissingRequiredAttribute { attribute: "issuer" }));
	}

	#[test]
	fn oidc_variant_adds_scope_and_nonce() {
		assert!(AUTHENTICATION.pre_constructors.contains(&ProcessorId::AddScope));
		assert!(AUTHENTICATION.pre_constructors.contains(&ProcessorId::AddNonce));
		assert!(!AUTHORIZATION.pre_constructors.contains(&ProcessorId::AddNonce));
		assert_eq!(AUTHENTICATION.endpoint_name, Some("authorization_endpoint"));
	}
}
