//! Token endpoint exchanges: authorization code and refresh token.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	http::HttpMethod,
	message::{Message, MessageKind, SerializationType},
	processor::ProcessorId,
	service::{ClientAuthMethod, HookEnv, ServiceDescriptor, ServiceHooks, id_token},
	state::StateItem,
};

/// OAuth 2.0 authorization-code exchange.
pub const ACCESS_TOKEN: ServiceDescriptor = ServiceDescriptor {
	name: "access_token",
	endpoint_name: Some("token_endpoint"),
	request_kind: Some(MessageKind::AccessTokenRequest),
	response_kind: MessageKind::AccessTokenResponse,
	http_method: HttpMethod::Post,
	auth_method: ClientAuthMethod::ClientSecretBasic,
	negotiate_auth_method: true,
	serialization: SerializationType::UrlEncoded,
	deserialization: SerializationType::Json,
	state_item: Some(StateItem::TokenResponse),
	default_args: &[("grant_type", "authorization_code")],
	pre_constructors: &[ProcessorId::ExtendAccessTokenRequestArguments, ProcessorId::AddCodeVerifier],
	post_constructors: &[],
	hooks: ServiceHooks { update_context: Some(update_token_context), ..ServiceHooks::DEFAULT },
};

/// OpenID Connect authorization-code exchange; the returned ID token is validated.
pub const OIDC_ACCESS_TOKEN: ServiceDescriptor = ServiceDescriptor {
	name: "oidc_access_token",
	hooks: ServiceHooks {
		post_parse: Some(id_token::attach_verified_id_token),
		update_context: Some(update_token_context),
		..ServiceHooks::DEFAULT
	},
	..ACCESS_TOKEN
};

/// Refresh-token exchange.
pub const REFRESH_ACCESS_TOKEN: ServiceDescriptor = ServiceDescriptor {
	name: "refresh_access_token",
	request_kind: Some(MessageKind::RefreshAccessTokenRequest),
	state_item: Some(StateItem::RefreshTokenResponse),
	default_args: &[("grant_type", "refresh_token")],
	pre_constructors: &[ProcessorId::ExtendRefreshRequestArguments],
	..ACCESS_TOKEN
};

/// Derives the absolute `expires_at` (unix seconds) from a relative `expires_in`.
pub fn add_expires_at(message: &mut Message) {
	if let Some(expires_in) = message.get_i64("expires_in") {
		let now = OffsetDateTime::now_utc().unix_timestamp();

		message.insert("expires_at", now.saturating_add(expires_in));
	}
}

fn update_token_context(message: &mut Message, _: &mut ServiceContext, env: &HookEnv<'_>) -> Result<()> {
	add_expires_at(message);
	id_token::store_verified_id_token(message, env)
}
