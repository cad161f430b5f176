//! OpenID Connect dynamic client registration.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	http::HttpMethod,
	message::{Message, MessageKind, SerializationType},
	processor::ProcessorId,
	service::{ClientAuthMethod, HookEnv, ServiceDescriptor, ServiceHooks},
};

/// Registered metadata adopted into the negotiated behavior.
const BEHAVIOR_KEYS: &[&str] = &[
	"response_types",
	"grant_types",
	"token_endpoint_auth_method",
	"token_endpoint_auth_signing_alg",
	"id_token_signed_response_alg",
	"userinfo_signed_response_alg",
	"request_object_signing_alg",
];

/// Client registration request.
pub const REGISTRATION: ServiceDescriptor = ServiceDescriptor {
	name: "registration",
	endpoint_name: Some("registration_endpoint"),
	request_kind: Some(MessageKind::RegistrationRequest),
	response_kind: MessageKind::RegistrationResponse,
	http_method: HttpMethod::Post,
	auth_method: ClientAuthMethod::None,
	negotiate_auth_method: false,
	serialization: SerializationType::Json,
	deserialization: SerializationType::Json,
	state_item: None,
	default_args: &[],
	pre_constructors: &[
		ProcessorId::AddClientBehaviourPreference,
		ProcessorId::AddRedirectUris,
		ProcessorId::AddOidcResponseTypes,
	],
	post_constructors: &[],
	hooks: ServiceHooks { update_context: Some(update_registration), ..ServiceHooks::DEFAULT },
};

fn update_registration(message: &mut Message, ctx: &mut ServiceContext, _: &HookEnv<'_>) -> Result<()> {
	let client_id = message
		.get_str("client_id")
		.ok_or(Error::MissingRequiredAttribute { attribute: "client_id" })?
		.to_owned();

	ctx.client_id = Some(client_id);

	if let Some(secret) = message.get_str("client_secret") {
		ctx.client_secret = Some(secret.to_owned());
	}

	for name in BEHAVIOR_KEYS {
		if let Some(value) = message.get(name) {
			ctx.behavior.insert((*name).to_owned(), value.clone());
		}
	}

	ctx.registration_response = Some(message.claims().clone());

	#[cfg(feature = "tracing")]
	tracing::debug!(client_id = ?ctx.client_id, "client registered");

	Ok(())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::state::MemoryStateStore;

	#[test]
	fn registration_adopts_credentials_and_behavior() {
		let store = MemoryStateStore::default();
		let env = HookEnv { service: "registration", store: &store, state: None };
		let mut ctx = ServiceContext::default();
		let mut message = Message::new(
			MessageKind::RegistrationResponse,
			json!({
				"client_id": "new-client",
				"client_secret": "new-secret",
				"token_endpoint_auth_method": "client_secret_post",
				"registration_access_token": "rat",
			})
			.as_object()
			.cloned()
			.unwrap_or_default(),
		);

		update_registration(&mut message, &mut ctx, &env).expect("Update should succeed.");

		assert_eq!(ctx.client_id.as_deref(), Some("new-client"));
		assert_eq!(ctx.client_secret.as_deref(), Some("new-secret"));
		assert_eq!(ctx.behavior_str("token_endpoint_auth_method"), Some("client_secret_post"));
		assert!(!ctx.behavior.contains_key("registration_access_token"));
		assert!(ctx.registration_response.is_some_and(|r| r.contains_key("registration_access_token")));
	}
}
