//! User-info requests, authorized with the exchange's access token.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	http::HttpMethod,
	message::{Message, MessageKind, SerializationType},
	processor::ProcessorId,
	service::{ClientAuthMethod, HookEnv, ServiceDescriptor, ServiceHooks},
	state::{StateError, StateItem},
};

/// User-info request. Signed (JWT) responses are accepted through the JSON fallback.
pub const USER_INFO: ServiceDescriptor = ServiceDescriptor {
	name: "user_info",
	endpoint_name: Some("userinfo_endpoint"),
	request_kind: Some(MessageKind::UserInfoRequest),
	response_kind: MessageKind::OpenIdSchema,
	http_method: HttpMethod::Get,
	auth_method: ClientAuthMethod::BearerHeader,
	negotiate_auth_method: false,
	serialization: SerializationType::UrlEncoded,
	deserialization: SerializationType::Json,
	state_item: Some(StateItem::UserInfo),
	default_args: &[],
	pre_constructors: &[ProcessorId::ExtendUserInfoRequestArguments],
	post_constructors: &[],
	hooks: ServiceHooks { post_parse: Some(check_subject), ..ServiceHooks::DEFAULT },
};

/// The user-info `sub` must equal the verified ID token's `sub` (OIDC Core §5.3.2).
fn check_subject(message: &mut Message, _: &ServiceContext, env: &HookEnv<'_>) -> Result<()> {
	let Some(state) = env.state else {
		return Ok(());
	};
	let token = match env.store.get_item(state, StateItem::VerifiedIdToken) {
		Ok(token) => token,
		Err(StateError::ItemNotFound { .. }) => return Ok(()),
		Err(e) => return Err(e.into()),
	};
	let expected = token.get_str("sub").unwrap_or_default();
	let found = message.get_str("sub").unwrap_or_default();

	if expected != found {
		return Err(Error::ContextMismatch {
			attribute: "sub",
			expected: expected.to_owned(),
			found: found.to_owned(),
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::state::{MemoryStateStore, StateStore};

	#[test]
	fn subject_must_match_the_verified_id_token() {
		let store = MemoryStateStore::default();
		let mut token = Message::empty(MessageKind::IdToken);

		store.create_state_record("https://op.example.com", Some("s")).expect("Record should be created.");

		let env = HookEnv { service: "user_info", store: &store, state: Some("s") };
		let mut info = Message::empty(MessageKind::OpenIdSchema);

		info.insert("sub", "mallory");
		check_subject(&mut info, &ServiceContext::default(), &env).expect("Without a token nothing is compared.");

		token.insert("sub", "alice");
		store.store_item(&token, "s", StateItem::VerifiedIdToken).expect("Token should be stored.");

		let err = check_subject(&mut info, &ServiceContext::default(), &env).expect_err("Subjects differ.");

		assert!(matches!(err, Error::ContextMismatch { attribute: "sub", .. }));

		info.insert("sub", "alice");
		check_subject(&mut info, &ServiceContext::default(), &env).expect("Subjects match.");
	}
}
