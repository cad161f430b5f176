//! ID token validation shared by the authentication and token services.
//!
//! The collaborator behind [`ServiceContext::keys`] verifies the signature while decoding. This
//! module checks the claims the relying party owns: issuer, audience, expiry, and the nonce
//! bound to the exchange.

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	message::{Message, MessageKind, Value},
	service::HookEnv,
	state::{StateError, StateItem},
};

/// Claim under which a response carries its validated ID token claims.
pub const VERIFIED_ID_TOKEN: &str = "__verified_id_token";

/// Decodes and validates `raw` for the exchange named by `env.state`.
pub fn verify_id_token(raw: &str, ctx: &ServiceContext, env: &HookEnv<'_>) -> Result<Message> {
	let codec = ctx.keys.as_deref().ok_or(Error::MissingRequiredAttribute { attribute: "keys" })?;
	let mut token = Message::from_jwt(MessageKind::IdToken, raw, codec)?;

	token.verify()?;
	ctx.check_token_issuer(token.get_str("iss").unwrap_or_default())?;

	let client_id = ctx.require_client_id()?;
	let audience: Vec<&str> =
		token.get("aud").and_then(Value::as_array).into_iter().flatten().filter_map(Value::as_str).collect();

	if !audience.contains(&client_id) {
		return Err(Error::ContextMismatch {
			attribute: "aud",
			expected: client_id.to_owned(),
			found: audience.join(" "),
		});
	}

	let exp = token.get_i64("exp").unwrap_or_default();

	if exp <= OffsetDateTime::now_utc().unix_timestamp() {
		return Err(Error::ValueNotAllowed { parameter: "exp".into(), value: exp.to_string() });
	}

	if let Some(state) = env.state {
		check_nonce(&token, state, env)?;
	}

	Ok(token)
}

/// `post_parse` hook: validates a present `id_token` and attaches its claims.
pub fn attach_verified_id_token(message: &mut Message, ctx: &ServiceContext, env: &HookEnv<'_>) -> Result<()> {
	let Some(raw) = message.get_str("id_token").map(str::to_owned) else {
		return Ok(());
	};
	let token = verify_id_token(&raw, ctx, env)?;

	message.insert(VERIFIED_ID_TOKEN, Value::Object(token.into_claims()));

	Ok(())
}

/// Persists attached ID token claims in the [`StateItem::VerifiedIdToken`] slot.
pub fn store_verified_id_token(message: &Message, env: &HookEnv<'_>) -> Result<()> {
	if let (Some(state), Some(Value::Object(claims))) = (env.state, message.get(VERIFIED_ID_TOKEN)) {
		let token = Message::new(MessageKind::IdToken, claims.clone());

		env.store.store_item(&token, state, StateItem::VerifiedIdToken)?;
	}

	Ok(())
}

fn check_nonce(token: &Message, state: &str, env: &HookEnv<'_>) -> Result<()> {
	let found = token.get_str("nonce");
	let expected = match env.store.get_item(state, StateItem::AuthorizationRequest) {
		Ok(request) => request.get_str("nonce").map(str::to_owned),
		Err(StateError::ItemNotFound { .. }) => None,
		Err(e) => return Err(e.into()),
	};

	match (expected, found) {
		(Some(expected), found) if found != Some(expected.as_str()) => Err(Error::ContextMismatch {
			attribute: "nonce",
			expected,
			found: found.unwrap_or_default().to_owned(),
		}),
		(Some(_), _) => Ok(()),
		// No stored request: the nonce must still be bound to this exchange.
		(None, Some(nonce)) => match env.store.get_state_key_by_nonce(nonce) {
			Ok(bound) if bound == state => Ok(()),
			Ok(bound) => Err(Error::ContextMismatch { attribute: "nonce", expected: state.to_owned(), found: bound }),
			Err(e) => Err(e.into()),
		},
		(None, None) => Ok(()),
	}
}
