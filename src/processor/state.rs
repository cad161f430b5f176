//! Correlation processors: state allocation, nonce generation, and persisting the sent request
//! under its state key.

// self
use crate::{
	_prelude::*,
	message::{Claims, Message, Value, contains_token},
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv, str_arg},
	state::{StateError, StateItem, random_token},
};

/// Guarantees a `state` argument backed by a record in the store.
///
/// A caller-supplied key is reused (and a record created under it when missing); otherwise a
/// fresh record is allocated. Either way the record is bound to the context issuer.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddState;
impl Processor for AddState {
	fn name(&self) -> &'static str {
		"add_state"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("state", ParamType::String)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["state"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["state"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		let issuer = env.context.require_issuer()?;
		let key = match env.state_key(args) {
			Some(key) => {
				match env.store.get_issuer(&key) {
					Ok(_) => {},
					Err(StateError::StateNotFound { .. }) => {
						env.store.create_state_record(issuer, Some(&key))?;
					},
					Err(e) => return Err(e.into()),
				}

				key
			},
			None => env.store.create_state_record(issuer, None)?,
		};

		args.insert("state".into(), Value::String(key));

		Ok(())
	}
}

/// Generates a `nonce` when the response type yields an ID token.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddNonce;
impl Processor for AddNonce {
	fn name(&self) -> &'static str {
		"add_nonce"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[
			ParamSpec::optional("response_type", ParamType::SpaceSeparated),
			ParamSpec::optional("nonce", ParamType::String),
		];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["response_type", "nonce"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["nonce"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, _: &ProcessorEnv<'_>) -> Result<()> {
		let wants_id_token =
			str_arg(args, "response_type").is_some_and(|rt| contains_token(rt, "id_token"));

		if wants_id_token && !args.contains_key("nonce") {
			args.insert("nonce".into(), Value::String(random_token()));
		}

		Ok(())
	}
}

/// Persists the constructed request under its `state` key.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreAuthenticationRequest;
impl Processor for StoreAuthenticationRequest {
	fn name(&self) -> &'static str {
		"store_authentication_request"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::required("state", ParamType::String)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["state"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		let Some(key) = str_arg(args, "state") else {
			return Ok(());
		};
		let Some(kind) = env.request_kind else {
			return Err(Error::Misuse { service: env.service, reason: "no request message to store" });
		};
		let request = Message::new(kind, args.clone());

		env.store.store_item(&request, key, StateItem::AuthorizationRequest)?;

		Ok(())
	}
}

/// Binds the request `nonce` to its `state` key.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreNonce;
impl Processor for StoreNonce {
	fn name(&self) -> &'static str {
		"store_nonce"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[
			ParamSpec::required("state", ParamType::String),
			ParamSpec::optional("nonce", ParamType::String),
		];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["state", "nonce"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if let (Some(key), Some(nonce)) = (str_arg(args, "state"), str_arg(args, "nonce")) {
			env.store.store_state_key_for_nonce(nonce, key)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		context::ServiceContext,
		message::MessageKind,
		state::{MemoryStateStore, StateStore},
	};

	fn env<'a>(
		ctx: &'a ServiceContext,
		store: &'a MemoryStateStore,
		state: Option<&'a str>,
	) -> ProcessorEnv<'a> {
		ProcessorEnv {
			context: ctx,
			store,
			state,
			service: "authorization",
			request_kind: Some(MessageKind::AuthenticationRequest),
		}
	}

	fn issuer_context() -> ServiceContext {
		ServiceContext { issuer: Some("https://op.example.com".into()), ..Default::default() }
	}

	#[test]
	fn add_state_creates_a_bound_record() {
		let ctx = issuer_context();
		let store = MemoryStateStore::default();
		let mut args = Claims::new();

		AddState.process_verified_arguments(&mut args, &env(&ctx, &store, None)).expect("AddState should succeed.");

		let key = args.get("state").and_then(Value::as_str).expect("A state key should be set.");

		assert_eq!(store.get_issuer(key).as_deref(), Ok("https://op.example.com"));
	}

	#[test]
	fn add_state_reuses_supplied_keys() {
		let ctx = issuer_context();
		let store = MemoryStateStore::default();
		let mut args = Claims::new();

		args.insert("state".into(), json!("caller-key"));
		AddState.process_verified_arguments(&mut args, &env(&ctx, &store, None)).expect("AddState should succeed.");

		assert_eq!(args.get("state"), Some(&json!("caller-key")));
		assert_eq!(store.len(), 1);

		let mut args = Claims::new();

		AddState
			.process_verified_arguments(&mut args, &env(&ctx, &store, Some("caller-key")))
			.expect("Existing records are reused.");

		assert_eq!(args.get("state"), Some(&json!("caller-key")));
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn add_state_requires_an_issuer() {
		let ctx = ServiceContext::default();
		let store = MemoryStateStore::default();
		let err = AddState
			.process_verified_arguments(&mut Claims::new(), &env(&ctx, &store, None))
			.expect_err("Records must be bound to an issuer.");

		assert!(matches!(err, Error::MissingRequiredAttribute { attribute: "issuer" }));
	}

	#[test]
	fn nonce_follows_id_token_response_types() {
		let ctx = ServiceContext::default();
		let store = MemoryStateStore::default();
		let env = env(&ctx, &store, None);
		let mut code = Claims::new();

		code.insert("response_type".into(), json!("code"));
		AddNonce.process_verified_arguments(&mut code, &env).expect("AddNonce never fails.");

		assert!(!code.contains_key("nonce"));

		let mut hybrid = Claims::new();

		hybrid.insert("response_type".into(), json!("code id_token"));
		AddNonce.process_verified_arguments(&mut hybrid, &env).expect("AddNonce never fails.");

		assert!(hybrid.get("nonce").and_then(Value::as_str).is_some_and(|n| n.len() == 43));

		let mut preset = Claims::new();

		preset.insert("response_type".into(), json!("id_token"));
		preset.insert("nonce".into(), json!("fixed"));
		AddNonce.process_verified_arguments(&mut preset, &env).expect("AddNonce never fails.");

		assert_eq!(preset.get("nonce"), Some(&json!("fixed")));
	}

	#[test]
	fn store_processors_persist_request_and_nonce() {
		let ctx = issuer_context();
		let store = MemoryStateStore::default();
		let key = store
			.create_state_record("https://op.example.com", Some("s-1"))
			.expect("Record should be created.");
		let env = env(&ctx, &store, None);
		let mut args = Claims::new();

		args.insert("state".into(), json!(key));
		args.insert("nonce".into(), json!("n-1"));
		args.insert("scope".into(), json!("openid"));
		StoreAuthenticationRequest.process_verified_arguments(&mut args, &env).expect("Request should be stored.");
		StoreNonce.process_verified_arguments(&mut args, &env).expect("Nonce should be bound.");

		let stored = store
			.get_item("s-1", StateItem::AuthorizationRequest)
			.expect("Stored request should be readable.");

		assert_eq!(stored.kind(), MessageKind::AuthenticationRequest);
		assert_eq!(stored.get_str("scope"), Some("openid"));
		assert_eq!(store.get_state_key_by_nonce("n-1").as_deref(), Ok("s-1"));
	}
}
