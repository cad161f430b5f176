//! RFC 7636 proof key for code exchange.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	message::{Claims, Value},
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv, Violation, ViolationKind, str_arg},
	state::StateError,
};

const VERIFIER_LEN: usize = 64;
const S256: &str = "S256";

/// Adds `code_challenge`/`code_challenge_method` and stores the verifier on the state record.
///
/// Active only when `code_challenge_method` is negotiated (or preferred); `S256` is the only
/// supported method.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddCodeChallenge;
impl Processor for AddCodeChallenge {
	fn name(&self) -> &'static str {
		"add_code_challenge"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[
			ParamSpec::optional("state", ParamType::String),
			ParamSpec::optional("code_challenge", ParamType::String),
		];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["state", "code_challenge"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["code_challenge", "code_challenge_method"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		let ctx = env.context;
		let method = ctx.behavior_str("code_challenge_method").or_else(|| {
			match ctx.client_preferences.get("code_challenge_method")? {
				Value::String(s) => Some(s.as_str()),
				Value::Array(items) => items.first().and_then(Value::as_str),
				_ => None,
			}
		});
		let Some(method) = method else {
			return Ok(());
		};

		if args.contains_key("code_challenge") {
			return Ok(());
		}
		if method != S256 {
			return Err(Error::Validation(
				vec![
					Violation::new("code_challenge_method", ViolationKind::ValueNotAllowed)
						.with_cause(format!("unsupported method `{method}`")),
				]
				.into(),
			));
		}

		let Some(key) = env.state_key(args) else {
			return Err(Error::Validation(
				vec![
					Violation::new("state", ViolationKind::MissingRequiredValue)
						.with_cause("the code verifier is stored on the state record"),
				]
				.into(),
			));
		};
		let verifier = random_verifier();

		env.store.store_code_verifier(&key, &verifier)?;
		args.insert("code_challenge".into(), Value::String(code_challenge(&verifier)));
		args.insert("code_challenge_method".into(), Value::from(S256));

		Ok(())
	}
}

/// Adds the stored `code_verifier` to token requests when one exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddCodeVerifier;
impl Processor for AddCodeVerifier {
	fn name(&self) -> &'static str {
		"add_code_verifier"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("state", ParamType::String)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["state"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["code_verifier"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if str_arg(args, "code_verifier").is_some() {
			return Ok(());
		}

		let Some(key) = env.state_key(args) else {
			return Ok(());
		};

		match env.store.get_code_verifier(&key) {
			Ok(verifier) => {
				args.insert("code_verifier".into(), Value::String(verifier));

				Ok(())
			},
			Err(StateError::CodeVerifierNotFound { .. }) => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// S256 challenge for `verifier`.
pub fn code_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn random_verifier() -> String {
	rand::rng().sample_iter(Alphanumeric).take(VERIFIER_LEN).map(char::from).collect()
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

	#[test]
	fn challenge_matches_rfc_7636_vector() {
		assert_eq!(
			code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn verifier_round_trips_through_the_state_record() {
		let mut ctx = ServiceContext::default();

		ctx.behavior.insert("code_challenge_method".into(), json!("S256"));

		let store = MemoryStateStore::default();
		let key = store.create_state_record("https://op", None).expect("Record should be created.");
		let env = ProcessorEnv {
			context: &ctx,
			store: &store,
			state: Some(&key),
			service: "authorization",
			request_kind: Some(MessageKind::AuthorizationRequest),
		};
		let mut auth_args = Claims::new();

		AddCodeChallenge.process_verified_arguments(&mut auth_args, &env).expect("Challenge should be added.");

		let verifier = store.get_code_verifier(&key).expect("Verifier should be persisted.");

		assert_eq!(verifier.len(), VERIFIER_LEN);
		assert_eq!(auth_args.get("code_challenge"), Some(&json!(code_challenge(&verifier))));
		assert_eq!(auth_args.get("code_challenge_method"), Some(&json!("S256")));

		let mut token_args = Claims::new();

		AddCodeVerifier.process_verified_arguments(&mut token_args, &env).expect("Verifier should be added.");

		assert_eq!(token_args.get("code_verifier"), Some(&json!(verifier)));
	}

	#[test]
	fn challenge_is_inactive_without_configuration_and_rejects_plain() {
		fn env<'a>(ctx: &'a ServiceContext, store: &'a MemoryStateStore) -> ProcessorEnv<'a> {
			ProcessorEnv {
				context: ctx,
				store,
				state: None,
				service: "authorization",
				request_kind: Some(MessageKind::AuthorizationRequest),
			}
		}

		let store = MemoryStateStore::default();
		let mut ctx = ServiceContext::default();
		let mut args = Claims::new();

		AddCodeChallenge
			.process_verified_arguments(&mut args, &env(&ctx, &store))
			.expect("Inactive PKCE is a no-op.");

		assert!(args.is_empty());

		ctx.client_preferences.insert("code_challenge_method".into(), json!(["plain"]));

		let err = AddCodeChallenge
			.process_verified_arguments(&mut args, &env(&ctx, &store))
			.expect_err("Only S256 is supported.");

		assert!(matches!(
			err,
			Error::Validation(ref v) if v.contains("code_challenge_method", ViolationKind::ValueNotAllowed)
		));
	}
}
