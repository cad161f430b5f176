//! Client identity and registration metadata processors.

// self
use crate::{
	_prelude::*,
	message::{Claims, Value},
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv},
};

/// Injects `client_id` from the context when absent.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddClientId;
impl Processor for AddClientId {
	fn name(&self) -> &'static str {
		"add_client_id"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("client_id", ParamType::String)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["client_id"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["client_id"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if let Some(client_id) = env.context.client_id.as_deref() {
			args.entry("client_id").or_insert_with(|| Value::from(client_id));
		}

		Ok(())
	}
}

/// Client metadata a registration request may carry.
pub const REGISTRATION_METADATA: &[&str] = &[
	"redirect_uris",
	"response_types",
	"grant_types",
	"application_type",
	"contacts",
	"client_name",
	"logo_uri",
	"client_uri",
	"policy_uri",
	"tos_uri",
	"jwks_uri",
	"jwks",
	"sector_identifier_uri",
	"subject_type",
	"id_token_signed_response_alg",
	"userinfo_signed_response_alg",
	"request_object_signing_alg",
	"token_endpoint_auth_method",
	"token_endpoint_auth_signing_alg",
	"default_max_age",
	"require_auth_time",
	"default_acr_values",
	"initiate_login_uri",
	"request_uris",
	"post_logout_redirect_uris",
];

/// Copies client preferences that are registration metadata into the arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddClientBehaviourPreference;
impl Processor for AddClientBehaviourPreference {
	fn name(&self) -> &'static str {
		"add_client_behaviour_preference"
	}

	fn writes(&self) -> &'static [&'static str] {
		REGISTRATION_METADATA
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		for (name, value) in &env.context.client_preferences {
			if REGISTRATION_METADATA.contains(&name.as_str()) && !args.contains_key(name) {
				args.insert(name.clone(), value.clone());
			}
		}

		Ok(())
	}
}

/// Fills `redirect_uris` from the configured redirect URIs and callbacks.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddRedirectUris;
impl Processor for AddRedirectUris {
	fn name(&self) -> &'static str {
		"add_redirect_uris"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("redirect_uris", ParamType::StringList)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["redirect_uris"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["redirect_uris"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if args.contains_key("redirect_uris") {
			return Ok(());
		}

		let ctx = env.context;
		let mut uris: Vec<String> = ctx.redirect_uris.clone();

		if let Some(callbacks) = ctx.callbacks.as_ref() {
			for uri in [&callbacks.code, &callbacks.implicit, &callbacks.form_post].into_iter().flatten() {
				if !uris.contains(uri) {
					uris.push(uri.clone());
				}
			}
		}

		if !uris.is_empty() {
			args.insert("redirect_uris".into(), Value::from(uris));
		}

		Ok(())
	}
}
