//! Response-type defaults for authorization requests and the grant types registration implies.

// self
use crate::{
	_prelude::*,
	context::sort_tokens,
	message::{Claims, Value},
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv, Violation, ViolationKind},
};

const AUTHORIZATION_CODE: &str = "authorization_code";
const IMPLICIT: &str = "implicit";

/// Grant types implied by each canonical (token-sorted) response type.
pub const RESPONSE_TYPE_GRANTS: &[(&str, &[&str])] = &[
	("code", &[AUTHORIZATION_CODE]),
	("id_token", &[IMPLICIT]),
	("token", &[IMPLICIT]),
	("id_token token", &[IMPLICIT]),
	("code id_token", &[AUTHORIZATION_CODE, IMPLICIT]),
	("code token", &[AUTHORIZATION_CODE, IMPLICIT]),
	("code id_token token", &[AUTHORIZATION_CODE, IMPLICIT]),
	("none", &[]),
];

/// Derives `grant_types` from declared `response_types`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddOidcResponseTypes;
impl Processor for AddOidcResponseTypes {
	fn name(&self) -> &'static str {
		"add_oidc_response_types"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("response_types", ParamType::StringList)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["response_types"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["grant_types"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, _: &ProcessorEnv<'_>) -> Result<()> {
		let Some(Value::Array(declared)) = args.get("response_types") else {
			return Ok(());
		};
		let mut grants = BTreeSet::new();
		let mut violations = Vec::new();

		for response_type in declared.iter().filter_map(Value::as_str) {
			let canonical = sort_tokens(response_type);

			match RESPONSE_TYPE_GRANTS.iter().find(|(rt, _)| *rt == canonical) {
				Some((_, implied)) => grants.extend(implied.iter().copied()),
				None => violations.push(
					Violation::new("response_types", ViolationKind::ValueNotAllowed)
						.with_cause(format!("unrecognized response type `{response_type}`")),
				),
			}
		}

		if !violations.is_empty() {
			return Err(Error::Validation(violations.into()));
		}

		args.insert("grant_types".into(), Value::from(grants.into_iter().collect::<Vec<_>>()));

		Ok(())
	}
}

/// Defaults `response_type` from the negotiated behavior, else `code`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddResponseType;
impl Processor for AddResponseType {
	fn name(&self) -> &'static str {
		"add_response_type"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("response_type", ParamType::SpaceSeparated)];

		PARAMS
	}

	fn writes(&self) -> &'static [&'static str] {
		&["response_type"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if !args.contains_key("response_type") {
			let response_type = env.context.behavior_str("response_types").unwrap_or("code");

			args.insert("response_type".into(), Value::from(response_type));
		}

		Ok(())
	}
}
