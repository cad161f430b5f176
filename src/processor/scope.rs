//! Scope normalization.

// self
use crate::{
	_prelude::*,
	message::{Claims, Value, contains_token},
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv, str_arg},
};

const OPENID: &str = "openid";

/// Ensures `scope` carries the `openid` token.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddScope;
impl Processor for AddScope {
	fn name(&self) -> &'static str {
		"add_scope"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("scope", ParamType::SpaceSeparated)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["scope"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["scope"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, _: &ProcessorEnv<'_>) -> Result<()> {
		let scope = match str_arg(args, "scope") {
			None => OPENID.to_owned(),
			Some(scope) if scope.is_empty() => OPENID.to_owned(),
			Some(scope) if contains_token(scope, OPENID) => return Ok(()),
			Some(scope) => format!("{scope} {OPENID}"),
		};

		args.insert("scope".into(), Value::String(scope));

		Ok(())
	}
}
