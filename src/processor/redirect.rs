//! Redirect URI selection from the configured callbacks.

// self
use crate::{
	_prelude::*,
	message::{Claims, Value},
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv, str_arg},
};

/// Selects `redirect_uri` from the context when absent.
///
/// With a callback map: `form_post` when `response_mode == "form_post"`, else `code` when
/// `response_type == "code"`, else `implicit`. Without one: the first registered redirect URI.
#[derive(Clone, Copy, Debug, Default)]
pub struct PickRedirectUri;
impl Processor for PickRedirectUri {
	fn name(&self) -> &'static str {
		"pick_redirect_uri"
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[
			ParamSpec::optional("redirect_uri", ParamType::String),
			ParamSpec::optional("response_mode", ParamType::String),
			ParamSpec::optional("response_type", ParamType::SpaceSeparated),
		];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["redirect_uri", "response_mode", "response_type"]
	}

	fn writes(&self) -> &'static [&'static str] {
		&["redirect_uri"]
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if args.contains_key("redirect_uri") {
			return Ok(());
		}

		let ctx = env.context;
		let picked = match ctx.callbacks.as_ref() {
			Some(callbacks) =>
				if str_arg(args, "response_mode") == Some("form_post") {
					callbacks.form_post.clone()
				} else if str_arg(args, "response_type") == Some("code") {
					callbacks.code.clone()
				} else {
					callbacks.implicit.clone()
				},
			None => ctx.redirect_uris.first().cloned(),
		};

		if let Some(uri) = picked {
			args.insert("redirect_uri".into(), Value::String(uri));
		}

		Ok(())
	}
}
