//! Fills request arguments from responses stored earlier in the same exchange.

// self
use crate::{
	_prelude::*,
	message::Claims,
	processor::{ParamSpec, ParamType, Processor, ProcessorEnv, Violation, ViolationKind},
	state::StateItem,
};

/// Pulls arguments out of earlier messages stored under the call's state key.
///
/// Slots are visited in `sources` order and later slots overwrite earlier ones; the merged
/// values are only added for keys the caller did not supply.
#[derive(Clone, Copy, Debug)]
pub struct ExtendRequestArguments {
	name: &'static str,
	keys: &'static [&'static str],
	sources: &'static [StateItem],
}
impl ExtendRequestArguments {
	/// Authorization-code exchange: `code` and `redirect_uri` from the authorization round trip.
	pub const ACCESS_TOKEN: Self = Self {
		name: "extend_access_token_request_arguments",
		keys: &["code", "redirect_uri"],
		sources: &[StateItem::AuthorizationRequest, StateItem::AuthorizationResponse],
	};
	/// Refresh: the newest `refresh_token`.
	pub const REFRESH: Self = Self {
		name: "extend_refresh_request_arguments",
		keys: &["refresh_token"],
		sources: &[StateItem::TokenResponse, StateItem::RefreshTokenResponse],
	};
	/// User-info: the newest `access_token`.
	pub const USER_INFO: Self = Self {
		name: "extend_user_info_request_arguments",
		keys: &["access_token"],
		sources: &[
			StateItem::AuthorizationResponse,
			StateItem::TokenResponse,
			StateItem::RefreshTokenResponse,
		],
	};

	/// Creates a custom extension processor.
	pub const fn new(
		name: &'static str,
		keys: &'static [&'static str],
		sources: &'static [StateItem],
	) -> Self {
		Self { name, keys, sources }
	}
}
impl Processor for ExtendRequestArguments {
	fn name(&self) -> &'static str {
		self.name
	}

	fn params(&self) -> &'static [ParamSpec] {
		const PARAMS: &[ParamSpec] = &[ParamSpec::optional("state", ParamType::String)];

		PARAMS
	}

	fn reads(&self) -> &'static [&'static str] {
		&["state"]
	}

	fn writes(&self) -> &'static [&'static str] {
		self.keys
	}

	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		if self.keys.iter().all(|key| args.contains_key(*key)) {
			return Ok(());
		}

		let Some(key) = env.state_key(args) else {
			return Err(Error::Validation(
				vec![
					Violation::new("state", ViolationKind::MissingRequiredValue)
						.with_cause("a state key is needed to look up earlier responses"),
				]
				.into(),
			));
		};
		let mut found = Claims::new();

		env.store.multiple_extend_request_args(&mut found, &key, self.sources, self.keys)?;

		for (name, value) in found {
			args.entry(name).or_insert(value);
		}

		Ok(())
	}
}
