//! Ordered request-argument processors applied before and after request construction.
//!
//! Every processor declares the parameters it inspects. [`ProcessorChain::run`] checks and
//! coerces those declarations for each processor in turn and reports every violation of the
//! whole chain in one [`Error::Validation`]. Processor logic runs only while no violation has
//! been recorded, so a failing chain never touches the state store past its first violation. Non-validation failures (state store, missing context attributes)
//! abort the chain immediately.

pub mod client;
pub mod extend;
pub mod pkce;
pub mod redirect;
pub mod response_types;
pub mod scope;
pub mod state;

pub use client::*;
pub use extend::*;
pub use pkce::*;
pub use redirect::*;
pub use response_types::*;
pub use scope::*;
pub use state::*;

pub use crate::message::{ParamSpec, ParamType, ValidationErrors, Violation, ViolationKind};

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	message::{Claims, MessageKind},
	state::StateStore,
};

/// Read-only environment handed to processor logic.
#[derive(Clone, Copy)]
pub struct ProcessorEnv<'a> {
	/// Client context.
	pub context: &'a ServiceContext,
	/// Caller-owned correlation store.
	pub store: &'a dyn StateStore,
	/// State key supplied by the caller, if any.
	pub state: Option<&'a str>,
	/// Name of the service running the chain.
	pub service: &'static str,
	/// Request shape the service constructs; `None` for services that send no message.
	pub request_kind: Option<MessageKind>,
}
impl ProcessorEnv<'_> {
	/// State key for this call: the caller-supplied key, else the `state` argument.
	pub fn state_key(&self, args: &Claims) -> Option<String> {
		self.state
			.map(str::to_owned)
			.or_else(|| args.get("state").and_then(|v| v.as_str()).map(str::to_owned))
			.filter(|key| !key.is_empty())
	}
}
impl Debug for ProcessorEnv<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProcessorEnv")
			.field("service", &self.service)
			.field("request_kind", &self.request_kind)
			.field("state", &self.state)
			.finish_non_exhaustive()
	}
}

/// A composable validation and mutation unit.
pub trait Processor
where
	Self: Send + Sync,
{
	/// Stable name used in logs and ordering reports.
	fn name(&self) -> &'static str;

	/// Parameters checked (and coerced) before [`Processor::process_verified_arguments`] runs.
	fn params(&self) -> &'static [ParamSpec] {
		&[]
	}

	/// Argument names the processor logic reads.
	fn reads(&self) -> &'static [&'static str] {
		&[]
	}

	/// Argument names the processor logic may write.
	fn writes(&self) -> &'static [&'static str] {
		&[]
	}

	/// Transforms the argument map once its declared parameters are valid.
	///
	/// Returning [`Error::Validation`] merges the violations into the chain aggregate; any other
	/// error aborts the chain.
	fn process_verified_arguments(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()>;
}

/// A reader scheduled before a writer of the same argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderingConflict {
	/// Earlier processor that reads the argument.
	pub reader: &'static str,
	/// Later processor that writes it.
	pub writer: &'static str,
	/// Contested argument.
	pub parameter: &'static str,
}

/// Ordered list of processors.
#[derive(Clone, Default)]
pub struct ProcessorChain(Vec<Arc<dyn Processor>>);
impl ProcessorChain {
	/// Creates a chain from built-in processor identifiers.
	pub fn from_ids(ids: &[ProcessorId]) -> Self {
		Self(ids.iter().map(|id| id.build()).collect())
	}

	/// Appends a processor.
	pub fn push(&mut self, processor: Arc<dyn Processor>) {
		self.0.push(processor);
	}

	/// Returns `true` when the chain has no processor.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Processor names in execution order.
	pub fn names(&self) -> Vec<&'static str> {
		self.0.iter().map(|p| p.name()).collect()
	}

	/// Runs every processor against `args`, aggregating validation failures.
	///
	/// Declared parameters are checked for every processor; logic stops running once the
	/// aggregate is non-empty.
	pub fn run(&self, args: &mut Claims, env: &ProcessorEnv<'_>) -> Result<()> {
		let mut violations = ValidationErrors::default();

		for processor in &self.0 {
			let mut own = Vec::new();

			for spec in processor.params() {
				spec.check(args, &mut own);
			}

			if !own.is_empty() {
				violations.extend(own);
			} else if violations.is_empty() {
				match processor.process_verified_arguments(args, env) {
					Ok(()) => {},
					Err(Error::Validation(extra)) => violations.extend(extra.0),
					Err(e) => return Err(e),
				}
			}
		}

		violations.into_result().map_err(Error::from)
	}

	/// Reports every argument read by a processor that a later processor writes.
	pub fn ordering_conflicts(&self) -> Vec<OrderingConflict> {
		let mut conflicts = Vec::new();

		for (i, reader) in self.0.iter().enumerate() {
			for writer in &self.0[i + 1..] {
				for parameter in reader.reads() {
					if writer.writes().contains(parameter) {
						conflicts.push(OrderingConflict {
							reader: reader.name(),
							writer: writer.name(),
							parameter,
						});
					}
				}
			}
		}

		conflicts
	}
}
impl Debug for ProcessorChain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_list().entries(self.names()).finish()
	}
}
impl FromIterator<Arc<dyn Processor>> for ProcessorChain {
	fn from_iter<T: IntoIterator<Item = Arc<dyn Processor>>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Built-in processors, addressable by name from [`crate::service::ServiceConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorId {
	/// [`AddClientId`].
	AddClientId,
	/// [`AddScope`].
	AddScope,
	/// [`AddNonce`].
	AddNonce,
	/// [`AddState`].
	AddState,
	/// [`PickRedirectUri`].
	PickRedirectUri,
	/// [`AddResponseType`].
	AddResponseType,
	/// [`AddOidcResponseTypes`].
	AddOidcResponseTypes,
	/// [`AddRedirectUris`].
	AddRedirectUris,
	/// [`AddClientBehaviourPreference`].
	AddClientBehaviourPreference,
	/// [`ExtendRequestArguments::ACCESS_TOKEN`].
	ExtendAccessTokenRequestArguments,
	/// [`ExtendRequestArguments::REFRESH`].
	ExtendRefreshRequestArguments,
	/// [`ExtendRequestArguments::USER_INFO`].
	ExtendUserInfoRequestArguments,
	/// [`AddCodeChallenge`].
	AddCodeChallenge,
	/// [`AddCodeVerifier`].
	AddCodeVerifier,
	/// [`StoreAuthenticationRequest`].
	StoreAuthenticationRequest,
	/// [`StoreNonce`].
	StoreNonce,
}
impl ProcessorId {
	/// Instantiates the processor.
	pub fn build(self) -> Arc<dyn Processor> {
		match self {
			ProcessorId::AddClientId => Arc::new(AddClientId),
			ProcessorId::AddScope => Arc::new(AddScope),
			ProcessorId::AddNonce => Arc::new(AddNonce),
			ProcessorId::AddState => Arc::new(AddState),
			ProcessorId::PickRedirectUri => Arc::new(PickRedirectUri),
			ProcessorId::AddResponseType => Arc::new(AddResponseType),
			ProcessorId::AddOidcResponseTypes => Arc::new(AddOidcResponseTypes),
			ProcessorId::AddRedirectUris => Arc::new(AddRedirectUris),
			ProcessorId::AddClientBehaviourPreference => Arc::new(AddClientBehaviourPreference),
			ProcessorId::ExtendAccessTokenRequestArguments =>
				Arc::new(ExtendRequestArguments::ACCESS_TOKEN),
			ProcessorId::ExtendRefreshRequestArguments => Arc::new(ExtendRequestArguments::REFRESH),
			ProcessorId::ExtendUserInfoRequestArguments => Arc::new(ExtendRequestArguments::USER_INFO),
			ProcessorId::AddCodeChallenge => Arc::new(AddCodeChallenge),
			ProcessorId::AddCodeVerifier => Arc::new(AddCodeVerifier),
			ProcessorId::StoreAuthenticationRequest => Arc::new(StoreAuthenticationRequest),
			ProcessorId::StoreNonce => Arc::new(StoreNonce),
		}
	}
}

pub(crate) fn str_arg<'a>(args: &'a Claims, name: &str) -> Option<&'a str> {
	args.get(name).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::state::MemoryStateStore;

	struct Requires(&'static str, &'static [ParamSpec]);
	impl Processor for Requires {
		fn name(&self) -> &'static str {
			self.0
		}

		fn params(&self) -> &'static [ParamSpec] {
			self.1
		}

		fn process_verified_arguments(&self, args: &mut Claims, _: &ProcessorEnv<'_>) -> Result<()> {
			args.insert(format!("{}_ran", self.0), true.into());

			Ok(())
		}
	}

	fn env<'a>(ctx: &'a ServiceContext, store: &'a MemoryStateStore) -> ProcessorEnv<'a> {
		ProcessorEnv {
			context: ctx,
			store,
			state: None,
			service: "test",
			request_kind: Some(MessageKind::AuthorizationRequest),
		}
	}

	#[test]
	fn logic_stops_after_the_first_violation() {
		const NEEDS_CODE: &[ParamSpec] = &[ParamSpec::required("code", ParamType::String)];
		const NEEDS_AGE: &[ParamSpec] = &[ParamSpec::optional("max_age", ParamType::Integer)];
		const NEEDS_HINT: &[ParamSpec] = &[ParamSpec::required("login_hint", ParamType::String)];

		let ctx = ServiceContext::default();
		let store = MemoryStateStore::default();
		let chain: ProcessorChain = [
			Arc::new(Requires("code", NEEDS_CODE)) as Arc<dyn Processor>,
			Arc::new(Requires("age", NEEDS_AGE)) as Arc<dyn Processor>,
			Arc::new(Requires("hint", NEEDS_HINT)) as Arc<dyn Processor>,
		]
		.into_iter()
		.collect();
		let mut args = Claims::new();

		args.insert("max_age".into(), "60".into());

		let err = chain.run(&mut args, &env(&ctx, &store)).expect_err("`code` is missing.");

		assert!(matches!(
			err,
			Error::Validation(ref v) if v.len() == 2
				&& v.contains("code", ViolationKind::MissingRequiredValue)
				&& v.contains("login_hint", ViolationKind::MissingRequiredValue)
		));
		assert!(!args.contains_key("code_ran"));
		assert!(!args.contains_key("age_ran"));
		assert_eq!(args.get("max_age"), Some(&60.into()));
	}

	#[test]
	fn logic_runs_when_every_declaration_passes() {
		const NEEDS_AGE: &[ParamSpec] = &[ParamSpec::optional("max_age", ParamType::Integer)];

		let ctx = ServiceContext::default();
		let store = MemoryStateStore::default();
		let chain: ProcessorChain =
			[Arc::new(Requires("age", NEEDS_AGE)) as Arc<dyn Processor>].into_iter().collect();
		let mut args = Claims::new();

		chain.run(&mut args, &env(&ctx, &store)).expect("No parameter is required.");

		assert_eq!(args.get("age_ran"), Some(&true.into()));
	}

	#[test]
	fn chain_reports_reader_before_writer() {
		let chain = ProcessorChain::from_ids(&[ProcessorId::AddNonce, ProcessorId::AddResponseType]);
		let conflicts = chain.ordering_conflicts();

		assert_eq!(
			conflicts,
			vec![OrderingConflict {
				reader: "add_nonce",
				writer: "add_response_type",
				parameter: "response_type"
			}]
		);
		assert_eq!(chain.names(), vec!["add_nonce", "add_response_type"]);
	}

	#[test]
	fn processor_ids_use_snake_case_names() {
		let ids: Vec<ProcessorId> =
			serde_json::from_str(r#"["add_client_id","extend_user_info_request_arguments"]"#)
				.expect("Processor names should deserialize.");

		assert_eq!(
			ids,
			vec![ProcessorId::AddClientId, ProcessorId::ExtendUserInfoRequestArguments]
		);
	}
}
