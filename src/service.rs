//! The request/response pipeline shared by every relying-party operation.
//!
//! A [`Service`] is one generic engine parameterized by a [`ServiceDescriptor`] (request and
//! response shapes, endpoint name, defaults, processor lists, hooks) and an optional
//! [`ServiceConfig`] override. Operation variants such as OAuth 2.0 vs OpenID Connect token
//! exchange are distinct descriptors over the same engine.
//!
//! `build_request` runs: static arguments, endpoint resolution, pre-constructors, request
//! construction and verification, post-constructors, client authentication, serialization.
//! `consume_response` runs: deserialization (with a single JWT fallback for JSON), error
//! response detection, verification, `post_parse`, the exact response-type check, and
//! `update_context` followed by the state-store write for stateful services.

pub mod auth;
pub mod authorization;
pub mod discovery;
pub mod id_token;
pub mod registration;
pub mod token;
pub mod userinfo;
pub mod webfinger;

pub use auth::*;

// self
use crate::{
	_prelude::*,
	context::ServiceContext,
	http::{HttpArguments, HttpHeaders, HttpMethod},
	message::{Claims, ErrorResponse, Message, MessageKind, SerializationType, Value},
	obs::{self, ServiceOutcome, ServiceSpan, ServiceStage},
	processor::{ProcessorChain, ProcessorEnv, ProcessorId},
	state::{StateItem, StateStore},
};

/// Built-in operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
	/// OpenID provider configuration discovery.
	ProviderInfoDiscovery,
	/// RFC 8414 authorization server metadata discovery.
	ServerMetadataDiscovery,
	/// Issuer discovery via webfinger.
	WebFinger,
	/// OAuth 2.0 authorization request and response.
	Authorization,
	/// OpenID Connect authentication request and response.
	Authentication,
	/// OAuth 2.0 authorization-code exchange.
	AccessToken,
	/// OpenID Connect authorization-code exchange (validates the ID token).
	OidcAccessToken,
	/// Refresh-token exchange.
	RefreshAccessToken,
	/// User-info request.
	UserInfo,
	/// Dynamic client registration.
	Registration,
}
impl ServiceKind {
	/// Every built-in operation.
	pub const ALL: [ServiceKind; 10] = [
		ServiceKind::ProviderInfoDiscovery,
		ServiceKind::ServerMetadataDiscovery,
		ServiceKind::WebFinger,
		ServiceKind::Authorization,
		ServiceKind::Authentication,
		ServiceKind::AccessToken,
		ServiceKind::OidcAccessToken,
		ServiceKind::RefreshAccessToken,
		ServiceKind::UserInfo,
		ServiceKind::Registration,
	];

	/// Descriptor for this operation.
	pub const fn descriptor(self) -> ServiceDescriptor {
		match self {
			ServiceKind::ProviderInfoDiscovery => discovery::PROVIDER_INFO,
			ServiceKind::ServerMetadataDiscovery => discovery::SERVER_METADATA,
			ServiceKind::WebFinger => webfinger::WEBFINGER,
			ServiceKind::Authorization => authorization::AUTHORIZATION,
			ServiceKind::Authentication => authorization::AUTHENTICATION,
			ServiceKind::AccessToken => token::ACCESS_TOKEN,
			ServiceKind::OidcAccessToken => token::OIDC_ACCESS_TOKEN,
			ServiceKind::RefreshAccessToken => token::REFRESH_ACCESS_TOKEN,
			ServiceKind::UserInfo => userinfo::USER_INFO,
			ServiceKind::Registration => registration::REGISTRATION,
		}
	}

	/// Returns the service name.
	pub const fn as_str(self) -> &'static str {
		self.descriptor().name
	}
}
impl Display for ServiceKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Environment handed to response hooks.
#[derive(Clone, Copy)]
pub struct HookEnv<'a> {
	/// Service name.
	pub service: &'static str,
	/// Caller-owned correlation store.
	pub store: &'a dyn StateStore,
	/// State key of the exchange (stateful services only).
	pub state: Option<&'a str>,
}
impl Debug for HookEnv<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HookEnv")
			.field("service", &self.service)
			.field("state", &self.state)
			.finish_non_exhaustive()
	}
}

/// Environment handed to the request finalization hook.
#[derive(Clone, Copy, Debug)]
pub struct FinalizeEnv<'a> {
	/// Client context.
	pub context: &'a ServiceContext,
	/// Resolved client authentication method.
	pub method: ClientAuthMethod,
	/// Endpoint the request targets (the assertion audience).
	pub audience: &'a Url,
	/// Configured signing algorithm override.
	pub signing_alg: Option<&'a str>,
}

/// Derives the endpoint (and may rewrite arguments) when no explicit endpoint is configured.
pub type EndpointHook = fn(&ServiceContext, &mut Claims) -> Result<Url>;
/// Adjusts the freshly constructed request message.
pub type ConstructHook = fn(&mut Message, &ServiceContext) -> Result<()>;
/// Adds authentication material to the request.
pub type FinalizeHook = fn(&mut Message, &mut HttpHeaders, &FinalizeEnv<'_>) -> Result<()>;
/// Pure transformation of a verified response.
pub type PostParseHook = fn(&mut Message, &ServiceContext, &HookEnv<'_>) -> Result<()>;
/// Applies a verified response to the context.
pub type UpdateContextHook = fn(&mut Message, &mut ServiceContext, &HookEnv<'_>) -> Result<()>;

/// Named extension points of the pipeline.
#[derive(Clone, Copy)]
pub struct ServiceHooks {
	/// Endpoint derivation (discovery, webfinger).
	pub endpoint: Option<EndpointHook>,
	/// Post-construction request adjustment.
	pub construct_request: Option<ConstructHook>,
	/// Request finalization; client authentication by default.
	pub finalize: FinalizeHook,
	/// Response transformation after verification.
	pub post_parse: Option<PostParseHook>,
	/// Context mutation after the response-type check.
	pub update_context: Option<UpdateContextHook>,
}
impl ServiceHooks {
	/// No custom hooks; finalization applies client authentication.
	pub const DEFAULT: Self = Self {
		endpoint: None,
		construct_request: None,
		finalize: auth::finalize_client_auth,
		post_parse: None,
		update_context: None,
	};
}
impl Default for ServiceHooks {
	fn default() -> Self {
		Self::DEFAULT
	}
}
impl Debug for ServiceHooks {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceHooks")
			.field("endpoint", &self.endpoint.is_some())
			.field("construct_request", &self.construct_request.is_some())
			.field("post_parse", &self.post_parse.is_some())
			.field("update_context", &self.update_context.is_some())
			.finish_non_exhaustive()
	}
}

/// Static description of one operation.
#[derive(Clone, Copy, Debug)]
pub struct ServiceDescriptor {
	/// Stable service name used in spans, metrics, and errors.
	pub name: &'static str,
	/// Provider-metadata key of the endpoint (e.g., `token_endpoint`).
	pub endpoint_name: Option<&'static str>,
	/// Request shape; `None` when the request carries no message.
	pub request_kind: Option<MessageKind>,
	/// Expected response shape.
	pub response_kind: MessageKind,
	/// Default HTTP method.
	pub http_method: HttpMethod,
	/// Default client authentication method.
	pub auth_method: ClientAuthMethod,
	/// Use the negotiated `token_endpoint_auth_method` before the default.
	pub negotiate_auth_method: bool,
	/// Request body format for POST.
	pub serialization: SerializationType,
	/// Response body format.
	pub deserialization: SerializationType,
	/// Slot the response is persisted in; `Some` marks the service stateful.
	pub state_item: Option<StateItem>,
	/// Arguments added when absent (e.g., `grant_type`).
	pub default_args: &'static [(&'static str, &'static str)],
	/// Default pre-constructors.
	pub pre_constructors: &'static [ProcessorId],
	/// Default post-constructors.
	pub post_constructors: &'static [ProcessorId],
	/// Extension points.
	pub hooks: ServiceHooks,
}
impl ServiceDescriptor {
	/// Returns `true` when responses are correlated through the state store.
	pub const fn is_stateful(&self) -> bool {
		self.state_item.is_some()
	}
}

/// Serde-friendly per-service overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
	/// Explicit endpoint; wins over discovered metadata.
	pub endpoint: Option<String>,
	/// Client authentication override.
	pub auth_method: Option<ClientAuthMethod>,
	/// HTTP method override.
	pub http_method: Option<HttpMethod>,
	/// Request serialization override.
	pub serialization: Option<SerializationType>,
	/// Response deserialization override.
	pub deserialization: Option<SerializationType>,
	/// Replacement pre-constructor list.
	pub pre_constructors: Option<Vec<ProcessorId>>,
	/// Replacement post-constructor list.
	pub post_constructors: Option<Vec<ProcessorId>>,
	/// Static arguments merged into every request (caller arguments win).
	pub request_args: Claims,
	/// Signing algorithm for client assertions and JWT request bodies.
	pub signing_alg: Option<String>,
}

/// One configured operation bound to a caller-owned state store.
///
/// A service keeps no per-call scratch state; every call works on its own argument map and
/// message, so an abandoned call never affects the next one.
#[derive(Clone)]
pub struct Service {
	descriptor: ServiceDescriptor,
	config: ServiceConfig,
	store: Arc<dyn StateStore>,
	pre: ProcessorChain,
	post: ProcessorChain,
}
impl Service {
	/// Creates a built-in service with default configuration.
	pub fn new(kind: ServiceKind, store: Arc<dyn StateStore>) -> Self {
		Self::from_descriptor(kind.descriptor(), ServiceConfig::default(), store)
	}

	/// Creates a built-in service with overrides.
	pub fn with_config(kind: ServiceKind, config: ServiceConfig, store: Arc<dyn StateStore>) -> Self {
		Self::from_descriptor(kind.descriptor(), config, store)
	}

	/// Creates a service from a custom descriptor.
	pub fn from_descriptor(
		descriptor: ServiceDescriptor,
		config: ServiceConfig,
		store: Arc<dyn StateStore>,
	) -> Self {
		let pre = ProcessorChain::from_ids(
			config.pre_constructors.as_deref().unwrap_or(descriptor.pre_constructors),
		);
		let post = ProcessorChain::from_ids(
			config.post_constructors.as_deref().unwrap_or(descriptor.post_constructors),
		);

		Self { descriptor, config, store, pre, post }
	}

	/// Service name.
	pub fn name(&self) -> &'static str {
		self.descriptor.name
	}

	/// Operation descriptor.
	pub fn descriptor(&self) -> &ServiceDescriptor {
		&self.descriptor
	}

	/// Active overrides.
	pub fn config(&self) -> &ServiceConfig {
		&self.config
	}

	/// Caller-owned state store.
	pub fn store(&self) -> &Arc<dyn StateStore> {
		&self.store
	}

	/// Pre-constructor chain, for appending custom processors.
	pub fn pre_constructors_mut(&mut self) -> &mut ProcessorChain {
		&mut self.pre
	}

	/// Post-constructor chain, for appending custom processors.
	pub fn post_constructors_mut(&mut self) -> &mut ProcessorChain {
		&mut self.post
	}

	/// Builds the HTTP request for this operation.
	///
	/// `state` names the exchange for processors that read or write correlation state; when
	/// absent they fall back to the `state` argument.
	pub fn build_request(
		&self,
		ctx: &ServiceContext,
		args: Option<Claims>,
		state: Option<&str>,
	) -> Result<HttpArguments> {
		let name = self.name();
		let _span = ServiceSpan::new(name, ServiceStage::BuildRequest).with_state(state).entered();

		obs::record_service_outcome(name, ServiceOutcome::Attempt);

		let result = self.construct(ctx, args.unwrap_or_default(), state);

		obs::record_service_outcome(name, ServiceOutcome::of(&result));

		result
	}

	/// Parses, verifies, and applies a response body.
	///
	/// Passing a state key to a stateless service is a contract violation reported as
	/// [`Error::Misuse`].
	pub fn consume_response(
		&self,
		ctx: &mut ServiceContext,
		body: &str,
		state: Option<&str>,
	) -> Result<Message> {
		let name = self.name();
		let _span = ServiceSpan::new(name, ServiceStage::ConsumeResponse).with_state(state).entered();

		obs::record_service_outcome(name, ServiceOutcome::Attempt);

		let result = self.consume(ctx, body, state);

		obs::record_service_outcome(name, ServiceOutcome::of(&result));

		result
	}

	fn construct(&self, ctx: &ServiceContext, mut args: Claims, state: Option<&str>) -> Result<HttpArguments> {
		let d = &self.descriptor;

		for (name, value) in &self.config.request_args {
			args.entry(name.clone()).or_insert_with(|| value.clone());
		}
		for (name, value) in d.default_args {
			args.entry(*name).or_insert_with(|| Value::from(*value));
		}

		let url = self.resolve_endpoint(ctx, &mut args)?;
		let env = ProcessorEnv {
			context: ctx,
			store: self.store.as_ref(),
			state,
			service: d.name,
			request_kind: d.request_kind,
		};

		let known = env.state_key(&args).is_some_and(|key| self.store.get_issuer(&key).is_ok());
		let pre = self.pre.run(&mut args, &env);
		let created = if known {
			None
		} else {
			env.state_key(&args).filter(|key| self.store.get_issuer(key).is_ok())
		};
		let result = pre.and_then(|()| self.assemble(ctx, args, url, &env));

		// A failed build must not leave the record it allocated behind.
		if let (Err(_), Some(key)) = (&result, created.as_deref()) {
			let _ = self.store.remove_state(key);
		}

		result
	}

	fn assemble(
		&self,
		ctx: &ServiceContext,
		args: Claims,
		mut url: Url,
		env: &ProcessorEnv<'_>,
	) -> Result<HttpArguments> {
		let d = &self.descriptor;
		let method = self.config.http_method.unwrap_or(d.http_method);
		let mut headers = HttpHeaders::default();
		let Some(kind) = d.request_kind else {
			return Ok(HttpArguments { method, url, body: None, headers });
		};
		let mut request = Message::new(kind, args);

		if let Some(construct) = d.hooks.construct_request {
			construct(&mut request, ctx)?;
		}

		request.verify()?;
		self.post.run(request.claims_mut(), env)?;

		{
			let finalize_env = FinalizeEnv {
				context: ctx,
				method: self.auth_method(ctx)?,
				audience: &url,
				signing_alg: self.config.signing_alg.as_deref(),
			};

			(d.hooks.finalize)(&mut request, &mut headers, &finalize_env)?;
		}

		match method {
			HttpMethod::Get => {
				append_query(&mut url, &request.to_urlencoded());

				Ok(HttpArguments { method, url, body: None, headers })
			},
			HttpMethod::Post => {
				let serialization = self.config.serialization.unwrap_or(d.serialization);
				let alg = self.config.signing_alg.as_deref().unwrap_or("RS256");
				let body = request.serialize(serialization, ctx.keys.as_deref(), alg)?;

				headers.content_type = Some(serialization.content_type().to_owned());

				Ok(HttpArguments { method, url, body: Some(body), headers })
			},
		}
	}

	fn consume(&self, ctx: &mut ServiceContext, body: &str, state: Option<&str>) -> Result<Message> {
		let d = &self.descriptor;

		if state.is_some() && !d.is_stateful() {
			return Err(Error::Misuse {
				service: d.name,
				reason: "a state key was passed to a stateless service",
			});
		}

		let mut message = self.deserialize(ctx, body)?;

		if message.is_error_response() {
			return Err(ErrorResponse::from_message(message)?.into());
		}

		message.verify()?;

		let key = self.resolve_state_key(state, &message)?;
		let env = HookEnv { service: d.name, store: self.store.as_ref(), state: key.as_deref() };

		if let Some(post_parse) = d.hooks.post_parse {
			post_parse(&mut message, ctx, &env)?;
		}
		if message.kind() != d.response_kind {
			return Err(Error::UnexpectedResponseType {
				expected: d.response_kind,
				found: message.kind(),
			});
		}
		if let Some(update) = d.hooks.update_context {
			update(&mut message, ctx, &env)?;
		}
		if let (Some(item), Some(key)) = (d.state_item, key.as_deref()) {
			self.store.store_item(&message, key, item)?;
		}

		Ok(message)
	}

	fn deserialize(&self, ctx: &ServiceContext, body: &str) -> Result<Message> {
		let kind = self.descriptor.response_kind;
		let format = self.config.deserialization.unwrap_or(self.descriptor.deserialization);
		let codec = ctx.keys.as_deref();

		match Message::deserialize(kind, body, format, codec) {
			Ok(message) => Ok(message),
			Err(e) if format == SerializationType::Json => match codec {
				Some(codec) => Message::from_jwt(kind, body, codec).map_err(|_| e),
				None => Err(e),
			},
			Err(e) => Err(e),
		}
	}

	fn resolve_endpoint(&self, ctx: &ServiceContext, args: &mut Claims) -> Result<Url> {
		if let Some(raw) = self.config.endpoint.as_deref() {
			return Error::parse_url(raw);
		}
		if let Some(endpoint) = self.descriptor.hooks.endpoint {
			return endpoint(ctx, args);
		}

		self.descriptor
			.endpoint_name
			.and_then(|name| ctx.endpoint(name))
			.cloned()
			.ok_or(Error::MissingRequiredAttribute { attribute: "endpoint" })
	}

	fn auth_method(&self, ctx: &ServiceContext) -> Result<ClientAuthMethod> {
		if let Some(method) = self.config.auth_method {
			return Ok(method);
		}
		if self.descriptor.negotiate_auth_method {
			if let Some(raw) = ctx.behavior_str("token_endpoint_auth_method") {
				return raw.parse();
			}
		}

		Ok(self.descriptor.auth_method)
	}

	fn resolve_state_key(&self, state: Option<&str>, message: &Message) -> Result<Option<String>> {
		if !self.descriptor.is_stateful() {
			return Ok(None);
		}

		match (state, message.get_str("state")) {
			(Some(expected), Some(found)) if expected != found => Err(Error::ContextMismatch {
				attribute: "state",
				expected: expected.to_owned(),
				found: found.to_owned(),
			}),
			(Some(key), _) | (None, Some(key)) => Ok(Some(key.to_owned())),
			(None, None) => Err(Error::MissingRequiredAttribute { attribute: "state" }),
		}
	}
}
impl Debug for Service {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Service")
			.field("descriptor", &self.descriptor)
			.field("config", &self.config)
			.field("pre", &self.pre)
			.field("post", &self.post)
			.finish_non_exhaustive()
	}
}

fn append_query(url: &mut Url, encoded: &str) {
	if encoded.is_empty() {
		return;
	}

	let query = match url.query() {
		Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
		_ => encoded.to_owned(),
	};

	url.set_query(Some(&query));
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::state::MemoryStateStore;

	fn store() -> Arc<dyn StateStore> {
		Arc::new(MemoryStateStore::default())
	}

	#[test]
	fn stateless_services_reject_state_keys() {
		let service = Service::new(ServiceKind::ProviderInfoDiscovery, store());
		let mut ctx = ServiceContext::default();
		let err = service
			.consume_response(&mut ctx, "{}", Some("state"))
			.expect_err("Discovery never takes a state key.");

		assert!(err.is_misuse());
	}

	#[test]
	fn explicit_endpoint_wins_and_static_args_fill_gaps() {
		let config = ServiceConfig {
			endpoint: Some("https://op.example.com/authorize?tenant=a".into()),
			request_args: json!({ "prompt": "login", "scope": "openid email" })
				.as_object()
				.cloned()
				.unwrap_or_default(),
			..Default::default()
		};
		let service = Service::with_config(ServiceKind::Authentication, config, store());
		let ctx = ServiceContext {
			issuer: Some("https://op.example.com".into()),
			client_id: Some("client".into()),
			redirect_uris: vec!["https://rp.example.com/cb".into()],
			..Default::default()
		};
		let mut args = Claims::new();

		args.insert("prompt".into(), json!("none"));

		let request = service.build_request(&ctx, Some(args), None).expect("Request should build.");
		let query: BTreeMap<String, String> = request.url.query_pairs().into_owned().collect();

		assert_eq!(request.method, HttpMethod::Get);
		assert_eq!(query.get("tenant").map(String::as_str), Some("a"));
		assert_eq!(query.get("prompt").map(String::as_str), Some("none"));
		assert_eq!(query.get("scope").map(String::as_str), Some("openid email"));
		assert!(request.body.is_none());
	}

	#[test]
	fn failed_builds_leave_no_state_behind() {
		let memory = Arc::new(MemoryStateStore::default());
		let service = Service::with_config(
			ServiceKind::Authentication,
			ServiceConfig {
				endpoint: Some("https://op.example.com/authorize".into()),
				..Default::default()
			},
			memory.clone(),
		);
		let mut ctx = ServiceContext {
			issuer: Some("https://op.example.com".into()),
			client_id: Some("client".into()),
			redirect_uris: vec!["https://rp.example.com/cb".into()],
			..Default::default()
		};
		let err = service
			.build_request(&ctx, Some(json!({ "scope": 5 }).as_object().cloned().unwrap_or_default()), None)
			.expect_err("A numeric scope is malformed.");

		assert!(matches!(err, Error::Validation(_)));
		assert_eq!(memory.len(), 0);

		// The record is allocated here, then request verification fails on the missing redirect.
		ctx.redirect_uris.clear();

		let err = service.build_request(&ctx, None, None).expect_err("A redirect URI is required.");

		assert!(matches!(err, Error::Verification { .. }));
		assert_eq!(memory.len(), 0);

		ctx.redirect_uris.push("https://rp.example.com/cb".into());
		service.build_request(&ctx, None, None).expect("A complete request should build.");

		assert_eq!(memory.len(), 1);
	}

	#[test]
	fn missing_endpoint_is_reported() {
		let service = Service::new(ServiceKind::AccessToken, store());
		let err = service
			.build_request(&ServiceContext::default(), None, Some("s"))
			.expect_err("No token endpoint is known.");

		assert!(matches!(err, Error::MissingRequiredAttribute { attribute: "endpoint" }));
	}

	#[test]
	fn mismatched_state_echo_is_rejected() {
		let service = Service::new(ServiceKind::Authorization, store());
		let mut ctx = ServiceContext::default();
		let err = service
			.consume_response(&mut ctx, "code=abc&state=other", Some("mine"))
			.expect_err("Echoed state must match.");

		assert!(matches!(err, Error::ContextMismatch { attribute: "state", .. }));
	}

	#[test]
	fn descriptors_are_stateful_where_responses_are_correlated() {
		for kind in ServiceKind::ALL {
			let descriptor = kind.descriptor();
			let stateless = matches!(
				kind,
				ServiceKind::ProviderInfoDiscovery
					| ServiceKind::ServerMetadataDiscovery
					| ServiceKind::WebFinger
					| ServiceKind::Registration
			);

			assert_eq!(descriptor.is_stateful(), !stateless, "{kind}");
		}
	}
}
