//! Per-client knowledge shared by every service: identity, provider metadata, negotiated
//! behavior, and redirect configuration.
//!
//! [`ServiceContext`] is single-owner by design. It carries no locks; embedders that share one
//! across tasks must synchronize every mutating call themselves.

pub mod behavior;
pub mod builder;

pub use behavior::*;
pub use builder::*;

// self
use crate::{
	_prelude::*,
	message::{Claims, JwsCodec, Value},
};

/// Response-mode or response-type keyed redirect URIs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Callbacks {
	/// Redirect URI used when `response_mode == "form_post"`.
	pub form_post: Option<String>,
	/// Redirect URI used for the pure code flow.
	pub code: Option<String>,
	/// Redirect URI used for implicit and hybrid flows.
	pub implicit: Option<String>,
}

/// Explicitly allow-listed divergences from strict protocol checks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowFlags {
	/// Accept a discovered issuer that differs from the configured one. Responses and ID tokens
	/// are still held to the configured issuer.
	pub issuer_mismatch: bool,
	/// Accept `http://` issuer links in webfinger responses.
	pub http_links: bool,
	/// Specific issuers accepted in place of the configured one.
	pub allowed_issuers: Vec<String>,
}

/// Everything a client knows about the provider and itself.
#[derive(Clone, Default)]
pub struct ServiceContext {
	/// Issuer identifier; the single source of truth for matching provider metadata.
	pub issuer: Option<String>,
	/// Registered client identifier.
	pub client_id: Option<String>,
	/// Client secret for confidential clients.
	pub client_secret: Option<String>,
	/// Key-management collaborator used for client assertions and ID token decoding.
	pub keys: Option<Arc<dyn JwsCodec>>,
	/// Discovered provider metadata.
	pub provider_info: Claims,
	/// Endpoints extracted from provider metadata, keyed by metadata name.
	pub endpoints: BTreeMap<String, Url>,
	/// Negotiated subset of client preferences supported by the provider.
	pub behavior: Claims,
	/// Client preferences supplied by the embedder.
	pub client_preferences: Claims,
	/// Registered redirect URIs (unordered fallback list).
	pub redirect_uris: Vec<String>,
	/// Response-mode/type keyed redirect URIs.
	pub callbacks: Option<Callbacks>,
	/// Allow-listed divergences.
	pub allow: AllowFlags,
	/// Last dynamic registration response.
	pub registration_response: Option<Claims>,
}
impl ServiceContext {
	/// Creates a new builder.
	pub fn builder() -> ServiceContextBuilder {
		ServiceContextBuilder::default()
	}

	/// Returns the configured issuer or [`Error::MissingRequiredAttribute`].
	pub fn require_issuer(&self) -> Result<&str> {
		self.issuer.as_deref().ok_or(Error::MissingRequiredAttribute { attribute: "issuer" })
	}

	/// Returns the client identifier or [`Error::MissingRequiredAttribute`].
	pub fn require_client_id(&self) -> Result<&str> {
		self.client_id.as_deref().ok_or(Error::MissingRequiredAttribute { attribute: "client_id" })
	}

	/// Replaces the issuer.
	pub fn set_issuer(&mut self, issuer: impl Into<String>) {
		self.issuer = Some(issuer.into());
	}

	/// Replaces the negotiated behavior.
	pub fn set_behavior(&mut self, behavior: Claims) {
		self.behavior = behavior;
	}

	/// Stores discovered metadata and indexes every `*_endpoint` and `jwks_uri` entry.
	pub fn set_provider_info(&mut self, info: Claims) -> Result<()> {
		let mut endpoints = BTreeMap::new();

		for (name, value) in &info {
			if !(name.ends_with("_endpoint") || name == "jwks_uri") {
				continue;
			}
			if let Some(raw) = value.as_str() {
				endpoints.insert(name.clone(), Error::parse_url(raw)?);
			}
		}

		self.endpoints = endpoints;
		self.provider_info = info;

		Ok(())
	}

	/// Endpoint discovered under `name` (e.g., `token_endpoint`).
	pub fn endpoint(&self, name: &str) -> Option<&Url> {
		self.endpoints.get(name)
	}

	/// String value of a negotiated behavior entry; lists yield their first element.
	pub fn behavior_str(&self, name: &str) -> Option<&str> {
		match self.behavior.get(name)? {
			Value::String(s) => Some(s),
			Value::Array(items) => items.first().and_then(Value::as_str),
			_ => None,
		}
	}

	/// Checks the issuer named by discovered metadata against the configured one.
	///
	/// Matching ignores a trailing slash. A mismatch is accepted only when the discovered value
	/// is allow-listed or [`AllowFlags::issuer_mismatch`] is set. Without a configured issuer
	/// the discovered one is adopted by the caller.
	pub fn check_discovered_issuer(&self, found: &str) -> Result<()> {
		let Some(expected) = self.issuer.as_deref() else {
			return Ok(());
		};

		if self.allow.issuer_mismatch || self.issuer_accepted(expected, found) {
			Ok(())
		} else {
			Err(issuer_mismatch(expected, found))
		}
	}

	/// Checks the issuer asserted by a response or an ID token.
	///
	/// A configured issuer is required. The value must match it (trailing slash aside) or an
	/// entry of [`AllowFlags::allowed_issuers`]; [`AllowFlags::issuer_mismatch`] does not apply.
	pub fn check_token_issuer(&self, found: &str) -> Result<()> {
		let expected = self.require_issuer()?;

		if self.issuer_accepted(expected, found) {
			Ok(())
		} else {
			Err(issuer_mismatch(expected, found))
		}
	}

	fn issuer_accepted(&self, expected: &str, found: &str) -> bool {
		issuers_match(expected, found)
			|| self.allow.allowed_issuers.iter().any(|allowed| issuers_match(allowed, found))
	}
}
impl Debug for ServiceContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceContext")
			.field("issuer", &self.issuer)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("keys_set", &self.keys.is_some())
			.field("endpoints", &self.endpoints)
			.field("behavior", &self.behavior)
			.field("redirect_uris", &self.redirect_uris)
			.field("callbacks", &self.callbacks)
			.field("allow", &self.allow)
			.finish()
	}
}

fn issuer_mismatch(expected: &str, found: &str) -> Error {
	Error::ContextMismatch { attribute: "issuer", expected: expected.to_owned(), found: found.to_owned() }
}

/// Compares two issuer identifiers, ignoring a single trailing slash.
pub fn issuers_match(lhs: &str, rhs: &str) -> bool {
	lhs.trim_end_matches('/') == rhs.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn context(issuer: &str) -> ServiceContext {
		ServiceContext { issuer: Some(issuer.into()), ..Default::default() }
	}

	#[test]
	fn provider_info_indexes_endpoints() {
		let mut ctx = context("https://op.example.com");
		let info = json!({
			"issuer": "https://op.example.com",
			"token_endpoint": "https://op.example.com/token",
			"jwks_uri": "https://op.example.com/jwks",
			"scopes_supported": ["openid"],
		});

		ctx.set_provider_info(info.as_object().cloned().unwrap_or_default())
			.expect("Metadata with valid URLs should be accepted.");

		assert_eq!(
			ctx.endpoint("token_endpoint").map(Url::as_str),
			Some("https://op.example.com/token")
		);
		assert!(ctx.endpoint("jwks_uri").is_some());
		assert!(ctx.endpoint("scopes_supported").is_none());
	}

	#[test]
	fn discovered_issuer_respects_allow_list() {
		let mut ctx = context("https://op.example.com");

		assert!(ctx.check_discovered_issuer("https://op.example.com/").is_ok());
		assert!(matches!(
			ctx.check_discovered_issuer("https://other.example.com"),
			Err(Error::ContextMismatch { attribute: "issuer", .. })
		));

		ctx.allow.allowed_issuers.push("https://other.example.com".into());

		assert!(ctx.check_discovered_issuer("https://other.example.com").is_ok());
		assert!(ctx.check_discovered_issuer("https://third.example.com").is_err());

		ctx.allow.issuer_mismatch = true;

		assert!(ctx.check_discovered_issuer("https://third.example.com").is_ok());
		assert!(ServiceContext::default().check_discovered_issuer("https://any.example.com").is_ok());
	}

	#[test]
	fn token_issuer_ignores_the_mismatch_flag() {
		let mut ctx = context("https://op.example.com");

		ctx.allow.issuer_mismatch = true;

		assert!(ctx.check_token_issuer("https://op.example.com/").is_ok());
		assert!(matches!(
			ctx.check_token_issuer("https://evil.example.com"),
			Err(Error::ContextMismatch { attribute: "issuer", .. })
		));

		ctx.allow.allowed_issuers.push("https://tenant.example.com".into());

		assert!(ctx.check_token_issuer("https://tenant.example.com").is_ok());
		assert!(matches!(
			ServiceContext::default().check_token_issuer("https://op.example.com"),
			Err(Error::MissingRequiredAttribute { attribute: "issuer" })
		));
	}

	#[test]
	fn behavior_lookup_reads_first_list_entry() {
		let mut ctx = ServiceContext::default();

		ctx.behavior.insert("response_types".into(), json!(["code id_token", "code"]));
		ctx.behavior.insert("token_endpoint_auth_method".into(), json!("client_secret_post"));

		assert_eq!(ctx.behavior_str("response_types"), Some("code id_token"));
		assert_eq!(ctx.behavior_str("token_endpoint_auth_method"), Some("client_secret_post"));
		assert!(ctx.require_client_id().is_err());
	}
}
