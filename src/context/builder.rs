//! Validating builder for [`ServiceContext`](super::ServiceContext).

// self
use crate::{
	_prelude::*,
	context::{AllowFlags, Callbacks, ServiceContext},
	message::{Claims, JwsCodec, Value},
};

/// Errors raised while assembling a [`ServiceContext`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ContextError {
	/// The client identifier was supplied but empty.
	#[error("Client identifier cannot be empty.")]
	EmptyClientId,
	/// A configured URL is not an absolute URL.
	#[error("The {field} value is not a valid absolute URL: {url}.")]
	InvalidUrl {
		/// Which field failed validation.
		field: &'static str,
		/// Offending value.
		url: String,
	},
}

/// Builder for [`ServiceContext`] values.
#[derive(Default)]
pub struct ServiceContextBuilder {
	issuer: Option<String>,
	client_id: Option<String>,
	client_secret: Option<String>,
	keys: Option<Arc<dyn JwsCodec>>,
	redirect_uris: Vec<String>,
	callbacks: Option<Callbacks>,
	allow: AllowFlags,
	client_preferences: Claims,
	behavior: Claims,
}
impl ServiceContextBuilder {
	/// Sets the issuer.
	pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = Some(issuer.into());

		self
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Attaches the key-management collaborator.
	pub fn keys(mut self, keys: Arc<dyn JwsCodec>) -> Self {
		self.keys = Some(keys);

		self
	}

	/// Appends a redirect URI.
	pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uris.push(uri.into());

		self
	}

	/// Sets the response-mode/type keyed callbacks.
	pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
		self.callbacks = Some(callbacks);

		self
	}

	/// Overrides the allow flags.
	pub fn allow(mut self, allow: AllowFlags) -> Self {
		self.allow = allow;

		self
	}

	/// Adds one client preference (e.g., `response_types`, `token_endpoint_auth_method`).
	pub fn preference(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.client_preferences.insert(name.into(), value.into());

		self
	}

	/// Seeds the negotiated behavior (useful when metadata is configured statically).
	pub fn behavior(mut self, behavior: Claims) -> Self {
		self.behavior = behavior;

		self
	}

	/// Validates and builds the context.
	pub fn build(self) -> Result<ServiceContext, ContextError> {
		if self.client_id.as_deref().is_some_and(str::is_empty) {
			return Err(ContextError::EmptyClientId);
		}
		if let Some(issuer) = self.issuer.as_deref() {
			validate_url("issuer", issuer)?;
		}

		for uri in &self.redirect_uris {
			validate_url("redirect_uri", uri)?;
		}

		if let Some(callbacks) = self.callbacks.as_ref() {
			for (field, uri) in [
				("callbacks.form_post", &callbacks.form_post),
				("callbacks.code", &callbacks.code),
				("callbacks.implicit", &callbacks.implicit),
			] {
				if let Some(uri) = uri {
					validate_url(field, uri)?;
				}
			}
		}

		Ok(ServiceContext {
			issuer: self.issuer,
			client_id: self.client_id,
			client_secret: self.client_secret,
			keys: self.keys,
			redirect_uris: self.redirect_uris,
			callbacks: self.callbacks,
			allow: self.allow,
			client_preferences: self.client_preferences,
			behavior: self.behavior,
			..Default::default()
		})
	}
}
impl Debug for ServiceContextBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceContextBuilder")
			.field("issuer", &self.issuer)
			.field("client_id", &self.client_id)
			.field("redirect_uris", &self.redirect_uris)
			.finish_non_exhaustive()
	}
}

fn validate_url(field: &'static str, raw: &str) -> Result<(), ContextError> {
	match Url::parse(raw) {
		Ok(url) if !url.cannot_be_a_base() => Ok(()),
		_ => Err(ContextError::InvalidUrl { field, url: raw.to_owned() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builder_validates_urls_and_identifiers() {
		let err = ServiceContext::builder()
			.client_id("")
			.build()
			.expect_err("Empty client identifiers must be rejected.");

		assert_eq!(err, ContextError::EmptyClientId);

		let err = ServiceContext::builder()
			.redirect_uri("not a url")
			.build()
			.expect_err("Relative redirect URIs must be rejected.");

		assert!(matches!(err, ContextError::InvalidUrl { field: "redirect_uri", .. }));

		let err = ServiceContext::builder()
			.callbacks(Callbacks { code: Some("mailto:rp@example.com".into()), ..Default::default() })
			.build()
			.expect_err("Opaque callback URIs must be rejected.");

		assert!(matches!(err, ContextError::InvalidUrl { field: "callbacks.code", .. }));
	}

	#[test]
	fn builder_carries_preferences() {
		let ctx = ServiceContext::builder()
			.issuer("https://op.example.com")
			.client_id("client")
			.preference("response_types", vec!["code"])
			.build()
			.expect("Valid context should build.");

		assert_eq!(ctx.issuer.as_deref(), Some("https://op.example.com"));
		assert!(ctx.client_preferences.contains_key("response_types"));
		assert!(ctx.behavior.is_empty());
	}
}
