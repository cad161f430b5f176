//! Typed protocol messages: known shapes, claim verification, and wire codecs.
//!
//! A [`Message`] pairs a [`MessageKind`] with a string-keyed claim map. Each kind declares the
//! claims it knows about in a static parameter table, so verification is exhaustive per shape
//! while vendor or custom claims ride along untouched.

pub mod jwt;
pub mod params;

pub use jwt::*;
pub use params::*;
pub use serde_json::{Map, Value};

// crates.io
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Claim map carried by every message.
pub type Claims = Map<String, Value>;

/// Wire formats produced and consumed by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationType {
	/// `application/x-www-form-urlencoded`.
	UrlEncoded,
	/// `application/json`.
	Json,
	/// Compact JWS (`application/jwt`).
	Jwt,
}
impl SerializationType {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			SerializationType::UrlEncoded => "urlencoded",
			SerializationType::Json => "json",
			SerializationType::Jwt => "jwt",
		}
	}

	/// Media type used for the `Content-Type` header.
	pub const fn content_type(self) -> &'static str {
		match self {
			SerializationType::UrlEncoded => "application/x-www-form-urlencoded",
			SerializationType::Json => "application/json",
			SerializationType::Jwt => "application/jwt",
		}
	}
}
impl Display for SerializationType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Known message shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
	/// OAuth 2.0 authorization request.
	AuthorizationRequest,
	/// OpenID Connect authentication request.
	AuthenticationRequest,
	/// OAuth 2.0 authorization response.
	AuthorizationResponse,
	/// OpenID Connect authentication response (code, implicit, or hybrid).
	AuthenticationResponse,
	/// Authorization-code token request.
	AccessTokenRequest,
	/// Refresh-token token request.
	RefreshAccessTokenRequest,
	/// Token endpoint success response.
	AccessTokenResponse,
	/// User-info request.
	UserInfoRequest,
	/// User-info response (standard OpenID claims).
	OpenIdSchema,
	/// Dynamic client registration request.
	RegistrationRequest,
	/// Dynamic client registration response.
	RegistrationResponse,
	/// RFC 8414 authorization server metadata.
	AuthorizationServerMetadata,
	/// OpenID provider configuration.
	ProviderConfigurationResponse,
	/// Webfinger query.
	WebfingerRequest,
	/// Webfinger JSON resource descriptor.
	JsonResourceDescriptor,
	/// Decoded ID token claim set.
	IdToken,
	/// Client-authentication assertion claim set.
	ClientAssertion,
	/// RFC 6749 error response.
	ErrorResponse,
}
impl MessageKind {
	/// Returns a stable label suitable for messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			MessageKind::AuthorizationRequest => "AuthorizationRequest",
			MessageKind::AuthenticationRequest => "AuthenticationRequest",
			MessageKind::AuthorizationResponse => "AuthorizationResponse",
			MessageKind::AuthenticationResponse => "AuthenticationResponse",
			MessageKind::AccessTokenRequest => "AccessTokenRequest",
			MessageKind::RefreshAccessTokenRequest => "RefreshAccessTokenRequest",
			MessageKind::AccessTokenResponse => "AccessTokenResponse",
			MessageKind::UserInfoRequest => "UserInfoRequest",
			MessageKind::OpenIdSchema => "OpenIdSchema",
			MessageKind::RegistrationRequest => "RegistrationRequest",
			MessageKind::RegistrationResponse => "RegistrationResponse",
			MessageKind::AuthorizationServerMetadata => "AuthorizationServerMetadata",
			MessageKind::ProviderConfigurationResponse => "ProviderConfigurationResponse",
			MessageKind::WebfingerRequest => "WebfingerRequest",
			MessageKind::JsonResourceDescriptor => "JsonResourceDescriptor",
			MessageKind::IdToken => "IdToken",
			MessageKind::ClientAssertion => "ClientAssertion",
			MessageKind::ErrorResponse => "ErrorResponse",
		}
	}

	/// Claims declared by this shape.
	pub fn params(self) -> &'static [ParamSpec] {
		use ParamType::*;

		const AUTHORIZATION_REQUEST: &[ParamSpec] = &[
			ParamSpec::required("response_type", SpaceSeparated),
			ParamSpec::required("client_id", String),
			ParamSpec::optional("redirect_uri", String),
			ParamSpec::optional("scope", SpaceSeparated),
			ParamSpec::optional("state", String),
			ParamSpec::optional("response_mode", String),
			ParamSpec::optional("code_challenge", String),
			ParamSpec::optional("code_challenge_method", String),
		];
		const AUTHENTICATION_REQUEST: &[ParamSpec] = &[
			ParamSpec::required("response_type", SpaceSeparated),
			ParamSpec::required("client_id", String),
			ParamSpec::required("redirect_uri", String),
			ParamSpec::required("scope", SpaceSeparated),
			ParamSpec::optional("state", String),
			ParamSpec::optional("response_mode", String),
			ParamSpec::optional("nonce", String),
			ParamSpec::optional("display", String),
			ParamSpec::optional("prompt", SpaceSeparated),
			ParamSpec::optional("max_age", Integer),
			ParamSpec::optional("ui_locales", SpaceSeparated),
			ParamSpec::optional("claims_locales", SpaceSeparated),
			ParamSpec::optional("id_token_hint", String),
			ParamSpec::optional("login_hint", String),
			ParamSpec::optional("acr_values", SpaceSeparated),
			ParamSpec::optional("claims", Object),
			ParamSpec::optional("request", String),
			ParamSpec::optional("request_uri", String),
			ParamSpec::optional("code_challenge", String),
			ParamSpec::optional("code_challenge_method", String),
		];
		const AUTHORIZATION_RESPONSE: &[ParamSpec] = &[
			ParamSpec::required("code", String),
			ParamSpec::optional("state", String),
			ParamSpec::optional("iss", String),
			ParamSpec::optional("client_id", String),
		];
		const AUTHENTICATION_RESPONSE: &[ParamSpec] = &[
			ParamSpec::optional("code", String),
			ParamSpec::optional("state", String),
			ParamSpec::optional("access_token", String),
			ParamSpec::optional("token_type", String),
			ParamSpec::optional("id_token", String),
			ParamSpec::optional("expires_in", Integer),
			ParamSpec::optional("scope", SpaceSeparated),
			ParamSpec::optional("session_state", String),
			ParamSpec::optional("iss", String),
			ParamSpec::optional("client_id", String),
		];
		const ACCESS_TOKEN_REQUEST: &[ParamSpec] = &[
			ParamSpec::required("grant_type", String),
			ParamSpec::required("code", String),
			ParamSpec::optional("redirect_uri", String),
			ParamSpec::optional("client_id", String),
			ParamSpec::optional("client_secret", String),
			ParamSpec::optional("state", String),
			ParamSpec::optional("code_verifier", String),
			ParamSpec::optional("client_assertion", String),
			ParamSpec::optional("client_assertion_type", String),
		];
		const REFRESH_ACCESS_TOKEN_REQUEST: &[ParamSpec] = &[
			ParamSpec::required("grant_type", String),
			ParamSpec::required("refresh_token", String),
			ParamSpec::optional("scope", SpaceSeparated),
			ParamSpec::optional("client_id", String),
			ParamSpec::optional("client_secret", String),
			ParamSpec::optional("client_assertion", String),
			ParamSpec::optional("client_assertion_type", String),
		];
		const ACCESS_TOKEN_RESPONSE: &[ParamSpec] = &[
			ParamSpec::required("access_token", String),
			ParamSpec::required("token_type", String),
			ParamSpec::optional("expires_in", Integer),
			ParamSpec::optional("expires_at", Integer),
			ParamSpec::optional("refresh_token", String),
			ParamSpec::optional("scope", SpaceSeparated),
			ParamSpec::optional("state", String),
			ParamSpec::optional("id_token", String),
		];
		const USER_INFO_REQUEST: &[ParamSpec] = &[ParamSpec::optional("access_token", String)];
		const OPEN_ID_SCHEMA: &[ParamSpec] = &[
			ParamSpec::required("sub", String),
			ParamSpec::optional("name", String),
			ParamSpec::optional("given_name", String),
			ParamSpec::optional("family_name", String),
			ParamSpec::optional("middle_name", String),
			ParamSpec::optional("nickname", String),
			ParamSpec::optional("preferred_username", String),
			ParamSpec::optional("profile", String),
			ParamSpec::optional("picture", String),
			ParamSpec::optional("website", String),
			ParamSpec::optional("email", String),
			ParamSpec::optional("email_verified", Boolean),
			ParamSpec::optional("gender", String),
			ParamSpec::optional("birthdate", String),
			ParamSpec::optional("zoneinfo", String),
			ParamSpec::optional("locale", String),
			ParamSpec::optional("phone_number", String),
			ParamSpec::optional("phone_number_verified", Boolean),
			ParamSpec::optional("address", Object),
			ParamSpec::optional("updated_at", Integer),
			ParamSpec::optional("_claim_names", Object),
			ParamSpec::optional("_claim_sources", Object),
		];
		const REGISTRATION_REQUEST: &[ParamSpec] = &[
			ParamSpec::required("redirect_uris", StringList),
			ParamSpec::optional("response_types", StringList),
			ParamSpec::optional("grant_types", StringList),
			ParamSpec::optional("application_type", String),
			ParamSpec::optional("contacts", StringList),
			ParamSpec::optional("client_name", String),
			ParamSpec::optional("logo_uri", String),
			ParamSpec::optional("client_uri", String),
			ParamSpec::optional("policy_uri", String),
			ParamSpec::optional("tos_uri", String),
			ParamSpec::optional("jwks_uri", String),
			ParamSpec::optional("jwks", Object),
			ParamSpec::optional("sector_identifier_uri", String),
			ParamSpec::optional("subject_type", String),
			ParamSpec::optional("id_token_signed_response_alg", String),
			ParamSpec::optional("userinfo_signed_response_alg", String),
			ParamSpec::optional("request_object_signing_alg", String),
			ParamSpec::optional("token_endpoint_auth_method", String),
			ParamSpec::optional("token_endpoint_auth_signing_alg", String),
			ParamSpec::optional("default_max_age", Integer),
			ParamSpec::optional("require_auth_time", Boolean),
			ParamSpec::optional("default_acr_values", StringList),
			ParamSpec::optional("initiate_login_uri", String),
			ParamSpec::optional("request_uris", StringList),
			ParamSpec::optional("post_logout_redirect_uris", StringList),
		];
		const REGISTRATION_RESPONSE: &[ParamSpec] = &[
			ParamSpec::required("client_id", String),
			ParamSpec::optional("client_secret", String),
			ParamSpec::optional("registration_access_token", String),
			ParamSpec::optional("registration_client_uri", String),
			ParamSpec::optional("client_id_issued_at", Integer),
			ParamSpec::optional("client_secret_expires_at", Integer),
			ParamSpec::optional("redirect_uris", StringList),
			ParamSpec::optional("response_types", StringList),
			ParamSpec::optional("grant_types", StringList),
			ParamSpec::optional("token_endpoint_auth_method", String),
			ParamSpec::optional("id_token_signed_response_alg", String),
		];
		const AUTHORIZATION_SERVER_METADATA: &[ParamSpec] = &[
			ParamSpec::required("issuer", String),
			ParamSpec::optional("authorization_endpoint", String),
			ParamSpec::optional("token_endpoint", String),
			ParamSpec::optional("jwks_uri", String),
			ParamSpec::optional("registration_endpoint", String),
			ParamSpec::optional("revocation_endpoint", String),
			ParamSpec::optional("introspection_endpoint", String),
			ParamSpec::optional("scopes_supported", StringList),
			ParamSpec::optional("response_types_supported", StringList),
			ParamSpec::optional("response_modes_supported", StringList),
			ParamSpec::optional("grant_types_supported", StringList),
			ParamSpec::optional("token_endpoint_auth_methods_supported", StringList),
			ParamSpec::optional("token_endpoint_auth_signing_alg_values_supported", StringList),
			ParamSpec::optional("code_challenge_methods_supported", StringList),
			ParamSpec::optional("service_documentation", String),
		];
		const PROVIDER_CONFIGURATION_RESPONSE: &[ParamSpec] = &[
			ParamSpec::required("issuer", String),
			ParamSpec::required("authorization_endpoint", String),
			ParamSpec::required("jwks_uri", String),
			ParamSpec::required("response_types_supported", StringList),
			ParamSpec::required("subject_types_supported", StringList),
			ParamSpec::required("id_token_signing_alg_values_supported", StringList),
			ParamSpec::optional("token_endpoint", String),
			ParamSpec::optional("userinfo_endpoint", String),
			ParamSpec::optional("registration_endpoint", String),
			ParamSpec::optional("end_session_endpoint", String),
			ParamSpec::optional("revocation_endpoint", String),
			ParamSpec::optional("introspection_endpoint", String),
			ParamSpec::optional("scopes_supported", StringList),
			ParamSpec::optional("claims_supported", StringList),
			ParamSpec::optional("response_modes_supported", StringList),
			ParamSpec::optional("grant_types_supported", StringList),
			ParamSpec::optional("acr_values_supported", StringList),
			ParamSpec::optional("token_endpoint_auth_methods_supported", StringList),
			ParamSpec::optional("token_endpoint_auth_signing_alg_values_supported", StringList),
			ParamSpec::optional("userinfo_signing_alg_values_supported", StringList),
			ParamSpec::optional("request_object_signing_alg_values_supported", StringList),
			ParamSpec::optional("code_challenge_methods_supported", StringList),
			ParamSpec::optional("claims_parameter_supported", Boolean),
			ParamSpec::optional("request_parameter_supported", Boolean),
			ParamSpec::optional("request_uri_parameter_supported", Boolean),
			ParamSpec::optional("require_request_uri_registration", Boolean),
		];
		const WEBFINGER_REQUEST: &[ParamSpec] =
			&[ParamSpec::required("resource", String), ParamSpec::optional("rel", String)];
		const JSON_RESOURCE_DESCRIPTOR: &[ParamSpec] = &[
			ParamSpec::optional("subject", String),
			ParamSpec::optional("aliases", StringList),
			ParamSpec::optional("properties", Object),
			ParamSpec::optional("links", ObjectList),
		];
		const ID_TOKEN: &[ParamSpec] = &[
			ParamSpec::required("iss", String),
			ParamSpec::required("sub", String),
			ParamSpec::required("aud", StringList),
			ParamSpec::required("exp", Integer),
			ParamSpec::required("iat", Integer),
			ParamSpec::optional("nonce", String),
			ParamSpec::optional("auth_time", Integer),
			ParamSpec::optional("acr", String),
			ParamSpec::optional("amr", StringList),
			ParamSpec::optional("azp", String),
			ParamSpec::optional("at_hash", String),
			ParamSpec::optional("c_hash", String),
			ParamSpec::optional("sid", String),
		];
		const CLIENT_ASSERTION: &[ParamSpec] = &[
			ParamSpec::required("iss", String),
			ParamSpec::required("sub", String),
			ParamSpec::required("aud", StringList),
			ParamSpec::required("jti", String),
			ParamSpec::required("exp", Integer),
			ParamSpec::required("iat", Integer),
		];
		const ERROR_RESPONSE: &[ParamSpec] = &[
			ParamSpec::required("error", String),
			ParamSpec::optional("error_description", String),
			ParamSpec::optional("error_uri", String),
			ParamSpec::optional("state", String),
		];

		match self {
			MessageKind::AuthorizationRequest => AUTHORIZATION_REQUEST,
			MessageKind::AuthenticationRequest => AUTHENTICATION_REQUEST,
			MessageKind::AuthorizationResponse => AUTHORIZATION_RESPONSE,
			MessageKind::AuthenticationResponse => AUTHENTICATION_RESPONSE,
			MessageKind::AccessTokenRequest => ACCESS_TOKEN_REQUEST,
			MessageKind::RefreshAccessTokenRequest => REFRESH_ACCESS_TOKEN_REQUEST,
			MessageKind::AccessTokenResponse => ACCESS_TOKEN_RESPONSE,
			MessageKind::UserInfoRequest => USER_INFO_REQUEST,
			MessageKind::OpenIdSchema => OPEN_ID_SCHEMA,
			MessageKind::RegistrationRequest => REGISTRATION_REQUEST,
			MessageKind::RegistrationResponse => REGISTRATION_RESPONSE,
			MessageKind::AuthorizationServerMetadata => AUTHORIZATION_SERVER_METADATA,
			MessageKind::ProviderConfigurationResponse => PROVIDER_CONFIGURATION_RESPONSE,
			MessageKind::WebfingerRequest => WEBFINGER_REQUEST,
			MessageKind::JsonResourceDescriptor => JSON_RESOURCE_DESCRIPTOR,
			MessageKind::IdToken => ID_TOKEN,
			MessageKind::ClientAssertion => CLIENT_ASSERTION,
			MessageKind::ErrorResponse => ERROR_RESPONSE,
		}
	}

	/// Looks up the declared parameter named `name`.
	pub fn param(self, name: &str) -> Option<&'static ParamSpec> {
		self.params().iter().find(|spec| spec.name == name)
	}

	fn check_rules(self, claims: &Claims, out: &mut Vec<Violation>) {
		let str_claim = |name: &str| claims.get(name).and_then(Value::as_str);

		match self {
			MessageKind::AuthenticationRequest => {
				if str_claim("scope").is_some_and(|scope| !contains_token(scope, "openid")) {
					out.push(
						Violation::new("scope", ViolationKind::ValueNotAllowed)
							.with_cause("scope must include `openid`"),
					);
				}
				if str_claim("response_type").is_some_and(|rt| contains_token(rt, "id_token"))
					&& str_claim("nonce").is_none()
				{
					out.push(
						Violation::new("nonce", ViolationKind::MissingRequiredValue)
							.with_cause("required when response_type contains `id_token`"),
					);
				}
			},
			MessageKind::AuthenticationResponse =>
				if ["code", "access_token", "id_token"].iter().all(|name| str_claim(name).is_none()) {
					out.push(
						Violation::new("code", ViolationKind::MissingRequiredValue)
							.with_cause("response carries neither code, access_token, nor id_token"),
					);
				},
			MessageKind::AccessTokenRequest => expect_grant(str_claim("grant_type"), "authorization_code", out),
			MessageKind::RefreshAccessTokenRequest =>
				expect_grant(str_claim("grant_type"), "refresh_token", out),
			_ => {},
		}
	}
}
impl Display for MessageKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A typed claim set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
	kind: MessageKind,
	claims: Claims,
}
impl Message {
	/// Wraps `claims` as a message of the given shape (no verification is performed).
	pub fn new(kind: MessageKind, claims: Claims) -> Self {
		Self { kind, claims }
	}

	/// Creates an empty message of the given shape.
	pub fn empty(kind: MessageKind) -> Self {
		Self::new(kind, Claims::new())
	}

	/// Shape of this message.
	pub fn kind(&self) -> MessageKind {
		self.kind
	}

	/// Read-only claim map.
	pub fn claims(&self) -> &Claims {
		&self.claims
	}

	/// Mutable claim map.
	pub fn claims_mut(&mut self) -> &mut Claims {
		&mut self.claims
	}

	/// Consumes the message, returning its claims.
	pub fn into_claims(self) -> Claims {
		self.claims
	}

	/// Raw claim lookup.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.claims.get(name)
	}

	/// String claim lookup.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.claims.get(name).and_then(Value::as_str)
	}

	/// Integer claim lookup.
	pub fn get_i64(&self, name: &str) -> Option<i64> {
		self.claims.get(name).and_then(Value::as_i64)
	}

	/// Inserts or replaces a claim.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.claims.insert(name.into(), value.into())
	}

	/// Removes a claim.
	pub fn remove(&mut self, name: &str) -> Option<Value> {
		self.claims.remove(name)
	}

	/// Returns `true` if the message self-identifies as an RFC 6749 error response.
	pub fn is_error_response(&self) -> bool {
		self.kind == MessageKind::ErrorResponse || self.claims.contains_key("error")
	}

	/// Checks declared claims for presence and type, coercing values in place.
	///
	/// Every violation is collected before failing, so the error lists all of them.
	pub fn verify(&mut self) -> Result<()> {
		let mut out = Vec::new();

		for spec in self.kind.params() {
			spec.check(&mut self.claims, &mut out);
		}

		self.kind.check_rules(&self.claims, &mut out);

		ValidationErrors::from(out)
			.into_result()
			.map_err(|violations| Error::Verification { kind: self.kind, violations })
	}

	/// Encodes as `application/x-www-form-urlencoded`.
	///
	/// Space-separated claims are joined, other lists repeat the key, objects are JSON-encoded.
	pub fn to_urlencoded(&self) -> String {
		let mut serializer = form_urlencoded::Serializer::new(String::new());

		for (name, value) in &self.claims {
			let space_separated = self
				.kind
				.param(name)
				.is_some_and(|spec| spec.kind == ParamType::SpaceSeparated);

			match value {
				Value::Null => {},
				Value::String(s) => {
					serializer.append_pair(name, s);
				},
				Value::Array(items) if space_separated || items.iter().any(|i| !i.is_string()) => {
					let joined = if space_separated {
						items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(" ")
					} else {
						value.to_string()
					};

					serializer.append_pair(name, &joined);
				},
				Value::Array(items) =>
					for item in items.iter().filter_map(Value::as_str) {
						serializer.append_pair(name, item);
					},
				other => {
					serializer.append_pair(name, &other.to_string());
				},
			}
		}

		serializer.finish()
	}

	/// Encodes as a JSON object.
	pub fn to_json(&self) -> Result<String> {
		serde_json::to_string(&self.claims).map_err(|e| Error::Deserialization {
			format: SerializationType::Json,
			message: e.to_string(),
		})
	}

	/// Encodes as a compact JWS using the crypto collaborator.
	pub fn to_jwt(&self, codec: &dyn JwsCodec, alg: &str) -> Result<String> {
		codec.sign(&self.claims, alg)
	}

	/// Encodes in the requested wire format.
	pub fn serialize(
		&self,
		format: SerializationType,
		codec: Option<&dyn JwsCodec>,
		alg: &str,
	) -> Result<String> {
		match (format, codec) {
			(SerializationType::UrlEncoded, _) => Ok(self.to_urlencoded()),
			(SerializationType::Json, _) => self.to_json(),
			(SerializationType::Jwt, Some(codec)) => self.to_jwt(codec, alg),
			(SerializationType::Jwt, None) =>
				Err(Error::UnsupportedSerializationType { kind: self.kind, serialization: format }),
		}
	}

	/// Decodes a URL-encoded payload.
	///
	/// When `input` is a full URL, the fragment (if non-empty) or else the query is used.
	/// Repeated keys become string lists.
	pub fn from_urlencoded(kind: MessageKind, input: &str) -> Result<Self> {
		let mut claims = Claims::new();

		for (name, value) in form_urlencoded::parse(extract_urlencoded(input).as_bytes()) {
			let value = Value::String(value.into_owned());

			match claims.get_mut(name.as_ref()) {
				Some(Value::Array(items)) => items.push(value),
				Some(existing) => {
					let first = existing.take();

					*existing = Value::Array(vec![first, value]);
				},
				None => {
					claims.insert(name.into_owned(), value);
				},
			}
		}

		Ok(Self::new(kind, claims))
	}

	/// Decodes a JSON object payload.
	pub fn from_json(kind: MessageKind, input: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(input);
		let claims: Claims = serde_path_to_error::deserialize(&mut de)?;

		Ok(Self::new(kind, claims))
	}

	/// Decodes a compact JWS using the crypto collaborator.
	pub fn from_jwt(kind: MessageKind, input: &str, codec: &dyn JwsCodec) -> Result<Self> {
		Ok(Self::new(kind, codec.decode(input.trim())?))
	}

	/// Decodes from the requested wire format.
	pub fn deserialize(
		kind: MessageKind,
		input: &str,
		format: SerializationType,
		codec: Option<&dyn JwsCodec>,
	) -> Result<Self> {
		match (format, codec) {
			(SerializationType::UrlEncoded, _) => Self::from_urlencoded(kind, input),
			(SerializationType::Json, _) => Self::from_json(kind, input),
			(SerializationType::Jwt, Some(codec)) => Self::from_jwt(kind, input, codec),
			(SerializationType::Jwt, None) =>
				Err(Error::UnsupportedSerializationType { kind, serialization: format }),
		}
	}
}

/// RFC 6749 error response surfaced as a typed failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error code (`invalid_request`, `invalid_grant`, ...).
	pub error: String,
	/// Human-readable description.
	pub error_description: Option<String>,
	/// Link to documentation.
	pub error_uri: Option<String>,
	/// State echoed by the provider.
	pub state: Option<String>,
	/// HTTP status, when the response arrived over HTTP.
	pub status: Option<u16>,
}
impl ErrorResponse {
	/// Builds the typed view from a message, verifying it as [`MessageKind::ErrorResponse`].
	pub fn from_message(message: Message) -> Result<Self> {
		let mut message = Message::new(MessageKind::ErrorResponse, message.into_claims());

		message.verify()?;

		let owned = |name: &str| message.get_str(name).map(str::to_owned);

		Ok(Self {
			error: owned("error").unwrap_or_default(),
			error_description: owned("error_description"),
			error_uri: owned("error_uri"),
			state: owned("state"),
			status: None,
		})
	}

	/// Attaches the HTTP status.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}
}
impl Display for ErrorResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.error)?;

		if let Some(description) = &self.error_description {
			write!(f, " ({description})")?;
		}

		Ok(())
	}
}

fn expect_grant(found: Option<&str>, expected: &'static str, out: &mut Vec<Violation>) {
	if let Some(grant) = found.filter(|grant| *grant != expected) {
		out.push(
			Violation::new("grant_type", ViolationKind::ValueNotAllowed)
				.with_cause(format!("expected `{expected}`, found `{grant}`")),
		);
	}
}

fn extract_urlencoded(input: &str) -> &str {
	let input = input.trim();
	let (head, fragment) = match input.split_once('#') {
		Some((head, fragment)) => (head, fragment),
		None => (input, ""),
	};

	if !fragment.is_empty() {
		return fragment;
	}

	match head.split_once('?') {
		Some((_, query)) => query,
		None => head,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn claims(value: Value) -> Claims {
		match value {
			Value::Object(map) => map,
			_ => panic!("Fixture must be a JSON object."),
		}
	}

	#[test]
	fn verify_reports_every_violation() {
		let mut message = Message::new(
			MessageKind::AccessTokenResponse,
			claims(json!({ "expires_in": "soon" })),
		);
		let err = message.verify().expect_err("Incomplete token response must fail verification.");

		match err {
			Error::Verification { kind, violations } => {
				assert_eq!(kind, MessageKind::AccessTokenResponse);
				assert!(violations.contains("access_token", ViolationKind::MissingRequiredValue));
				assert!(violations.contains("token_type", ViolationKind::MissingRequiredValue));
				assert!(violations.contains("expires_in", ViolationKind::InvalidValueFormat));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn verify_coerces_form_values() {
		let mut message = Message::from_urlencoded(
			MessageKind::AccessTokenResponse,
			"access_token=abc&token_type=Bearer&expires_in=3600",
		)
		.expect("Form payload should decode.");

		message.verify().expect("Token response should verify.");

		assert_eq!(message.get_i64("expires_in"), Some(3600));
	}

	#[test]
	fn authentication_request_requires_openid_scope_and_nonce() {
		let mut message = Message::new(
			MessageKind::AuthenticationRequest,
			claims(json!({
				"response_type": "id_token",
				"client_id": "client",
				"redirect_uri": "https://rp.example.com/cb",
				"scope": "openidx profile",
			})),
		);
		let err = message.verify().expect_err("Request without openid scope must fail.");

		let Error::Verification { violations, .. } = err else {
			panic!("Expected a verification error.");
		};

		assert!(violations.contains("scope", ViolationKind::ValueNotAllowed));
		assert!(violations.contains("nonce", ViolationKind::MissingRequiredValue));
	}

	#[test]
	fn urlencoded_reads_fragment_before_query() {
		let message = Message::from_urlencoded(
			MessageKind::AuthenticationResponse,
			"https://rp.example.com/cb?ignored=1#code=abc&state=xyz",
		)
		.expect("Callback URL should decode.");

		assert_eq!(message.get_str("code"), Some("abc"));
		assert_eq!(message.get_str("state"), Some("xyz"));
		assert!(message.get("ignored").is_none());

		let query = Message::from_urlencoded(
			MessageKind::AuthorizationResponse,
			"https://rp.example.com/cb?code=q&state=s",
		)
		.expect("Query callback should decode.");

		assert_eq!(query.get_str("code"), Some("q"));
	}

	#[test]
	fn urlencoded_joins_space_separated_claims_and_repeats_lists() {
		let message = Message::new(
			MessageKind::AuthenticationRequest,
			claims(json!({ "scope": ["openid", "email"], "x_list": ["a", "b"] })),
		);
		let encoded = message.to_urlencoded();

		assert!(encoded.contains("scope=openid+email"));
		assert!(encoded.contains("x_list=a&x_list=b"));

		let decoded = Message::from_urlencoded(MessageKind::AuthenticationRequest, &encoded)
			.expect("Encoded payload should decode.");

		assert_eq!(decoded.get("x_list"), Some(&json!(["a", "b"])));
	}

	#[test]
	fn json_errors_carry_paths() {
		let err = Message::from_json(MessageKind::AccessTokenResponse, "[1,2]")
			.expect_err("Arrays are not claim sets.");

		assert!(matches!(err, Error::Json(_)));
	}

	#[test]
	fn error_responses_are_detected_and_typed() {
		let message = Message::from_json(
			MessageKind::AccessTokenResponse,
			r#"{"error":"invalid_grant","error_description":"expired code"}"#,
		)
		.expect("Error payload should decode.");

		assert!(message.is_error_response());

		let typed = ErrorResponse::from_message(message).expect("Error payload should verify.");

		assert_eq!(typed.error, "invalid_grant");
		assert_eq!(typed.to_string(), "invalid_grant (expired code)");
	}

	#[test]
	fn jwt_serialization_requires_a_codec() {
		let message = Message::empty(MessageKind::IdToken);
		let err = message
			.serialize(SerializationType::Jwt, None, "none")
			.expect_err("JWT output needs a codec.");

		assert!(matches!(err, Error::UnsupportedSerializationType { .. }));
	}
}
