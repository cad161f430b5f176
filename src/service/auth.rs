//! Client authentication applied while finalizing token-endpoint and user-info requests.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	http::HttpHeaders,
	message::{Message, MessageKind, Value},
	service::FinalizeEnv,
	state::random_token,
};

/// `client_assertion_type` value for JWT client authentication (RFC 7523).
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const ASSERTION_LIFETIME: Duration = Duration::minutes(5);

/// How the client proves its identity (or presents a token) to an endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// No client authentication.
	#[default]
	None,
	/// HTTP Basic with the form-encoded client identifier and secret.
	ClientSecretBasic,
	/// Client identifier and secret in the request body.
	ClientSecretPost,
	/// HMAC-signed client assertion.
	ClientSecretJwt,
	/// Asymmetrically signed client assertion.
	PrivateKeyJwt,
	/// `Authorization: Bearer` with the request's `access_token`.
	BearerHeader,
	/// `access_token` left in the request body.
	BearerBody,
}
impl ClientAuthMethod {
	/// Returns the registered method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ClientAuthMethod::None => "none",
			ClientAuthMethod::ClientSecretBasic => "client_secret_basic",
			ClientAuthMethod::ClientSecretPost => "client_secret_post",
			ClientAuthMethod::ClientSecretJwt => "client_secret_jwt",
			ClientAuthMethod::PrivateKeyJwt => "private_key_jwt",
			ClientAuthMethod::BearerHeader => "bearer_header",
			ClientAuthMethod::BearerBody => "bearer_body",
		}
	}

	const fn default_signing_alg(self) -> &'static str {
		match self {
			ClientAuthMethod::ClientSecretJwt => "HS256",
			_ => "RS256",
		}
	}
}
impl Display for ClientAuthMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ClientAuthMethod {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"none" => Ok(ClientAuthMethod::None),
			"client_secret_basic" => Ok(ClientAuthMethod::ClientSecretBasic),
			"client_secret_post" => Ok(ClientAuthMethod::ClientSecretPost),
			"client_secret_jwt" => Ok(ClientAuthMethod::ClientSecretJwt),
			"private_key_jwt" => Ok(ClientAuthMethod::PrivateKeyJwt),
			"bearer_header" => Ok(ClientAuthMethod::BearerHeader),
			"bearer_body" => Ok(ClientAuthMethod::BearerBody),
			other => Err(Error::ValueNotAllowed {
				parameter: "token_endpoint_auth_method".into(),
				value: other.into(),
			}),
		}
	}
}

/// Default finalization hook: applies [`FinalizeEnv::method`] to the request.
pub fn finalize_client_auth(
	request: &mut Message,
	headers: &mut HttpHeaders,
	env: &FinalizeEnv<'_>,
) -> Result<()> {
	let ctx = env.context;

	match env.method {
		ClientAuthMethod::None => {},
		ClientAuthMethod::ClientSecretBasic => {
			let client_id = ctx.require_client_id()?;
			let secret = require_secret(env)?;

			request.remove("client_secret");
			headers.authorization = Some(basic_authorization(client_id, secret));
		},
		ClientAuthMethod::ClientSecretPost => {
			let client_id = ctx.require_client_id()?.to_owned();
			let secret = require_secret(env)?.to_owned();

			request.insert("client_id", client_id);
			request.insert("client_secret", secret);
		},
		ClientAuthMethod::ClientSecretJwt | ClientAuthMethod::PrivateKeyJwt => {
			if env.method == ClientAuthMethod::ClientSecretJwt {
				require_secret(env)?;
			}

			let assertion = client_assertion(env)?;

			request.remove("client_secret");
			request.insert("client_assertion", assertion);
			request.insert("client_assertion_type", CLIENT_ASSERTION_TYPE);
		},
		ClientAuthMethod::BearerHeader => {
			let token = match request.remove("access_token") {
				Some(Value::String(token)) if !token.is_empty() => token,
				_ => return Err(Error::MissingRequiredAttribute { attribute: "access_token" }),
			};

			headers.authorization = Some(format!("Bearer {token}"));
		},
		ClientAuthMethod::BearerBody =>
			if request.get_str("access_token").is_none_or(str::is_empty) {
				return Err(Error::MissingRequiredAttribute { attribute: "access_token" });
			},
	}

	Ok(())
}

/// `Basic` authorization value over the form-encoded client credentials (RFC 6749 §2.3.1).
pub fn basic_authorization(client_id: &str, secret: &str) -> String {
	let encode = |raw: &str| form_urlencoded::byte_serialize(raw.as_bytes()).collect::<String>();

	format!("Basic {}", STANDARD.encode(format!("{}:{}", encode(client_id), encode(secret))))
}

/// Signs a client assertion addressed to [`FinalizeEnv::audience`].
pub fn client_assertion(env: &FinalizeEnv<'_>) -> Result<String> {
	let ctx = env.context;
	let client_id = ctx.require_client_id()?;
	let codec = ctx.keys.as_deref().ok_or(Error::MissingRequiredAttribute { attribute: "keys" })?;
	let now = OffsetDateTime::now_utc();
	let mut assertion = Message::empty(MessageKind::ClientAssertion);

	assertion.insert("iss", client_id);
	assertion.insert("sub", client_id);
	assertion.insert("aud", vec![audience(env.audience)]);
	assertion.insert("jti", random_token());
	assertion.insert("iat", now.unix_timestamp());
	assertion.insert("exp", (now + ASSERTION_LIFETIME).unix_timestamp());
	assertion.verify()?;

	let alg = env
		.signing_alg
		.or_else(|| ctx.behavior_str("token_endpoint_auth_signing_alg"))
		.unwrap_or(env.method.default_signing_alg());

	assertion.to_jwt(codec, alg)
}

fn require_secret<'a>(env: &FinalizeEnv<'a>) -> Result<&'a str> {
	env.context
		.client_secret
		.as_deref()
		.ok_or(Error::MissingRequiredAttribute { attribute: "client_secret" })
}

fn audience(endpoint: &Url) -> String {
	let mut audience = endpoint.clone();

	audience.set_query(None);
	audience.set_fragment(None);

	audience.into()
}
