//! JWT collaborator seam.
//!
//! Signing and verifying JWS objects belongs to a key-management collaborator. The pipeline
//! only talks to [`JwsCodec`]; [`UnsecuredJwsCodec`] implements the RFC 7519 unsecured form
//! (`alg: none`) for development setups and tests.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	message::{Claims, SerializationType},
};

/// Signs claim sets and decodes compact JWS strings.
pub trait JwsCodec
where
	Self: Send + Sync,
{
	/// Produces a compact JWS over `claims` using `alg`.
	fn sign(&self, claims: &Claims, alg: &str) -> Result<String>;

	/// Verifies `token` and returns its payload claims.
	fn decode(&self, token: &str) -> Result<Claims>;
}

/// Codec for unsecured JWTs (`alg: none`, empty signature).
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsecuredJwsCodec;
impl UnsecuredJwsCodec {
	const ALG: &'static str = "none";

	fn malformed(message: impl Into<String>) -> Error {
		Error::Deserialization { format: SerializationType::Jwt, message: message.into() }
	}

	fn decode_segment(segment: &str) -> Result<Claims> {
		let bytes = URL_SAFE_NO_PAD
			.decode(segment)
			.map_err(|e| Self::malformed(format!("invalid base64url segment: {e}")))?;

		serde_json::from_slice(&bytes).map_err(Error::jwt)
	}
}
impl JwsCodec for UnsecuredJwsCodec {
	fn sign(&self, claims: &Claims, alg: &str) -> Result<String> {
		if alg != Self::ALG {
			return Err(Error::ValueNotAllowed { parameter: "alg".into(), value: alg.into() });
		}

		let header = serde_json::json!({ "alg": Self::ALG, "typ": "JWT" }).to_string();
		let payload = serde_json::to_string(claims).map_err(Error::jwt)?;

		Ok(format!("{}.{}.", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(payload)))
	}

	fn decode(&self, token: &str) -> Result<Claims> {
		let mut segments = token.split('.');
		let (Some(header), Some(payload), Some(signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(Self::malformed("expected three dot-separated segments"));
		};
		let header = Self::decode_segment(header)?;

		match header.get("alg").and_then(|alg| alg.as_str()) {
			Some(Self::ALG) if signature.is_empty() => Self::decode_segment(payload),
			Some(alg) => Err(Error::ValueNotAllowed { parameter: "alg".into(), value: alg.into() }),
			None => Err(Self::malformed("header is missing `alg`")),
		}
	}
}
