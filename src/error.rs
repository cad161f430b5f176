//! Crate-level error types shared by the pipeline, processors, stores, and transports.

// self
use crate::{
	_prelude::*,
	message::{ErrorResponse, MessageKind, SerializationType},
	processor::ValidationErrors,
	state::StateError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Expected, recoverable outcomes (validation, verification, correlation lookups, provider
/// error responses) have dedicated variants callers can branch on. [`Error::Misuse`] is reserved
/// for programming-contract violations and should never be handled as a runtime condition.
#[derive(Debug, ThisError)]
pub enum Error {
	/// One or more request arguments failed processor-chain validation.
	#[error(transparent)]
	Validation(#[from] ValidationErrors),
	/// A deserialized message failed claim presence or type checks.
	#[error("{kind} failed verification: {violations}")]
	Verification {
		/// Message shape that was verified.
		kind: MessageKind,
		/// Every violated claim.
		violations: ValidationErrors,
	},
	/// A pipeline-level attribute (endpoint, issuer, state key) is unavailable.
	#[error("Missing required attribute `{attribute}`.")]
	MissingRequiredAttribute {
		/// Attribute name.
		attribute: &'static str,
	},
	/// A value was present but is not permitted here.
	#[error("Value `{value}` is not allowed for `{parameter}`.")]
	ValueNotAllowed {
		/// Parameter or attribute name.
		parameter: String,
		/// Offending value.
		value: String,
	},
	/// The requested wire format is not supported for this message or direction.
	#[error("{kind} does not support the {serialization} serialization.")]
	UnsupportedSerializationType {
		/// Message shape being serialized or deserialized.
		kind: MessageKind,
		/// Requested wire format.
		serialization: SerializationType,
	},
	/// Response body could not be decoded in the configured format.
	#[error("Failed to deserialize {format} payload: {message}.")]
	Deserialization {
		/// Wire format that was attempted.
		format: SerializationType,
		/// Decoder-supplied message.
		message: String,
	},
	/// JSON payload did not match the expected structure.
	#[error("Malformed JSON payload.")]
	Json(
		#[from]
		#[source]
		serde_path_to_error::Error<serde_json::Error>,
	),
	/// The provider answered with an RFC 6749 error response.
	#[error("Provider returned an error response: {0}.")]
	ErrorResponse(Box<ErrorResponse>),
	/// Correlation-state lookup or mutation failed.
	#[error(transparent)]
	State(#[from] StateError),
	/// Discovered or returned data disagrees with the configured context.
	#[error("Context mismatch on `{attribute}`: expected `{expected}`, found `{found}`.")]
	ContextMismatch {
		/// Attribute that disagreed.
		attribute: &'static str,
		/// Value held by the context.
		expected: String,
		/// Value received from the provider.
		found: String,
	},
	/// Response message is not the shape this service expects.
	#[error("Expected a {expected} response but received {found}.")]
	UnexpectedResponseType {
		/// Shape the service expects.
		expected: MessageKind,
		/// Shape that was received.
		found: MessageKind,
	},
	/// Signing or decoding a JWT failed inside the crypto collaborator.
	#[error("JWT processing failed.")]
	Jwt {
		/// Collaborator failure.
		#[source]
		source: BoxError,
	},
	/// A URL could not be parsed.
	#[error("Invalid URL `{url}`.")]
	InvalidUrl {
		/// Raw URL input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Transport failure reported by the HTTP collaborator.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Programming-contract violation (e.g., a state key passed to a stateless service).
	#[error("Service `{service}` misused: {reason}.")]
	Misuse {
		/// Service name.
		service: &'static str,
		/// Violated contract.
		reason: &'static str,
	},
}
impl Error {
	/// Wraps a crypto collaborator failure.
	pub fn jwt(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Jwt { source: Box::new(src) }
	}

	/// Parses `raw` into a [`Url`], mapping failures into [`Error::InvalidUrl`].
	pub fn parse_url(raw: &str) -> Result<Url> {
		Url::parse(raw).map_err(|source| Self::InvalidUrl { url: raw.to_owned(), source })
	}

	/// Returns `true` for programming-contract violations.
	pub fn is_misuse(&self) -> bool {
		matches!(self, Self::Misuse { .. })
	}
}
impl From<ErrorResponse> for Error {
	fn from(e: ErrorResponse) -> Self {
		Self::ErrorResponse(Box::new(e))
	}
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Endpoint being called.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Non-success status without an RFC 6749 error body.
	#[error("Endpoint answered with HTTP {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// Request could not be assembled for the transport.
	#[error("HTTP request could not be constructed.")]
	Request(#[from] oauth2::http::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::processor::{Violation, ViolationKind};

	#[test]
	fn state_error_converts_with_source() {
		let state_error = StateError::StateNotFound { state: "abc".into() };
		let error: Error = state_error.clone().into();

		assert!(matches!(error, Error::State(StateError::StateNotFound { .. })));
		assert_eq!(error.to_string(), state_error.to_string());
	}

	#[test]
	fn validation_error_lists_every_violation() {
		let errors = ValidationErrors::from(vec![
			Violation::new("client_id", ViolationKind::MissingRequiredValue),
			Violation::new("scope", ViolationKind::InvalidValueFormat),
		]);
		let error: Error = errors.into();
		let rendered = error.to_string();

		assert!(rendered.contains("client_id"));
		assert!(rendered.contains("scope"));
	}

	#[test]
	fn misuse_is_flagged() {
		let error = Error::Misuse { service: "webfinger", reason: "stateless service" };

		assert!(error.is_misuse());
		assert!(!Error::MissingRequiredAttribute { attribute: "endpoint" }.is_misuse());
	}

	#[test]
	fn invalid_urls_keep_their_input() {
		let err = Error::parse_url("not a url").expect_err("Garbage input must not parse.");

		assert!(matches!(err, Error::InvalidUrl { ref url, .. } if url == "not a url"));
	}
}
