//! Transport boundary: the pipeline produces [`HttpArguments`] and consumes [`HttpResponse`]
//! bodies; an [`HttpTransport`] executes the round trip in between.
//!
//! Nothing here retries. Timeouts, retries, and redirect policy belong to the transport
//! implementation (configure a custom [`ReqwestClient`] for the bundled adapter).

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	HttpRequest,
	http::{
		Method, Request,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
// self
use crate::{_prelude::*, error::TransportError};

/// HTTP methods used by the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	/// Arguments travel on the query string.
	#[default]
	Get,
	/// Arguments travel in the body.
	Post,
}
impl HttpMethod {
	/// Returns the method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Headers the pipeline may set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders {
	/// `Content-Type`; always set for POST requests.
	pub content_type: Option<String>,
	/// `Authorization` (Basic or Bearer).
	pub authorization: Option<String>,
}
impl Debug for HttpHeaders {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpHeaders")
			.field("content_type", &self.content_type)
			.field("authorization_set", &self.authorization.is_some())
			.finish()
	}
}

/// A fully assembled request, ready for a transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpArguments {
	/// HTTP method.
	pub method: HttpMethod,
	/// Target URL; GET arguments are already on its query string.
	pub url: Url,
	/// Serialized body (POST only).
	pub body: Option<String>,
	/// Request headers.
	pub headers: HttpHeaders,
}
impl HttpArguments {
	/// Converts into an [`oauth2::HttpRequest`] for transports built on the `http` crate.
	pub fn to_http_request(&self) -> Result<HttpRequest, TransportError> {
		let method = match self.method {
			HttpMethod::Get => Method::GET,
			HttpMethod::Post => Method::POST,
		};
		let mut builder = Request::builder().method(method).uri(self.url.as_str());

		if let Some(content_type) = self.headers.content_type.as_deref() {
			builder = builder.header(CONTENT_TYPE, content_type);
		}
		if let Some(authorization) = self.headers.authorization.as_deref() {
			builder = builder.header(AUTHORIZATION, authorization);
		}

		let body = self.body.clone().unwrap_or_default().into_bytes();

		Ok(builder.body(body)?)
	}
}

/// A raw response handed back to the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body as text.
	pub body: String,
	/// `Content-Type` header, if any.
	pub content_type: Option<String>,
}
impl HttpResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Executes [`HttpArguments`] against the network.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and returns the response, whatever its status.
	fn execute(&self, request: HttpArguments) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] implementing [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpArguments) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let url = request.url.clone();
			let prepared: reqwest::Request = request
				.to_http_request()?
				.try_into()
				.map_err(|e: ReqwestError| TransportError::network(&url, e))?;
			let response =
				client.execute(prepared).await.map_err(|e| TransportError::network(&url, e))?;
			let status = response.status().as_u16();
			let content_type = response
				.headers()
				.get(CONTENT_TYPE)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);
			let body = response.text().await.map_err(|e| TransportError::network(&url, e))?;

			Ok(HttpResponse { status, body, content_type })
		})
	}
}
